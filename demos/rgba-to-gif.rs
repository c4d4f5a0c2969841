//! Draws a white canvas that fills up with black quadrants, one per frame, and writes the
//! animation to the file given as the first argument.

use std::fs::File;
use std::io::{self, BufWriter};

use gifcast::frame::{Delay, Encoder};

const SIZE: usize = 64;

fn fill(canvas: &mut [u8], x0: usize, y0: usize, rgba: [u8; 4]) {
    for y in y0..y0 + SIZE / 2 {
        for x in x0..x0 + SIZE / 2 {
            let at = 4 * (y * SIZE + x);
            canvas[at..at + 4].copy_from_slice(&rgba);
        }
    }
}

fn main() {
    match (|| -> io::Result<()> {
        let path = std::env::args().nth(1).unwrap_or_else(|| "quadrants.gif".into());
        let file = BufWriter::new(File::create(path)?);
        let delay = Delay::from_millis(250.0)?;

        let mut canvas = vec![255u8; 4 * SIZE * SIZE];
        let mut encoder = Encoder::new(SIZE as u32, SIZE as u32)?;
        let mut stream = encoder.into_stream(file);
        stream.begin()?;
        stream.add_frame(&canvas, delay)?;
        for &(x, y) in &[(0, 0), (SIZE / 2, 0), (SIZE / 2, SIZE / 2), (0, SIZE / 2)] {
            fill(&mut canvas, x, y, [0, 0, 0, 255]);
            stream.add_frame(&canvas, delay)?;
        }
        stream.end()?;
        Ok(())
    })() {
        Ok(()) => (),
        Err(err) => eprintln!("{}", err),
    }
}
