//! Compresses 8-bit indices from stdin and writes the sub-blocks to stdout.

use std::io::{self, Read, Write};

fn main() {
    match (|| -> io::Result<()> {
        let mut indices = vec![];
        io::stdin().lock().read_to_end(&mut indices)?;
        let blocks = gifcast::encode::compress(8, &indices)?;
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        stdout.write_all(&[8])?;
        stdout.write_all(&blocks)?;
        Ok(())
    })() {
        Ok(()) => (),
        Err(err) => eprintln!("{}", err),
    }
}
