//! Reduction of an RGBA raster to a local color table of at most 256 entries.
//!
//! Colors are assigned table slots in the order they are first encountered. Once all slots are
//! taken, any further new color is mapped to the closest color already in the table, measured by
//! Euclidean distance in RGB space. There is no dithering.
use indexmap::IndexSet;
use log::{debug, trace};

use crate::error::EncodingError;

/// The index every fully transparent pixel maps to.
pub const TRANSPARENT_INDEX: u8 = 0;
/// The most colors a local color table can hold, including the transparent slot.
pub const MAX_COLORS: usize = 256;

/// An opaque color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// The result of quantizing one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quantized {
    /// The color table, three bytes per entry and `1 << bit_width` entries.
    ///
    /// Entry `0` is black, slots past the assigned colors are zero filled.
    pub palette: Vec<u8>,
    /// One palette index per pixel, in raster order.
    pub indices: Vec<u8>,
    /// The bits needed per index, between 2 and 8.
    pub bit_width: u8,
    /// The number of assigned table slots, counting the transparent slot.
    pub colors: usize,
    /// How many pixels were mapped to a nearest color because the table was full.
    pub fallbacks: usize,
}

/// A pixel after inspecting its alpha channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pixel {
    Transparent,
    Opaque(Rgb),
}

/// The insertion ordered color table of a single frame.
///
/// Table slot `n` of a color is its position in the set plus one, slot `0` is reserved.
#[derive(Default)]
pub(crate) struct ColorTable {
    colors: IndexSet<Rgb>,
    fallbacks: usize,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// The squared Euclidean distance, which orders colors the same as the distance itself.
    pub fn distance_squared(self, other: Rgb) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl Pixel {
    fn from_rgba(rgba: &[u8]) -> Self {
        match *rgba {
            [_, _, _, 0] => Pixel::Transparent,
            [r, g, b, _] => Pixel::Opaque(Rgb { r, g, b }),
            _ => unreachable!("pixels are four bytes"),
        }
    }
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of assigned slots, counting the transparent slot.
    pub fn len(&self) -> usize {
        self.colors.len() + 1
    }

    /// Whether every slot is assigned and new colors fall back to their nearest match.
    pub fn is_full(&self) -> bool {
        self.len() >= MAX_COLORS
    }

    /// The number of lookups that fell back to a nearest color so far.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    /// Look up the slot of a color, assigning a new one while the table has room.
    pub fn index_of(&mut self, color: Rgb) -> u8 {
        if let Some(pos) = self.colors.get_index_of(&color) {
            return slot(pos);
        }

        if !self.is_full() {
            let (pos, _) = self.colors.insert_full(color);
            return slot(pos);
        }

        let nearest = self.nearest(color);
        self.fallbacks += 1;
        trace!("color table full, {:?} maps to slot {}", color, nearest);
        nearest
    }

    /// The slot of the closest assigned color.
    ///
    /// Colors are scanned in the order they were assigned and the first one with the smallest
    /// distance wins, so ties resolve to the lowest slot.
    pub fn nearest(&self, color: Rgb) -> u8 {
        let mut best = (TRANSPARENT_INDEX, u32::MAX);
        for (pos, &candidate) in self.colors.iter().enumerate() {
            let distance = color.distance_squared(candidate);
            if distance < best.1 {
                best = (slot(pos), distance);
            }
        }
        best.0
    }

    /// Serialize the table into `1 << bit_width` RGB triples.
    pub fn palette(&self, bit_width: u8) -> Vec<u8> {
        let mut palette = vec![0; 3 << bit_width];
        for (entry, color) in palette[3..].chunks_exact_mut(3).zip(&self.colors) {
            entry.copy_from_slice(&[color.r, color.g, color.b]);
        }
        palette
    }
}

fn slot(pos: usize) -> u8 {
    debug_assert!(pos + 1 < MAX_COLORS);
    (pos + 1) as u8
}

/// The bits per index needed to address `colors` table slots, at least 2.
pub fn bit_width_for(colors: usize) -> u8 {
    let mut width = 2;
    while (1usize << width) < colors {
        width += 1;
    }
    width
}

/// Quantize a row-major RGBA raster of `width` by `height` pixels.
///
/// Fails if a dimension is zero or the raster does not hold four bytes per pixel.
///
/// ```
/// let rgba = [255, 0, 0, 255, 0, 0, 255, 255, 9, 9, 9, 0];
/// let frame = gifcast::quantize(&rgba, 3, 1).unwrap();
/// assert_eq!(frame.indices, [1, 2, 0]);
/// assert_eq!(frame.bit_width, 2);
/// assert_eq!(&frame.palette[..9], [0, 0, 0, 255, 0, 0, 0, 0, 255]);
/// ```
pub fn quantize(rgba: &[u8], width: u32, height: u32) -> Result<Quantized, EncodingError> {
    if width == 0 || height == 0 {
        return Err(EncodingError::InvalidDimensions { width, height });
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(EncodingError::InvalidDimensions { width, height })?;
    if rgba.len() != expected {
        return Err(EncodingError::PixelCount {
            expected,
            actual: rgba.len(),
        });
    }

    let mut table = ColorTable::new();
    let indices = rgba
        .chunks_exact(4)
        .map(|rgba| match Pixel::from_rgba(rgba) {
            Pixel::Transparent => TRANSPARENT_INDEX,
            Pixel::Opaque(color) => table.index_of(color),
        })
        .collect();

    let colors = table.len();
    let bit_width = bit_width_for(colors);
    debug!(
        "quantized {}x{} frame to {} colors ({} bits), {} fallbacks",
        width,
        height,
        colors,
        bit_width,
        table.fallbacks()
    );

    Ok(Quantized {
        palette: table.palette(bit_width),
        indices,
        bit_width,
        colors,
        fallbacks: table.fallbacks(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(colors: &[Rgb]) -> Vec<u8> {
        colors.iter().flat_map(|c| vec![c.r, c.g, c.b, 255]).collect()
    }

    #[test]
    fn five_colors_need_three_bits() {
        let colors: Vec<Rgb> = (0..5).map(|i| Rgb::new(i * 40, 0, 200)).collect();
        let mut raster = opaque(&colors);
        raster.extend(opaque(&colors));
        let frame = quantize(&raster, 5, 2).unwrap();
        assert_eq!(frame.colors, 6);
        assert_eq!(frame.bit_width, 3);
        assert_eq!(frame.palette.len(), 8 * 3);
        assert_eq!(frame.indices, [1, 2, 3, 4, 5, 1, 2, 3, 4, 5]);
        assert_eq!(&frame.palette[18..], [0; 6]);
    }

    #[test]
    fn transparent_ignores_rgb() {
        let raster = [10, 20, 30, 0, 10, 20, 30, 255, 10, 20, 30, 0, 1, 2, 3, 1];
        let frame = quantize(&raster, 2, 2).unwrap();
        assert_eq!(frame.indices, [0, 1, 0, 2]);
        assert_eq!(&frame.palette[..3], [0, 0, 0]);
        assert_eq!(frame.colors, 3);
    }

    #[test]
    fn fully_transparent_frame() {
        let frame = quantize(&[0; 4 * 6], 3, 2).unwrap();
        assert_eq!(frame.indices, [0; 6]);
        assert_eq!(frame.colors, 1);
        assert_eq!(frame.bit_width, 2);
        assert_eq!(frame.palette, [0; 12]);
    }

    #[test]
    fn full_table_falls_back_to_nearest() {
        // 255 grays fill every slot, slot 1 holds 0 and slot 255 holds 254.
        let mut colors: Vec<Rgb> = (0..=254).map(|v| Rgb::new(v, v, v)).collect();
        colors.push(Rgb::new(255, 255, 255));
        colors.push(Rgb::new(3, 1, 2));
        let frame = quantize(&opaque(&colors), colors.len() as u32, 1).unwrap();
        assert_eq!(frame.colors, 256);
        assert_eq!(frame.bit_width, 8);
        assert_eq!(frame.fallbacks, 2);
        assert_eq!(frame.indices[255], 255);
        // (3,1,2) is closest to (2,2,2), in slot 3.
        assert_eq!(frame.indices[256], 3);
    }

    #[test]
    fn ties_resolve_to_first_assigned() {
        let mut table = ColorTable::new();
        assert_eq!(table.index_of(Rgb::new(10, 0, 0)), 1);
        assert_eq!(table.index_of(Rgb::new(0, 10, 0)), 2);
        assert_eq!(table.nearest(Rgb::new(5, 5, 0)), 1);
        assert_eq!(table.nearest(Rgb::new(4, 6, 0)), 2);
    }

    #[test]
    fn bit_widths() {
        let expected = [(1, 2), (2, 2), (4, 2), (5, 3), (8, 3), (9, 4), (129, 8), (256, 8)];
        for &(colors, width) in &expected {
            assert_eq!(bit_width_for(colors), width, "{}", colors);
        }
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            quantize(&[], 0, 1),
            Err(EncodingError::InvalidDimensions { width: 0, height: 1 })
        ));
        assert!(matches!(
            quantize(&[0; 12], 2, 2),
            Err(EncodingError::PixelCount {
                expected: 16,
                actual: 12
            })
        ));
    }
}
