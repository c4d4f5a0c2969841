//! # Animated GIF encoding
//!
//! This crate turns a sequence of RGBA rasters into an animated GIF89a bitstream. Each frame
//! passes through two stages that never share state with other frames:
//!
//!  * [`quantize`] reduces the raster to at most 256 colors and yields a local color table, one
//!    index per pixel and the bit width of those indices. Fully transparent pixels always map to
//!    index `0`.
//!  * [`encode`] compresses the indices with the GIF flavour of LZW and frames the code stream
//!    into length prefixed sub-blocks.
//!
//! The code stream starts with a clear code and ends with an end code which are defined as
//! follows:
//!
//!  * `CLEAR_CODE == 1 << min_code_size`
//!  * `END_CODE   == CLEAR_CODE + 1`
//!
//! Exemplary use of the compressor on its own:
//!
//! ```
//! let indices = [40, 255, 255, 255, 40, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255];
//! let blocks = gifcast::encode::compress(8, &indices).unwrap();
//! assert_eq!(blocks, [11, 0, 81, 252, 27, 40, 112, 160, 193, 131, 1, 1, 0]);
//! ```
//!
//! And of the full pipeline, writing a two frame animation:
//!
//! ```
//! use gifcast::frame::{Delay, Encoder};
//!
//! let red = [255, 0, 0, 255].repeat(4 * 4);
//! let clear = [0u8; 4 * 4 * 4];
//! let mut gif = vec![];
//!
//! let mut encoder = Encoder::new(4, 4).unwrap();
//! let mut stream = encoder.into_stream(&mut gif);
//! stream.begin().unwrap();
//! stream.add_frame(&red, Delay::from_millis(250.0).unwrap()).unwrap();
//! stream.add_frame(&clear, Delay::from_centis(25)).unwrap();
//! stream.end().unwrap();
//!
//! assert_eq!(&gif[..6], b"GIF89a");
//! assert_eq!(gif.last(), Some(&0x3b));
//! ```
#![forbid(unsafe_code)]

/// The widest code the GIF flavour of LZW may produce.
pub(crate) const MAX_CODESIZE: u8 = 12;
/// The number of codes addressable with the widest code.
pub(crate) const MAX_ENTRIES: usize = 1 << MAX_CODESIZE as usize;
/// The longest payload of a single sub-block.
pub(crate) const MAX_BLOCK_LEN: usize = 255;

/// Alias for a LZW code point
pub(crate) type Code = u16;

mod bits;
mod error;

pub mod encode;
pub mod frame;
pub mod quantize;

pub use crate::error::EncodingError;
pub use crate::quantize::{quantize, Quantized, Rgb};
