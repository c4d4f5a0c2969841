use thiserror::Error;

/// The error type of all encoding operations.
///
/// Every variant except [`TableOverflow`] and [`Io`] reports input that was rejected before any
/// work was done. Such errors are deterministic: the same input always fails the same way.
///
/// [`TableOverflow`]: #variant.TableOverflow
/// [`Io`]: #variant.Io
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A canvas or frame dimension was zero or did not fit the 16-bit GIF fields.
    #[error("the image dimensions must be between 1 and 65535, were {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// The raster does not hold exactly four bytes for each pixel.
    #[error("expected {expected} bytes of RGBA data, got {actual}")]
    PixelCount { expected: usize, actual: usize },
    /// A frame delay outside of what the graphic control extension can express.
    #[error("the delay must be between 0 and 655350 milliseconds, was {millis}")]
    InvalidDelay { millis: f64 },
    /// Minimum code size out of bounds. It must be between 2 and 8 included.
    #[error("minimum code size must be between 2 and 8, was {0}")]
    InvalidCodeSize(u8),
    /// An index that can not be represented with the minimum code size.
    ///
    /// For a minimum code size of 4 for example, all indices must be below `1 << 4 == 16`.
    #[error("index {index} does not fit a minimum code size of {min_code_size}")]
    InvalidIndex { index: u8, min_code_size: u8 },
    /// The code table grew past 4096 entries without a reset.
    ///
    /// This indicates a defect in the compressor and the encoding must be abandoned.
    #[error("the LZW code table overflowed without being reset")]
    TableOverflow,
    /// Writing a finished chunk to a consumer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EncodingError {
    /// Whether the input was rejected during validation.
    ///
    /// Validation errors are the caller's to fix and are never worth retrying.
    pub fn is_validation(&self) -> bool {
        match self {
            EncodingError::InvalidDimensions { .. }
            | EncodingError::PixelCount { .. }
            | EncodingError::InvalidDelay { .. }
            | EncodingError::InvalidCodeSize(_)
            | EncodingError::InvalidIndex { .. } => true,
            EncodingError::TableOverflow | EncodingError::Io(_) => false,
        }
    }
}

#[cfg(feature = "std")]
impl From<EncodingError> for std::io::Error {
    fn from(err: EncodingError) -> Self {
        use std::io::ErrorKind;
        match err {
            EncodingError::Io(err) => err,
            err if err.is_validation() => std::io::Error::new(ErrorKind::InvalidInput, err),
            err => std::io::Error::new(ErrorKind::InvalidData, err),
        }
    }
}
