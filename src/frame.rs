//! Assembly of the GIF89a container around quantized and compressed frames.
//!
//! The [`Encoder`] produces the fixed layout blocks of an animation: the header with the logical
//! screen descriptor and a looping extension, one graphic control extension, image descriptor,
//! local color table and image data block per frame, and the trailer. Every frame covers the
//! whole canvas, gets its own color table and marks index `0` as transparent.
//!
//! The chunks can be collected directly or written to consumers through [`IntoStream`], and with
//! the `async` feature through [`IntoAsync`].
//!
//! [`Encoder`]: struct.Encoder.html
//! [`IntoStream`]: struct.IntoStream.html
//! [`IntoAsync`]: struct.IntoAsync.html
use log::debug;

use crate::encode::compress;
use crate::error::EncodingError;
use crate::quantize::{quantize, TRANSPARENT_INDEX};

#[cfg(feature = "std")]
use std::io::{self, Write};
#[cfg(feature = "std")]
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

/// The largest canvas dimension the 16-bit screen descriptor fields can hold.
pub const MAX_DIMENSION: u32 = 0xffff;
/// The longest delay, in milliseconds, that still rounds to 16-bit centiseconds.
pub const MAX_DELAY_MILLIS: f64 = 655_350.0;
/// The byte closing a GIF file.
pub const TRAILER: u8 = 0x3b;

const SIGNATURE: &[u8; 6] = b"GIF89a";
const EXTENSION_INTRODUCER: u8 = 0x21;
const APPLICATION_LABEL: u8 = 0xff;
const GRAPHIC_CONTROL_LABEL: u8 = 0xf9;
const IMAGE_SEPARATOR: u8 = 0x2c;
const LOOPING_APPLICATION: &[u8; 11] = b"NETSCAPE2.0";

/// Screen descriptor flags: no global color table, 8 bits of color resolution.
const SCREEN_FLAGS: u8 = 0x70;
/// Graphic control flags: restore to background, no user input, transparent index present.
const GRAPHIC_CONTROL_FLAGS: u8 = 0x09;
/// Image descriptor flag of a local color table.
const LOCAL_COLOR_TABLE: u8 = 0x80;

/// The display time of a frame, in hundredths of a second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Delay(u16);

/// Writes the header, frames and trailer of one animation.
pub struct Encoder {
    width: u16,
    height: u16,
    frames: usize,
}

/// An encoding stream sink.
///
/// See [`Encoder::into_stream`] on how to create this type and more information.
///
/// [`Encoder::into_stream`]: struct.Encoder.html#method.into_stream
#[cfg(feature = "std")]
pub struct IntoStream<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

/// An asynchronous encoding stream sink.
///
/// See [`Encoder::into_async`] on how to create this type and more information.
///
/// [`Encoder::into_async`]: struct.Encoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

/// Copies every written chunk to all subscribed consumers.
///
/// Consumers receive identical chunks in the order they were written. A write only returns once
/// every consumer accepted the chunk, so the slowest consumer paces the encoder. Channel consumers
/// buffer a bounded number of chunks before the encoder waits for them.
///
/// A writer that fails or a channel whose receiver hung up is dropped and the remaining consumers
/// keep receiving every chunk. Writing fails only once the last consumer has been dropped this way.
#[cfg(feature = "std")]
#[derive(Default)]
pub struct Broadcast<'w> {
    consumers: Vec<Consumer<'w>>,
}

#[cfg(feature = "std")]
enum Consumer<'w> {
    Writer(Box<dyn Write + Send + 'w>),
    Channel(SyncSender<Vec<u8>>),
}

impl Delay {
    pub fn from_centis(centis: u16) -> Self {
        Delay(centis)
    }

    /// Convert milliseconds, rounding to the nearest centisecond with halves rounded up.
    ///
    /// Fails if the rounded value is negative, does not fit 16 bits, or is not a number.
    pub fn from_millis(millis: f64) -> Result<Self, EncodingError> {
        let centis = (millis / 10.0 + 0.5).floor();
        if !centis.is_finite() || centis < 0.0 || centis > f64::from(u16::MAX) {
            return Err(EncodingError::InvalidDelay { millis });
        }
        Ok(Delay(centis as u16))
    }

    pub fn centis(self) -> u16 {
        self.0
    }
}

impl Encoder {
    /// Create an encoder for a canvas of `width` by `height` pixels.
    ///
    /// Both dimensions must be between 1 and 65535.
    pub fn new(width: u32, height: u32) -> Result<Self, EncodingError> {
        let valid = 1..=MAX_DIMENSION;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(EncodingError::InvalidDimensions { width, height });
        }

        Ok(Encoder {
            width: width as u16,
            height: height as u16,
            frames: 0,
        })
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// The number of frames encoded so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The signature, logical screen descriptor and an extension requesting endless looping.
    pub fn header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(32);
        header.extend_from_slice(SIGNATURE);
        header.extend_from_slice(&self.width.to_le_bytes());
        header.extend_from_slice(&self.height.to_le_bytes());
        // No background color, default aspect ratio.
        header.extend_from_slice(&[SCREEN_FLAGS, 0, 0]);

        header.extend_from_slice(&[EXTENSION_INTRODUCER, APPLICATION_LABEL]);
        header.push(LOOPING_APPLICATION.len() as u8);
        header.extend_from_slice(LOOPING_APPLICATION);
        // One sub-block: sub-block id 1, loop count 0 (forever).
        header.extend_from_slice(&[3, 1, 0, 0, 0]);
        header
    }

    /// Quantize and compress one canvas sized RGBA raster into its frame blocks.
    pub fn encode_frame(&mut self, rgba: &[u8], delay: Delay) -> Result<Vec<u8>, EncodingError> {
        let frame = quantize(rgba, self.width(), self.height())?;
        let data = compress(frame.bit_width, &frame.indices)?;

        let mut out = Vec::with_capacity(8 + 10 + frame.palette.len() + 1 + data.len());
        out.extend_from_slice(&[EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL, 4]);
        out.push(GRAPHIC_CONTROL_FLAGS);
        out.extend_from_slice(&delay.centis().to_le_bytes());
        out.extend_from_slice(&[TRANSPARENT_INDEX, 0]);

        out.push(IMAGE_SEPARATOR);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(LOCAL_COLOR_TABLE | ((frame.bit_width - 1) & 0x07));

        out.extend_from_slice(&frame.palette);
        out.push(frame.bit_width);
        out.extend_from_slice(&data);

        self.frames += 1;
        debug!(
            "frame {}: {} colors, {} bytes of image data",
            self.frames,
            frame.colors,
            data.len()
        );
        Ok(out)
    }

    /// Construct an encoding stream into a writer.
    #[cfg(feature = "std")]
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream {
            encoder: self,
            writer,
        }
    }

    /// Construct an encoding stream into an asynchronous writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: futures::io::AsyncWrite + Unpin>(
        &mut self,
        writer: W,
    ) -> IntoAsync<'_, W> {
        IntoAsync {
            encoder: self,
            writer,
        }
    }
}

#[cfg(feature = "std")]
impl<W: Write> IntoStream<'_, W> {
    /// Write the header.
    pub fn begin(&mut self) -> Result<(), EncodingError> {
        let header = self.encoder.header();
        self.writer.write_all(&header)?;
        Ok(())
    }

    /// Encode one frame and write it.
    ///
    /// Nothing is written if the frame is rejected.
    pub fn add_frame(&mut self, rgba: &[u8], delay: Delay) -> Result<(), EncodingError> {
        let frame = self.encoder.encode_frame(rgba, delay)?;
        self.writer.write_all(&frame)?;
        Ok(())
    }

    /// Write the trailer and flush, returning the writer.
    pub fn end(mut self) -> Result<W, EncodingError> {
        self.writer.write_all(&[TRAILER])?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(feature = "async")]
impl<W: futures::io::AsyncWrite + Unpin> IntoAsync<'_, W> {
    /// Write the header.
    pub async fn begin(&mut self) -> Result<(), EncodingError> {
        use futures::io::AsyncWriteExt;
        let header = self.encoder.header();
        self.writer.write_all(&header).await?;
        Ok(())
    }

    /// Encode one frame and write it.
    ///
    /// The frame is encoded completely before the first byte is written.
    pub async fn add_frame(&mut self, rgba: &[u8], delay: Delay) -> Result<(), EncodingError> {
        use futures::io::AsyncWriteExt;
        let frame = self.encoder.encode_frame(rgba, delay)?;
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    /// Write the trailer and flush, returning the writer.
    pub async fn end(mut self) -> Result<W, EncodingError> {
        use futures::io::AsyncWriteExt;
        self.writer.write_all(&[TRAILER]).await?;
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

#[cfg(feature = "std")]
impl<'w> Broadcast<'w> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer that receives every following chunk.
    pub fn subscribe(&mut self, consumer: impl Write + Send + 'w) -> &mut Self {
        self.consumers.push(Consumer::Writer(Box::new(consumer)));
        self
    }

    /// Add a consumer on another thread, buffering at most `bound` chunks.
    ///
    /// A consumer that hangs up is dropped from the broadcast.
    pub fn channel(&mut self, bound: usize) -> Receiver<Vec<u8>> {
        let (send, recv) = sync_channel(bound);
        self.consumers.push(Consumer::Channel(send));
        recv
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[cfg(feature = "std")]
impl Write for Broadcast<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut failed = None;
        let mut idx = 0;
        while idx < self.consumers.len() {
            let delivered = match &mut self.consumers[idx] {
                Consumer::Writer(writer) => match writer.write_all(buf) {
                    Ok(()) => true,
                    Err(err) => {
                        debug!("consumer {} failed: {}", idx, err);
                        failed = Some(err);
                        false
                    }
                },
                Consumer::Channel(send) => match send.try_send(buf.to_vec()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(chunk)) => send.send(chunk).is_ok(),
                    Err(TrySendError::Disconnected(_)) => false,
                },
            };

            if delivered {
                idx += 1;
            } else {
                debug!("dropping consumer {}", idx);
                self.consumers.remove(idx);
            }
        }

        self.settle(failed)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut failed = None;
        self.consumers.retain_mut(|consumer| match consumer {
            Consumer::Writer(writer) => match writer.flush() {
                Ok(()) => true,
                Err(err) => {
                    debug!("dropping consumer that failed to flush: {}", err);
                    failed = Some(err);
                    false
                }
            },
            Consumer::Channel(_) => true,
        });

        self.settle(failed)
    }
}

#[cfg(feature = "std")]
impl Broadcast<'_> {
    /// A failed consumer is dropped, the error only surfaces once no consumer is left.
    fn settle(&self, failed: Option<io::Error>) -> io::Result<()> {
        match failed {
            Some(err) if self.consumers.is_empty() => Err(err),
            _ => Ok(()),
        }
    }
}
