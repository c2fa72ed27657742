//! Frame decoders: compressed audio frame → linear PCM bytes.
//!
//! Decoders are stateful and order-dependent, so a decoder is owned by a
//! single pipeline and driven from one task only.

pub mod pcm;

#[cfg(feature = "opus")]
pub mod opus;

pub use pcm::PcmPassthrough;

#[cfg(feature = "opus")]
pub use opus::OpusFrameDecoder;

use thiserror::Error;

/// Errors produced while decoding a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty frame")]
    EmptyFrame,

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed frame: {message}")]
    Malformed { message: String },

    #[error("Decoder initialisation failed: {message}")]
    Init { message: String },
}

/// Stateful compressed-frame decoder.
///
/// The returned PCM (16-bit signed little-endian) borrows the decoder's
/// scratch buffer and is only valid until the next call to `decode`.
/// Callers that need to keep it must copy.
pub trait FrameDecoder: Send {
    /// Decode one frame.
    fn decode(&mut self, frame: &[u8]) -> Result<&[u8], DecodeError>;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Output channel count.
    fn channels(&self) -> u16;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "decoder"
    }
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn decode(&mut self, frame: &[u8]) -> Result<&[u8], DecodeError> {
        (**self).decode(frame)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Write i16 samples as little-endian bytes into `out`, reusing its allocation.
#[cfg(feature = "opus")]
pub(crate) fn samples_to_le_bytes(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}
