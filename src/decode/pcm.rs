//! Passthrough decoder for frames that already carry L16 PCM.

use super::{DecodeError, FrameDecoder};
use crate::defaults::MAX_FRAME_BYTES;

/// Validates and copies L16 little-endian frames into a reused buffer.
///
/// Used for WAV replay and for peers that negotiate raw PCM.
pub struct PcmPassthrough {
    sample_rate: u32,
    channels: u16,
    max_frame_bytes: usize,
    buffer: Vec<u8>,
}

impl PcmPassthrough {
    /// Creates a passthrough decoder for the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            max_frame_bytes: MAX_FRAME_BYTES,
            buffer: Vec::with_capacity(MAX_FRAME_BYTES),
        }
    }

    /// Override the largest accepted frame.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

impl FrameDecoder for PcmPassthrough {
    fn decode(&mut self, frame: &[u8]) -> Result<&[u8], DecodeError> {
        if frame.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        if frame.len() > self.max_frame_bytes {
            return Err(DecodeError::FrameTooLarge {
                size: frame.len(),
                max: self.max_frame_bytes,
            });
        }
        let sample_bytes = 2 * self.channels.max(1) as usize;
        if frame.len() % sample_bytes != 0 {
            return Err(DecodeError::Malformed {
                message: format!(
                    "{} bytes is not a whole number of {}-byte samples",
                    frame.len(),
                    sample_bytes
                ),
            });
        }

        self.buffer.clear();
        self.buffer.extend_from_slice(frame);
        Ok(&self.buffer)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn name(&self) -> &'static str {
        "pcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_copies_frame() {
        let mut decoder = PcmPassthrough::new(48000, 1);
        let pcm = decoder.decode(&[1, 2, 3, 4]).unwrap();
        assert_eq!(pcm, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_passthrough_reuses_buffer() {
        let mut decoder = PcmPassthrough::new(48000, 1);
        assert_eq!(decoder.decode(&[1, 2, 3, 4]).unwrap().len(), 4);
        // Second, shorter frame must not carry over bytes from the first
        assert_eq!(decoder.decode(&[9, 9]).unwrap(), &[9, 9]);
    }

    #[test]
    fn test_passthrough_rejects_empty() {
        let mut decoder = PcmPassthrough::new(48000, 1);
        assert_eq!(decoder.decode(&[]), Err(DecodeError::EmptyFrame));
    }

    #[test]
    fn test_passthrough_rejects_partial_sample() {
        let mut decoder = PcmPassthrough::new(48000, 1);
        assert!(matches!(
            decoder.decode(&[1, 2, 3]),
            Err(DecodeError::Malformed { .. })
        ));

        let mut stereo = PcmPassthrough::new(48000, 2);
        assert!(matches!(
            stereo.decode(&[1, 2]),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(stereo.decode(&[1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn test_passthrough_rejects_oversized() {
        let mut decoder = PcmPassthrough::new(48000, 1).with_max_frame_bytes(4);
        assert_eq!(
            decoder.decode(&[0; 6]),
            Err(DecodeError::FrameTooLarge { size: 6, max: 4 })
        );
    }

    #[test]
    fn test_passthrough_format() {
        let decoder = PcmPassthrough::new(16000, 2);
        assert_eq!(decoder.sample_rate(), 16000);
        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.name(), "pcm");
    }
}
