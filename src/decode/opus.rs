//! Opus decoding for WebRTC audio tracks.
//!
//! WebRTC negotiates Opus at 48kHz. The pipeline forwards 48kHz mono L16,
//! so no resampling happens here.

use super::{DecodeError, FrameDecoder, samples_to_le_bytes};
use crate::defaults::{MAX_OPUS_FRAME_SAMPLES, SAMPLE_RATE};
use audiopus::coder::Decoder as OpusDecoder;
use audiopus::packet::Packet;
use audiopus::{Channels, MutSignals, SampleRate};
use tracing::{debug, trace};

/// Stateful Opus decoder producing 48kHz mono L16 bytes.
pub struct OpusFrameDecoder {
    decoder: OpusDecoder,
    samples: Vec<i16>,
    buffer: Vec<u8>,
}

impl OpusFrameDecoder {
    /// Create a 48kHz mono decoder.
    pub fn new() -> Result<Self, DecodeError> {
        let decoder = OpusDecoder::new(SampleRate::Hz48000, Channels::Mono).map_err(|e| {
            DecodeError::Init {
                message: e.to_string(),
            }
        })?;

        debug!("Created Opus decoder (48kHz mono)");

        Ok(Self {
            decoder,
            // Up to 120ms per packet at 48kHz
            samples: vec![0i16; MAX_OPUS_FRAME_SAMPLES],
            buffer: Vec::with_capacity(MAX_OPUS_FRAME_SAMPLES * 2),
        })
    }
}

impl FrameDecoder for OpusFrameDecoder {
    fn decode(&mut self, frame: &[u8]) -> Result<&[u8], DecodeError> {
        if frame.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }

        let packet = Packet::try_from(frame).map_err(|e| DecodeError::Malformed {
            message: e.to_string(),
        })?;
        let output =
            MutSignals::try_from(&mut self.samples[..]).map_err(|e| DecodeError::Malformed {
                message: e.to_string(),
            })?;

        let decoded = self
            .decoder
            .decode(Some(packet), output, false)
            .map_err(|e| DecodeError::Malformed {
                message: e.to_string(),
            })?;

        trace!("Decoded {} bytes Opus -> {} samples", frame.len(), decoded);

        samples_to_le_bytes(&self.samples[..decoded], &mut self.buffer);
        Ok(&self.buffer)
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn channels(&self) -> u16 {
        1
    }

    fn name(&self) -> &'static str {
        "opus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opus_decoder_format() {
        let decoder = OpusFrameDecoder::new().unwrap();
        assert_eq!(decoder.sample_rate(), 48000);
        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.name(), "opus");
    }

    #[test]
    fn test_opus_decoder_rejects_empty_frame() {
        let mut decoder = OpusFrameDecoder::new().unwrap();
        assert_eq!(decoder.decode(&[]), Err(DecodeError::EmptyFrame));
    }

    #[test]
    fn test_opus_decoder_decodes_silence_packet() {
        // TOC byte 0xF8: CELT-only fullband 20ms, single frame; 0xFF 0xFE is
        // the canonical DTX silence payload.
        let mut decoder = OpusFrameDecoder::new().unwrap();
        let pcm = decoder.decode(&[0xF8, 0xFF, 0xFE]).unwrap();
        // 20ms at 48kHz mono = 960 samples = 1920 bytes
        assert_eq!(pcm.len(), 1920);
    }
}
