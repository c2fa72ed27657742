//! WAV file frame source for offline replay.

use super::{FrameSource, IngestError};
use crate::pipeline::types::AudioFrame;
use std::io::Read;
use std::path::Path;

/// Frame source that slices a WAV file into fixed-duration L16 frames.
///
/// Stereo input is down-mixed to mono. Frames are emitted as fast as the
/// pipeline pulls them; pacing is the consumer's concern.
pub struct WavFrameSource {
    samples: Vec<i16>,
    sample_rate: u32,
    position: usize,
    chunk_size: usize,
    sequence: u64,
}

impl WavFrameSource {
    /// Open a WAV file from disk.
    pub fn open(path: &Path, frame_ms: u32) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path).map_err(|e| {
            IngestError::new(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::from_reader(std::io::BufReader::new(file), frame_ms)
    }

    /// Create from any reader.
    pub fn from_reader<R: Read>(reader: R, frame_ms: u32) -> Result<Self, IngestError> {
        let mut wav_reader = hound::WavReader::new(reader)
            .map_err(|e| IngestError::new(format!("Failed to parse WAV file: {}", e)))?;

        let spec = wav_reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(IngestError::new(format!(
                "Unsupported WAV format: {}-bit {:?}, expected 16-bit integer",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IngestError::new(format!("Failed to read WAV samples: {}", e)))?;

        let samples = match spec.channels {
            1 => raw_samples,
            2 => raw_samples
                .chunks_exact(2)
                .map(|chunk| ((chunk[0] as i32 + chunk[1] as i32) / 2) as i16)
                .collect(),
            n => {
                return Err(IngestError::new(format!(
                    "Unsupported channel count: {}",
                    n
                )));
            }
        };

        let chunk_size = ((spec.sample_rate as u64 * frame_ms.max(1) as u64) / 1000).max(1);

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            position: 0,
            chunk_size: chunk_size as usize,
            sequence: 0,
        })
    }

    /// Sample rate of the emitted PCM.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per frame.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total mono samples in the file.
    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait::async_trait]
impl FrameSource for WavFrameSource {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, IngestError> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let mut payload = Vec::with_capacity((end - self.position) * 2);
        for sample in &self.samples[self.position..end] {
            payload.extend_from_slice(&sample.to_le_bytes());
        }
        self.position = end;

        let frame = AudioFrame::new(payload, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}
