//! Streaming recognition backend contract.
//!
//! A backend opens one bidirectional stream per track: a configuration
//! handshake, a sequence of PCM writes, a half-close, and then responses.
//! [`RecognitionStream`] layers the finalization contract on top.

pub mod mock;
pub mod protocol;
pub mod stream;
pub mod tcp;

pub use mock::MockBackend;
pub use protocol::{Alternative, BackendStatus, RecognitionResult, RecognizeResponse};
pub use stream::{RecognitionStream, ResultReceiver};
pub use tcp::TcpBackend;

use crate::config::Config;
use crate::defaults;
use thiserror::Error;

/// Transport-level failures talking to the backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to connect to recognition backend: {message}")]
    Connect { message: String },

    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend protocol error: {message}")]
    Protocol { message: String },

    #[error("Recognition stream closed")]
    Closed,
}

/// Parameters of the configuration handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub language: String,
}

impl RecognitionConfig {
    pub fn new(sample_rate: u32, channels: u16, language: impl Into<String>) -> Self {
        Self {
            sample_rate,
            channels,
            language: language.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.recognition.sample_rate,
            config.recognition.channels,
            config.recognition.language.clone(),
        )
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self::new(
            defaults::SAMPLE_RATE,
            defaults::CHANNELS,
            defaults::DEFAULT_LANGUAGE,
        )
    }
}

/// Factory for recognition streams.
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync {
    type Stream: BackendStream + 'static;

    /// Open a stream and complete the configuration handshake.
    ///
    /// The returned stream is ready for PCM writes.
    async fn open(&self, config: &RecognitionConfig) -> Result<Self::Stream, BackendError>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "backend"
    }
}

/// One open recognition stream.
#[async_trait::async_trait]
pub trait BackendStream: Send {
    /// Send one PCM buffer. The slice is not retained.
    async fn write(&mut self, pcm: &[u8]) -> Result<(), BackendError>;

    /// Signal that no more audio will be sent.
    async fn half_close(&mut self) -> Result<(), BackendError>;

    /// Wait for the next response. `Ok(None)` is a clean end-of-stream.
    async fn receive(&mut self) -> Result<Option<RecognizeResponse>, BackendError>;
}
