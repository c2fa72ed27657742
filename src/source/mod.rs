//! Inbound frame sources.
//!
//! A source is a lazy, pull-based sequence of compressed frames. The
//! pipeline requests one frame at a time and never asks for the next
//! until the previous one has been consumed.

pub mod scripted;
pub mod wav;

pub use scripted::{ScriptedFrameSource, SourceStep};
pub use wav::WavFrameSource;

use crate::pipeline::types::AudioFrame;
use thiserror::Error;

/// Hard failure reading from the inbound transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to read inbound frame: {message}")]
pub struct IngestError {
    pub message: String,
}

impl IngestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pull-based source of compressed audio frames.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame.
    ///
    /// `Ok(None)` signals clean end-of-input; an error is a hard failure.
    /// Neither is followed by further frames.
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, IngestError>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "source"
    }
}

#[async_trait::async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, IngestError> {
        (**self).next_frame().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_display() {
        assert_eq!(
            IngestError::new("socket closed").to_string(),
            "Failed to read inbound frame: socket closed"
        );
    }
}
