//! Terminal errors of the per-track audio pipeline.
//!
//! Every variant is fatal: the pipeline moves to `Failed`, runs
//! finalization on a best-effort basis and returns the error to its caller.

use crate::backend::BackendError;
use crate::decode::DecodeError;
use crate::source::IngestError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to decode frame {sequence}: {source}")]
    Decode {
        sequence: u64,
        #[source]
        source: DecodeError,
    },

    #[error("Failed to open recognition stream: {0}")]
    BackendOpen(#[source] BackendError),

    #[error("Failed to write audio to recognition stream: {0}")]
    BackendWrite(#[source] BackendError),

    #[error("Failed to close recognition stream: {0}")]
    BackendClose(#[source] BackendError),

    #[error("(Code: {code}) {message}")]
    BackendReported { code: i32, message: String },

    #[error("Read operation timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error("{0}")]
    Ingest(#[from] IngestError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable short name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode { .. } => "decode",
            PipelineError::BackendOpen(_) => "backend_open",
            PipelineError::BackendWrite(_) => "backend_write",
            PipelineError::BackendClose(_) => "backend_close",
            PipelineError::BackendReported { .. } => "backend_reported",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Ingest(_) => "ingest",
            PipelineError::Cancelled => "cancelled",
        }
    }

    /// Returns true if the watchdog expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let error = PipelineError::Timeout {
            after: Duration::from_secs(1),
        };
        assert_eq!(error.to_string(), "Read operation timed out after 1000ms");
        assert!(error.is_timeout());
        assert_eq!(error.kind(), "timeout");
    }

    #[test]
    fn test_backend_reported_display() {
        let error = PipelineError::BackendReported {
            code: 3,
            message: "invalid audio".to_string(),
        };
        assert_eq!(error.to_string(), "(Code: 3) invalid audio");
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let error = PipelineError::Decode {
            sequence: 4,
            source: DecodeError::EmptyFrame,
        };
        assert_eq!(error.to_string(), "Failed to decode frame 4: Empty frame");
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_from_ingest_error() {
        let error: PipelineError = IngestError::new("connection reset").into();
        assert_eq!(error.kind(), "ingest");
        assert!(error.to_string().contains("connection reset"));
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            PipelineError::Decode {
                sequence: 0,
                source: DecodeError::EmptyFrame,
            }
            .kind(),
            PipelineError::BackendOpen(BackendError::Closed).kind(),
            PipelineError::BackendWrite(BackendError::Closed).kind(),
            PipelineError::BackendClose(BackendError::Closed).kind(),
            PipelineError::BackendReported {
                code: 1,
                message: String::new(),
            }
            .kind(),
            PipelineError::Timeout {
                after: Duration::ZERO,
            }
            .kind(),
            PipelineError::Ingest(IngestError::new("x")).kind(),
            PipelineError::Cancelled.kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
