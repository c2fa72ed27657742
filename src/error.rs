//! Error types for voxrelay.

use crate::pipeline::PipelineError;
use crate::session::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Could not determine config directory")]
    ConfigDirUnavailable,

    // Pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    // Session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[test]
    fn test_config_invalid_value_display() {
        let error = RelayError::ConfigInvalidValue {
            key: "recognition.channels".to_string(),
            message: "must be 1 or 2".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for recognition.channels: must be 1 or 2"
        );
    }

    #[test]
    fn test_config_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("[broken").unwrap_err();
        let error: RelayError = toml_error.into();
        assert!(error.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_pipeline_error_conversion() {
        let error: RelayError = PipelineError::Timeout {
            after: Duration::from_secs(1),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Pipeline error: Read operation timed out after 1000ms"
        );
    }

    #[test]
    fn test_session_error_conversion() {
        let error: RelayError = SessionError::Peer {
            message: "ice failed".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Session error: Peer connection error: ice failed"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RelayError = io_error.into();
        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(RelayError::ConfigDirUnavailable)
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RelayError>();
        assert_sync::<RelayError>();
    }
}
