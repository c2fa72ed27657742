//! voxrelay - Relay browser audio to a streaming speech recognizer
//!
//! One pipeline per inbound track: frames are decoded and forwarded to a
//! recognition stream under a watchdog, and the recognizer's results are
//! relayed back to the peer once the stream is finalized.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod decode;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod source;

// Core traits (source → decode → backend → sink)
pub use backend::{BackendStream, TranscriptionBackend};
pub use decode::FrameDecoder;
pub use session::PeerSessionManager;
pub use sink::ResultSink;
pub use source::FrameSource;

// Pipeline
pub use pipeline::{AudioPipeline, PipelineConfig, PipelineReport, PipelineState};
pub use session::{TrackContext, TrackReport, run_track};

// Error handling
pub use error::{RelayError, Result};
pub use pipeline::PipelineError;

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.0.1+abc1234"` when git hash is available, `"0.0.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
