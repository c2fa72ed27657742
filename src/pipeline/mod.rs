//! Per-track audio pipeline.
//!
//! Two concurrent stages joined by a capacity-one handoff: ingest pulls a
//! frame and waits for it to be acknowledged; the process stage decodes,
//! acknowledges, and forwards the PCM. A single watchdog, an error path and
//! a cancellation token can stop the loop at any point, after which the
//! recognition stream is finalized and its results relayed.

pub mod audio_pipeline;
pub mod error;
mod ingest;
pub mod relay;
pub mod types;
pub mod watchdog;

pub use audio_pipeline::{AudioPipeline, PipelineConfig, PipelineReport};
pub use error::PipelineError;
pub use relay::{RelayReport, relay_results};
pub use types::{AudioFrame, PipelineState, TranscriptionResult};
pub use watchdog::{Watchdog, WatchdogHandle};
