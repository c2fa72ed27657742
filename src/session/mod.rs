//! Session wiring: one pipeline per inbound audio track.

#[cfg(feature = "server")]
pub mod http;
#[cfg(feature = "webrtc")]
pub mod webrtc;

use crate::backend::{RecognitionConfig, RecognitionStream, TranscriptionBackend};
use crate::decode::FrameDecoder;
use crate::pipeline::{
    AudioPipeline, PipelineConfig, PipelineReport, PipelineState, RelayReport, relay_results,
};
use crate::sink::ResultSink;
use crate::source::FrameSource;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Failures creating or negotiating a peer session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session offer: {message}")]
    InvalidOffer { message: String },

    #[error("Peer connection error: {message}")]
    Peer { message: String },
}

/// Negotiates peer connections. Each accepted session may start pipelines.
#[async_trait::async_trait]
pub trait PeerSessionManager: Send + Sync {
    /// Apply a remote SDP offer and return the local SDP answer.
    async fn create_session(&self, offer: String) -> Result<String, SessionError>;

    /// Sessions currently tracked.
    fn active_sessions(&self) -> usize {
        0
    }
}

/// Outcome of one track.
#[derive(Debug)]
pub struct TrackReport {
    pub pipeline: PipelineReport,
    pub relay: RelayReport,
}

impl TrackReport {
    pub fn is_success(&self) -> bool {
        self.pipeline.is_success()
    }
}

/// Everything one track needs besides its source and sink.
pub struct TrackContext<'a, B: ?Sized> {
    pub track_id: &'a str,
    pub backend: &'a B,
    pub recognition: &'a RecognitionConfig,
    pub pipeline: PipelineConfig,
    pub cancel: CancellationToken,
}

/// Run one track end to end.
///
/// Opens the recognition stream, runs the pipeline while relaying results
/// to `sink` concurrently, and always closes `sink` before returning.
pub async fn run_track<B, D, F, K>(
    context: TrackContext<'_, B>,
    decoder: D,
    source: F,
    sink: &mut K,
) -> TrackReport
where
    B: TranscriptionBackend + ?Sized,
    D: FrameDecoder,
    F: FrameSource + 'static,
    K: ResultSink + ?Sized,
{
    let TrackContext {
        track_id,
        backend,
        recognition,
        pipeline: pipeline_config,
        cancel,
    } = context;

    let (stream, results) = match RecognitionStream::open(backend, recognition).await {
        Ok(opened) => opened,
        Err(error) => {
            warn!(track_id, error = %error, "Failed to start track");
            if let Err(e) = sink.close().await {
                warn!(track_id, error = %e, "Failed to close side-channel");
            }
            return TrackReport {
                pipeline: PipelineReport {
                    track_id: track_id.to_string(),
                    state: PipelineState::Failed,
                    frames: 0,
                    error: Some(error),
                    finalize_error: None,
                },
                relay: RelayReport::default(),
            };
        }
    };

    let pipeline = AudioPipeline::new(decoder, stream, pipeline_config)
        .with_track_id(track_id)
        .with_cancellation(cancel);

    let (pipeline, relay) = tokio::join!(pipeline.run(source), relay_results(results, sink));

    info!(
        track_id,
        state = %pipeline.state,
        frames = pipeline.frames,
        delivered = relay.delivered,
        failed = relay.failed,
        "Track finished"
    );

    TrackReport { pipeline, relay }
}
