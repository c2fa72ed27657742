//! Per-track audio pipeline: ingest → decode → forward, then finalization.

use super::error::PipelineError;
use super::ingest::{Ingest, IngestEvent};
use super::types::PipelineState;
use super::watchdog::Watchdog;
use crate::backend::{BackendStream, RecognitionStream};
use crate::config::Config;
use crate::decode::FrameDecoder;
use crate::defaults;
use crate::source::{FrameSource, IngestError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Watchdog intervals for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Allowed wait before the first frame.
    pub first_frame_timeout: Duration,
    /// Allowed gap between consecutive frames.
    pub frame_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_frame_timeout: Duration::from_millis(defaults::FIRST_FRAME_TIMEOUT_MS),
            frame_timeout: Duration::from_millis(defaults::FRAME_TIMEOUT_MS),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            first_frame_timeout: Duration::from_millis(config.pipeline.first_frame_timeout_ms),
            frame_timeout: Duration::from_millis(config.pipeline.frame_timeout_ms),
        }
    }
}

/// Outcome of [`AudioPipeline::run`].
#[derive(Debug)]
pub struct PipelineReport {
    pub track_id: String,
    /// `Closed` or `Failed`.
    pub state: PipelineState,
    /// Frames decoded and written to the backend.
    pub frames: u64,
    /// Why the process loop stopped, if it failed.
    pub error: Option<PipelineError>,
    /// Failure during finalization, if any.
    pub finalize_error: Option<PipelineError>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Closed
    }

    /// The first error encountered, or the frame count on success.
    pub fn into_result(self) -> Result<u64, PipelineError> {
        match (self.error, self.finalize_error) {
            (Some(error), _) | (None, Some(error)) => Err(error),
            (None, None) => Ok(self.frames),
        }
    }
}

/// Owns one track's decoder and recognition stream for the track's lifetime.
pub struct AudioPipeline<D, S> {
    decoder: D,
    stream: RecognitionStream<S>,
    config: PipelineConfig,
    cancel: CancellationToken,
    track_id: String,
    state: PipelineState,
}

impl<D, S> AudioPipeline<D, S>
where
    D: FrameDecoder,
    S: BackendStream + 'static,
{
    /// `stream` must already have completed its handshake.
    pub fn new(decoder: D, stream: RecognitionStream<S>, config: PipelineConfig) -> Self {
        Self {
            decoder,
            stream,
            config,
            cancel: CancellationToken::new(),
            track_id: String::from("track"),
            state: PipelineState::Idle,
        }
    }

    /// Stop both stages when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_track_id(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = track_id.into();
        self
    }

    /// Drive the pipeline to a terminal state.
    ///
    /// Finalization runs on every path, including failures.
    pub async fn run<F>(mut self, source: F) -> PipelineReport
    where
        F: FrameSource + 'static,
    {
        info!(
            track_id = %self.track_id,
            decoder = self.decoder.name(),
            source = source.name(),
            "Pipeline started"
        );

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let (acks_tx, acks_rx) = mpsc::channel(1);
        let (mut watchdog, watchdog_handle) = Watchdog::start(self.config.first_frame_timeout);
        let ingest_cancel = self.cancel.child_token();

        let ingest = Ingest::new(
            source,
            watchdog_handle,
            self.config.frame_timeout,
            events_tx,
            acks_rx,
            ingest_cancel.clone(),
        );
        let ingest_task = tokio::spawn(ingest.run());

        let outcome = self.process(&mut events_rx, acks_tx, &mut watchdog).await;

        ingest_cancel.cancel();
        drop(events_rx);
        match ingest_task.await {
            Ok(handed_over) => debug!(track_id = %self.track_id, handed_over, "Ingest stopped"),
            Err(e) => warn!(track_id = %self.track_id, error = %e, "Ingest task failed"),
        }

        let error = match outcome {
            Ok(()) => {
                self.transition(PipelineState::Draining);
                None
            }
            Err(error) => {
                warn!(
                    track_id = %self.track_id,
                    kind = error.kind(),
                    frames = self.stream.writes(),
                    error = %error,
                    "Pipeline failed"
                );
                self.transition(PipelineState::Failed);
                Some(error)
            }
        };

        let frames = self.stream.writes();
        let finalize_error = match self.stream.close().await {
            Ok(()) => None,
            Err(e) => {
                warn!(track_id = %self.track_id, error = %e, "Finalization failed");
                Some(e)
            }
        };

        let state = if error.is_none() && finalize_error.is_none() {
            PipelineState::Closed
        } else {
            PipelineState::Failed
        };
        // `close` consumed the stream, so update the state field directly
        debug_assert!(self.state == state || self.state.can_transition_to(state));
        self.state = state;
        debug_assert!(self.state.is_terminal());

        info!(
            track_id = %self.track_id,
            state = %state,
            frames,
            "Pipeline finished"
        );

        PipelineReport {
            track_id: self.track_id,
            state,
            frames,
            error,
            finalize_error,
        }
    }

    /// Process loop. Returns `Ok` on clean end-of-input.
    async fn process(
        &mut self,
        events: &mut mpsc::Receiver<IngestEvent>,
        acks: mpsc::Sender<()>,
        watchdog: &mut Watchdog,
    ) -> Result<(), PipelineError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                event = events.recv() => event,
                after = watchdog.expired() => return Err(PipelineError::Timeout { after }),
            };

            let frame = match event {
                Some(IngestEvent::Frame(frame)) => frame,
                Some(IngestEvent::Ended) => {
                    debug!(track_id = %self.track_id, frames = self.stream.writes(), "Ingest ended");
                    return Ok(());
                }
                Some(IngestEvent::Failed(error)) => return Err(error.into()),
                None => {
                    return Err(IngestError::new("ingest task stopped unexpectedly").into());
                }
            };

            let pcm = self
                .decoder
                .decode(&frame.payload)
                .map_err(|source| PipelineError::Decode {
                    sequence: frame.sequence,
                    source,
                })?;
            trace!(sequence = frame.sequence, bytes = pcm.len(), "Decoded frame");

            // `pcm` borrows the decoder, so update the state field directly
            if self.state == PipelineState::Idle {
                debug!(track_id = %self.track_id, "First frame decoded");
                self.state = PipelineState::Streaming;
            }

            if acks.send(()).await.is_err() {
                debug!(sequence = frame.sequence, "Ingest already stopped");
            }

            debug_assert!(self.state.accepts_audio());
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                after = watchdog.expired() => return Err(PipelineError::Timeout { after }),
                written = self.stream.write(pcm) => written?,
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(track_id = %self.track_id, from = %self.state, to = %next, "State change");
        self.state = next;
    }
}
