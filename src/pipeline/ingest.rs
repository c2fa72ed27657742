//! Ingest stage: pulls frames from the source and hands them over one at a time.

use super::watchdog::WatchdogHandle;
use crate::pipeline::types::AudioFrame;
use crate::source::{FrameSource, IngestError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// What ingest reports to the process stage.
#[derive(Debug)]
pub(crate) enum IngestEvent {
    Frame(AudioFrame),
    Ended,
    Failed(IngestError),
}

/// Ingest loop state. Consumed by [`Ingest::run`].
pub(crate) struct Ingest<F> {
    source: F,
    watchdog: WatchdogHandle,
    frame_timeout: Duration,
    events: mpsc::Sender<IngestEvent>,
    acks: mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl<F: FrameSource> Ingest<F> {
    pub(crate) fn new(
        source: F,
        watchdog: WatchdogHandle,
        frame_timeout: Duration,
        events: mpsc::Sender<IngestEvent>,
        acks: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            watchdog,
            frame_timeout,
            events,
            acks,
            cancel,
        }
    }

    /// Run until end-of-input, a read error, cancellation, or the process
    /// stage going away. Returns the number of frames handed over.
    pub(crate) async fn run(mut self) -> u64 {
        let mut handed_over = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(source = self.source.name(), "Ingest cancelled");
                    break;
                }
                next = self.source.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    self.watchdog.reset(self.frame_timeout);
                    let sequence = frame.sequence;
                    trace!(sequence, bytes = frame.len(), "Frame received");

                    if self.events.send(IngestEvent::Frame(frame)).await.is_err() {
                        debug!(sequence, "Process stage stopped, dropping frame");
                        break;
                    }
                    handed_over += 1;

                    // Rendezvous: the next frame is not requested until this one is consumed
                    let acked = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => false,
                        ack = self.acks.recv() => ack.is_some(),
                    };
                    if !acked {
                        debug!(sequence, "Frame not acknowledged, stopping ingest");
                        break;
                    }
                }
                Ok(None) => {
                    self.watchdog.stop();
                    debug!(frames = handed_over, "End of input");
                    if self.events.send(IngestEvent::Ended).await.is_err() {
                        debug!("Process stage stopped before end of input");
                    }
                    break;
                }
                Err(error) => {
                    self.watchdog.stop();
                    debug!(error = %error, "Ingest read failed");
                    if self.events.send(IngestEvent::Failed(error)).await.is_err() {
                        debug!("Process stage stopped before ingest error");
                    }
                    break;
                }
            }
        }

        handed_over
    }
}
