//! Recognition stream lifecycle: writes while streaming, then finalization.

use super::{BackendStream, RecognitionConfig, TranscriptionBackend};
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::TranscriptionResult;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receiving end of a stream's result sequence.
///
/// Closes once finalization has emitted every result, or immediately if
/// finalization produced none.
pub type ResultReceiver = mpsc::Receiver<TranscriptionResult>;

/// An open recognition stream and the sending half of its result sequence.
///
/// `close` consumes the stream, so no write can follow finalization.
pub struct RecognitionStream<S> {
    inner: S,
    results_tx: mpsc::Sender<TranscriptionResult>,
    writes: u64,
}

impl<S: BackendStream + 'static> RecognitionStream<S> {
    /// Open a stream on `backend`. The handshake has completed on success.
    ///
    /// The receiver may be drained before `close`.
    pub async fn open<B>(
        backend: &B,
        config: &RecognitionConfig,
    ) -> Result<(Self, ResultReceiver), PipelineError>
    where
        B: TranscriptionBackend<Stream = S> + ?Sized,
    {
        let inner = backend
            .open(config)
            .await
            .map_err(PipelineError::BackendOpen)?;
        debug!(
            backend = backend.name(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            language = %config.language,
            "Recognition stream opened"
        );
        Ok(Self::from_stream(inner))
    }

    /// Wrap an already-opened stream.
    pub fn from_stream(inner: S) -> (Self, ResultReceiver) {
        // Capacity 1: emission proceeds at the pace of the consumer
        let (results_tx, results_rx) = mpsc::channel(1);
        let stream = Self {
            inner,
            results_tx,
            writes: 0,
        };
        (stream, results_rx)
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Forward one PCM buffer.
    pub async fn write(&mut self, pcm: &[u8]) -> Result<(), PipelineError> {
        self.inner
            .write(pcm)
            .await
            .map_err(PipelineError::BackendWrite)?;
        self.writes += 1;
        trace!(bytes = pcm.len(), writes = self.writes, "Wrote PCM to backend");
        Ok(())
    }

    /// Half-close, receive exactly once, and emit whatever the backend returned.
    ///
    /// Emission runs on a spawned task. On every error path the result
    /// sequence is closed empty.
    pub async fn close(self) -> Result<(), PipelineError> {
        let Self {
            mut inner,
            results_tx,
            writes,
        } = self;

        inner
            .half_close()
            .await
            .map_err(PipelineError::BackendClose)?;

        let response = match inner
            .receive()
            .await
            .map_err(PipelineError::BackendClose)?
        {
            Some(response) => response,
            None => {
                debug!(writes, "Backend ended stream without a response");
                return Ok(());
            }
        };

        if let Some(status) = response.error {
            return Err(PipelineError::BackendReported {
                code: status.code,
                message: status.message,
            });
        }

        let results = response.transcriptions();
        debug!(writes, results = results.len(), "Finalization received response");

        tokio::spawn(async move {
            for result in results {
                debug!(
                    text = %result.text,
                    confidence = result.confidence,
                    is_final = result.is_final,
                    "Emitting result"
                );
                if results_tx.send(result).await.is_err() {
                    debug!("Result receiver dropped, discarding remaining results");
                    break;
                }
            }
        });

        Ok(())
    }
}
