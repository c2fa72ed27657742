//! Scripted in-memory backend.
//!
//! Records every handshake and write, returns a fixed finalization
//! response, and can inject failures at each step. Clones share state, so
//! a test keeps one handle for inspection while the pipeline owns another.

use super::protocol::RecognizeResponse;
use super::{BackendError, BackendStream, RecognitionConfig, TranscriptionBackend};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum FinalResponse {
    Response(RecognizeResponse),
    EndOfStream,
    Error(String),
}

#[derive(Debug)]
struct MockState {
    response: FinalResponse,
    open_error: Option<String>,
    fail_write_at: Option<usize>,
    fail_half_close: bool,
    write_delay: Option<Duration>,
    configs: Vec<RecognitionConfig>,
    writes: Vec<Vec<u8>>,
    open_count: usize,
    half_closed: bool,
    writes_after_close: usize,
    receive_count: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            response: FinalResponse::EndOfStream,
            open_error: None,
            fail_write_at: None,
            fail_half_close: false,
            write_delay: None,
            configs: Vec::new(),
            writes: Vec::new(),
            open_count: 0,
            half_closed: false,
            writes_after_close: 0,
            receive_count: 0,
        }
    }
}

/// Scripted backend for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A backend that accepts everything and ends the stream without a response.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return `response` from the finalization receive.
    pub fn with_response(self, response: RecognizeResponse) -> Self {
        self.state().response = FinalResponse::Response(response);
        self
    }

    /// Report a clean end-of-stream from the finalization receive.
    pub fn with_end_of_stream(self) -> Self {
        self.state().response = FinalResponse::EndOfStream;
        self
    }

    /// Fail the finalization receive with a protocol error.
    pub fn with_receive_error(self, message: impl Into<String>) -> Self {
        self.state().response = FinalResponse::Error(message.into());
        self
    }

    /// Refuse to open streams.
    pub fn fail_open(self, message: impl Into<String>) -> Self {
        self.state().open_error = Some(message.into());
        self
    }

    /// Fail the write with this zero-based index.
    pub fn fail_write_at(self, index: usize) -> Self {
        self.state().fail_write_at = Some(index);
        self
    }

    /// Fail the half-close.
    pub fn fail_half_close(self) -> Self {
        self.state().fail_half_close = true;
        self
    }

    /// Delay each write by `delay`.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state().write_delay = Some(delay);
        self
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state().writes.len()
    }

    /// Handshakes received, one per opened stream.
    pub fn configs(&self) -> Vec<RecognitionConfig> {
        self.state().configs.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    pub fn half_closed(&self) -> bool {
        self.state().half_closed
    }

    /// Writes attempted after half-close. Always zero for a correct caller.
    pub fn writes_after_close(&self) -> usize {
        self.state().writes_after_close
    }

    pub fn receive_count(&self) -> usize {
        self.state().receive_count
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for MockBackend {
    type Stream = MockStream;

    async fn open(&self, config: &RecognitionConfig) -> Result<MockStream, BackendError> {
        let mut state = self.state();
        state.open_count += 1;
        if let Some(message) = &state.open_error {
            return Err(BackendError::Connect {
                message: message.clone(),
            });
        }
        state.configs.push(config.clone());
        Ok(MockStream {
            state: Arc::clone(&self.state),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Stream handed out by [`MockBackend`].
#[derive(Debug)]
pub struct MockStream {
    state: Arc<Mutex<MockState>>,
}

impl MockStream {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl BackendStream for MockStream {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), BackendError> {
        let delay = self.state().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.half_closed {
            state.writes_after_close += 1;
            return Err(BackendError::Closed);
        }
        if state.fail_write_at == Some(state.writes.len()) {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        state.writes.push(pcm.to_vec());
        Ok(())
    }

    async fn half_close(&mut self) -> Result<(), BackendError> {
        let mut state = self.state();
        if state.fail_half_close {
            return Err(BackendError::Closed);
        }
        state.half_closed = true;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<RecognizeResponse>, BackendError> {
        let mut state = self.state();
        state.receive_count += 1;
        match &state.response {
            FinalResponse::Response(response) => Ok(Some(response.clone())),
            FinalResponse::EndOfStream => Ok(None),
            FinalResponse::Error(message) => Err(BackendError::Protocol {
                message: message.clone(),
            }),
        }
    }
}
