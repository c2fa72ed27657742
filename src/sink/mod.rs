//! Outbound side-channel sinks for relayed results.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to send message: {message}")]
    Send { message: String },

    #[error("Side-channel closed")]
    Closed,

    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts serialized result messages for the peer.
///
/// Each send may fail independently; callers decide whether to continue.
#[async_trait::async_trait]
pub trait ResultSink: Send {
    /// Deliver one serialized message.
    async fn send(&mut self, message: &[u8]) -> Result<(), SinkError>;

    /// Close the side-channel. Further sends fail with [`SinkError::Closed`].
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

#[async_trait::async_trait]
impl<K: ResultSink + ?Sized> ResultSink for Box<K> {
    async fn send(&mut self, message: &[u8]) -> Result<(), SinkError> {
        (**self).send(message).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[derive(Debug, Default)]
struct Collected {
    messages: Vec<String>,
    attempts: usize,
    fail_on: HashSet<usize>,
    closed: bool,
}

/// Sink that records messages in memory.
///
/// Clones share the same buffer, so a test can keep a handle while the
/// relay owns another.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the send with this zero-based attempt index.
    pub fn fail_on(self, index: usize) -> Self {
        self.inner().fail_on.insert(index);
        self
    }

    /// Successfully delivered messages, in order.
    pub fn messages(&self) -> Vec<String> {
        self.inner().messages.clone()
    }

    /// Send attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.inner().attempts
    }

    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }
}

#[async_trait::async_trait]
impl ResultSink for CollectorSink {
    async fn send(&mut self, message: &[u8]) -> Result<(), SinkError> {
        let mut inner = self.inner();
        if inner.closed {
            return Err(SinkError::Closed);
        }
        let index = inner.attempts;
        inner.attempts += 1;
        if inner.fail_on.contains(&index) {
            return Err(SinkError::Send {
                message: format!("injected failure at message {}", index),
            });
        }
        inner
            .messages
            .push(String::from_utf8_lossy(message).into_owned());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.inner().closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Writes each message as one line on stdout.
#[derive(Debug, Default)]
pub struct StdoutSink {
    closed: bool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResultSink for StdoutSink {
    async fn send(&mut self, message: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(message)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
