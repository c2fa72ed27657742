//! Scripted frame source for tests and demos.

use super::{FrameSource, IngestError};
use crate::pipeline::types::AudioFrame;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One step of a scripted source.
#[derive(Debug, Clone)]
pub enum SourceStep {
    /// Deliver a frame with this payload.
    Frame(Vec<u8>),
    /// Wait before the next step.
    Delay(Duration),
    /// Fail with a hard read error.
    Error(String),
    /// Never deliver anything again.
    Stall,
}

/// Frame source that replays a fixed script.
///
/// When the script runs out the source reports clean end-of-input.
#[derive(Debug, Clone)]
pub struct ScriptedFrameSource {
    steps: VecDeque<SourceStep>,
    sequence: u64,
    requests: Arc<AtomicUsize>,
}

impl ScriptedFrameSource {
    pub fn new(steps: impl IntoIterator<Item = SourceStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            sequence: 0,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` frames with distinct two-byte payloads, then end-of-input.
    pub fn frames(count: usize) -> Self {
        Self::new((0..count).map(|i| SourceStep::Frame((i as u16).to_le_bytes().to_vec())))
    }

    /// Shared counter of `next_frame` calls.
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, IngestError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        loop {
            match self.steps.pop_front() {
                Some(SourceStep::Frame(payload)) => {
                    let frame = AudioFrame::new(payload, self.sequence);
                    self.sequence += 1;
                    return Ok(Some(frame));
                }
                Some(SourceStep::Delay(duration)) => tokio::time::sleep(duration).await,
                Some(SourceStep::Error(message)) => {
                    self.steps.clear();
                    return Err(IngestError::new(message));
                }
                Some(SourceStep::Stall) => std::future::pending::<()>().await,
                None => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_then_end_of_input() {
        let mut source = ScriptedFrameSource::frames(2);
        assert_eq!(source.next_frame().await.unwrap().unwrap().payload, vec![0, 0]);
        assert_eq!(source.next_frame().await.unwrap().unwrap().payload, vec![1, 0]);
        assert_eq!(source.next_frame().await.unwrap(), None);
        assert_eq!(source.request_counter().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_ends_script() {
        let mut source = ScriptedFrameSource::new([
            SourceStep::Error("boom".to_string()),
            SourceStep::Frame(vec![1, 2]),
        ]);
        assert!(source.next_frame().await.is_err());
        assert_eq!(source.next_frame().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_step_waits() {
        let mut source = ScriptedFrameSource::new([
            SourceStep::Delay(Duration::from_millis(300)),
            SourceStep::Frame(vec![1, 2]),
        ]);
        let start = tokio::time::Instant::now();
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
