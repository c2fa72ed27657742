//! Data types that flow through the per-track audio pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One compressed audio frame as received from the network.
///
/// The payload is opaque to the pipeline. `sequence` is the arrival order,
/// assigned by the frame source, and is only used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Compressed payload (e.g. one Opus packet).
    pub payload: Vec<u8>,
    /// Zero-based arrival position.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(payload: Vec<u8>, sequence: u64) -> Self {
        Self { payload, sequence }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A single recognition alternative relayed back to the peer.
///
/// Serialized to the side-channel as `{"text":…,"confidence":…,"final":…}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Recognized text.
    pub text: String,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether the backend marked the enclosing result as final.
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl TranscriptionResult {
    /// Creates a result, clamping confidence into `[0, 1]`.
    pub fn new(text: impl Into<String>, confidence: f32, is_final: bool) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            text: text.into(),
            confidence,
            is_final,
        }
    }

    /// Serialize to the JSON message sent over the side-channel.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a side-channel JSON message.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Lifecycle of one track's transcription session.
///
/// ```text
/// Idle ──▶ Streaming ──▶ Draining ──▶ Closed
///               │
///               └──────▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Stream and decoder constructed, no frame processed yet.
    Idle,
    /// Frames are being decoded and forwarded.
    Streaming,
    /// Ingest ended cleanly, finalization in progress.
    Draining,
    /// Terminal success.
    Closed,
    /// Terminal error.
    Failed,
}

impl PipelineState {
    /// Returns true for `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Closed | PipelineState::Failed)
    }

    /// Whether the pipeline may still write PCM to the backend.
    pub fn accepts_audio(self) -> bool {
        matches!(self, PipelineState::Idle | PipelineState::Streaming)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Streaming)
                | (Idle, Draining)
                | (Idle, Failed)
                | (Streaming, Draining)
                | (Streaming, Failed)
                | (Draining, Closed)
                | (Draining, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Streaming => "streaming",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_creation() {
        let frame = AudioFrame::new(vec![1, 2, 3], 7);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert!(AudioFrame::new(Vec::new(), 0).is_empty());
    }

    #[test]
    fn test_result_json_uses_final_key() {
        let result = TranscriptionResult::new("hello world", 0.92, true);
        let json = result.to_json().unwrap();
        assert!(json.contains("\"final\":true"), "got: {}", json);
        assert!(json.contains("\"text\":\"hello world\""), "got: {}", json);
        assert!(!json.contains("is_final"), "got: {}", json);
    }

    #[test]
    fn test_result_parses_peer_format() {
        let parsed =
            TranscriptionResult::from_json(r#"{"text":"hi","confidence":0.5,"final":false}"#)
                .unwrap();
        assert_eq!(parsed, TranscriptionResult::new("hi", 0.5, false));
    }

    #[test]
    fn test_result_confidence_is_clamped() {
        assert_eq!(TranscriptionResult::new("a", 1.7, false).confidence, 1.0);
        assert_eq!(TranscriptionResult::new("a", -0.2, false).confidence, 0.0);
        assert_eq!(TranscriptionResult::new("a", f32::NAN, false).confidence, 0.0);
    }

    #[test]
    fn test_state_transitions() {
        use PipelineState::*;
        assert!(Idle.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Closed));
        assert!(Streaming.can_transition_to(Failed));

        assert!(!Closed.can_transition_to(Streaming));
        assert!(!Failed.can_transition_to(Closed));
        assert!(!Streaming.can_transition_to(Closed));
        assert!(!Draining.can_transition_to(Streaming));
    }

    #[test]
    fn test_terminal_states_reject_audio() {
        assert!(PipelineState::Closed.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Closed.accepts_audio());
        assert!(!PipelineState::Failed.accepts_audio());
        assert!(!PipelineState::Draining.accepts_audio());
        assert!(PipelineState::Streaming.accepts_audio());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Draining.to_string(), "draining");
        assert_eq!(PipelineState::Failed.to_string(), "failed");
    }
}
