//! Newline-delimited JSON protocol spoken with the recognition backend.

use crate::pipeline::types::TranscriptionResult;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Messages sent by the relay to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Configuration handshake, sent exactly once before any audio.
    Config {
        encoding: String,
        sample_rate_hertz: u32,
        audio_channel_count: u16,
        language_code: String,
    },
    /// One PCM buffer, base64-encoded.
    Audio { content: String },
}

impl ClientMessage {
    /// Handshake for 16-bit linear PCM.
    pub fn config(sample_rate: u32, channels: u16, language: &str) -> Self {
        ClientMessage::Config {
            encoding: "linear16".to_string(),
            sample_rate_hertz: sample_rate,
            audio_channel_count: channels,
            language_code: language.to_string(),
        }
    }

    pub fn audio(pcm: &[u8]) -> Self {
        ClientMessage::Audio {
            content: STANDARD.encode(pcm),
        }
    }

    /// Decoded audio payload, if this is an audio message.
    pub fn audio_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            ClientMessage::Audio { content } => Some(STANDARD.decode(content)),
            ClientMessage::Config { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// One response from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BackendStatus>,
}

/// A recognized segment with its candidate transcriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Structured error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl RecognizeResponse {
    pub fn with_results(results: Vec<RecognitionResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    pub fn with_error(code: i32, message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            error: Some(BackendStatus {
                code,
                message: message.into(),
            }),
        }
    }

    /// Flatten into relay results: one per alternative, in backend order.
    pub fn transcriptions(&self) -> Vec<TranscriptionResult> {
        self.results
            .iter()
            .flat_map(|result| {
                result.alternatives.iter().map(move |alt| {
                    TranscriptionResult::new(alt.transcript.clone(), alt.confidence, result.is_final)
                })
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl RecognitionResult {
    pub fn new(alternatives: Vec<Alternative>, is_final: bool) -> Self {
        Self {
            alternatives,
            is_final,
        }
    }
}

impl Alternative {
    pub fn new(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
        }
    }
}
