//! Default configuration constants for voxrelay.
//!
//! Shared by the config file defaults, the CLI and the pipeline so the
//! same numbers are used everywhere.

/// Sample rate of the PCM forwarded to the recognizer, in Hz.
///
/// WebRTC negotiates Opus at 48kHz; the decoder output is forwarded as-is.
pub const SAMPLE_RATE: u32 = 48000;

/// Channel count of the forwarded PCM.
pub const CHANNELS: u16 = 1;

/// Default recognition language (BCP-47).
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Watchdog interval before the first frame arrives, in milliseconds.
///
/// Longer than the steady-state interval to absorb ICE/DTLS setup latency.
pub const FIRST_FRAME_TIMEOUT_MS: u64 = 5000;

/// Watchdog interval between consecutive frames, in milliseconds.
pub const FRAME_TIMEOUT_MS: u64 = 1000;

/// Default HTTP listen address for the session endpoint.
pub const LISTEN_ADDR: &str = "0.0.0.0:9000";

/// Default STUN server handed to the peer connection.
pub const STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Default recognition backend address.
pub const BACKEND_ADDR: &str = "127.0.0.1:50051";

/// Backend connect timeout in milliseconds.
pub const BACKEND_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default log filter when `RUST_LOG` is unset.
pub const LOG_FILTER: &str = "voxrelay=info";

/// Frame duration used when replaying WAV files, in milliseconds.
pub const REPLAY_FRAME_MS: u32 = 20;

/// Largest Opus packet duration (120ms) at 48kHz, in samples per channel.
pub const MAX_OPUS_FRAME_SAMPLES: usize = 5760;

/// Largest inbound frame accepted by the PCM passthrough decoder, in bytes.
///
/// 120ms of 48kHz stereo L16.
pub const MAX_FRAME_BYTES: usize = MAX_OPUS_FRAME_SAMPLES * 2 * 2;

/// Name of the data channel the browser opens for results.
pub const DATA_CHANNEL_LABEL: &str = "results";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_timeout_exceeds_frame_timeout() {
        assert!(FIRST_FRAME_TIMEOUT_MS > FRAME_TIMEOUT_MS);
        assert_eq!(FIRST_FRAME_TIMEOUT_MS, 5 * FRAME_TIMEOUT_MS);
    }

    #[test]
    fn max_frame_bytes_covers_120ms_stereo() {
        assert_eq!(MAX_FRAME_BYTES, 48 * 120 * 2 * 2);
    }
}
