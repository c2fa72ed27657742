//! Command-line interface for voxrelay
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Relay browser audio to a streaming speech recognizer
#[derive(Parser, Debug)]
#[command(
    name = "voxrelay",
    version,
    about = "Relay browser audio to a streaming speech recognizer"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Signed verbosity for `logging::init`; quiet wins over `-v`.
    pub fn verbosity(&self) -> i8 {
        if self.quiet {
            -1
        } else {
            self.verbose.min(i8::MAX as u8) as i8
        }
    }
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime` (`5s`, `1500ms`,
/// `1m30s`). Bare numbers are seconds. The result must fit in whole
/// milliseconds as a `u64`.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    let duration = match s.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if u64::try_from(duration.as_millis()).is_err() {
        return Err(format!("duration {s} is too large"));
    }
    Ok(duration)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the session endpoint and relay WebRTC audio to the backend
    Serve {
        /// Listen address for the HTTP session endpoint
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// STUN server handed to peer connections
        #[arg(long, value_name = "URL")]
        stun_server: Option<String>,

        /// Recognition backend address (host:port)
        #[arg(long, value_name = "ADDR")]
        backend: Option<String>,

        /// Time to wait for the first audio frame (e.g. 5s)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        first_frame_timeout: Option<Duration>,

        /// Time to wait between audio frames (e.g. 1s, 1500ms)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        frame_timeout: Option<Duration>,

        /// Directory served for paths other than /session
        #[arg(long, value_name = "DIR")]
        static_dir: Option<PathBuf>,
    },

    /// Stream a 16-bit WAV file through the pipeline and print results
    Replay {
        /// WAV file to replay
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Recognition backend address (host:port)
        #[arg(long, value_name = "ADDR")]
        backend: Option<String>,

        /// Frame duration in milliseconds
        #[arg(long, value_name = "MS", default_value_t = crate::defaults::REPLAY_FRAME_MS)]
        frame_ms: u32,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["voxrelay", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                listen,
                stun_server,
                backend,
                first_frame_timeout,
                frame_timeout,
                static_dir,
            } => {
                assert!(listen.is_none());
                assert!(stun_server.is_none());
                assert!(backend.is_none());
                assert!(first_frame_timeout.is_none());
                assert!(frame_timeout.is_none());
                assert!(static_dir.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_serve_with_options() {
        let cli = Cli::try_parse_from([
            "voxrelay",
            "serve",
            "--listen",
            "127.0.0.1:9100",
            "--backend",
            "speech:50051",
            "--first-frame-timeout",
            "8s",
            "--frame-timeout",
            "1500ms",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve {
                listen,
                backend,
                first_frame_timeout,
                frame_timeout,
                ..
            } => {
                assert_eq!(listen.as_deref(), Some("127.0.0.1:9100"));
                assert_eq!(backend.as_deref(), Some("speech:50051"));
                assert_eq!(first_frame_timeout, Some(Duration::from_secs(8)));
                assert_eq!(frame_timeout, Some(Duration::from_millis(1500)));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_bare_number_duration_is_seconds() {
        let cli =
            Cli::try_parse_from(["voxrelay", "serve", "--frame-timeout", "2"]).unwrap();
        match cli.command {
            Commands::Serve { frame_timeout, .. } => {
                assert_eq!(frame_timeout, Some(Duration::from_secs(2)));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_invalid_duration_fails() {
        let result = Cli::try_parse_from(["voxrelay", "serve", "--frame-timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_duration_overflowing_millis_fails() {
        // 6e17 seconds is more milliseconds than u64 can hold
        let result = Cli::try_parse_from([
            "voxrelay",
            "serve",
            "--frame-timeout",
            "600000000000000000",
        ]);
        assert!(result.is_err());

        assert!(parse_duration("600000000000000000").is_err());
        assert_eq!(
            parse_duration("18446744073709551"),
            Ok(Duration::from_secs(18_446_744_073_709_551))
        );
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from(["voxrelay", "replay", "speech.wav"]).unwrap();
        match cli.command {
            Commands::Replay {
                file,
                backend,
                frame_ms,
            } => {
                assert_eq!(file, PathBuf::from("speech.wav"));
                assert!(backend.is_none());
                assert_eq!(frame_ms, 20);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_parse_replay_requires_file() {
        assert!(Cli::try_parse_from(["voxrelay", "replay"]).is_err());
    }

    #[test]
    fn test_parse_replay_frame_ms() {
        let cli =
            Cli::try_parse_from(["voxrelay", "replay", "a.wav", "--frame-ms", "40"]).unwrap();
        match cli.command {
            Commands::Replay { frame_ms, .. } => assert_eq!(frame_ms, 40),
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["voxrelay", "config", "show"]).unwrap();
        match cli.command {
            Commands::Config { action } => assert_eq!(action, ConfigAction::Show),
            _ => panic!("Expected Config command"),
        }

        let cli = Cli::try_parse_from(["voxrelay", "config", "path"]).unwrap();
        match cli.command {
            Commands::Config { action } => assert_eq!(action, ConfigAction::Path),
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voxrelay",
            "serve",
            "--config",
            "/etc/voxrelay.toml",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/voxrelay.toml")));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.verbosity(), 2);
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let cli = Cli::try_parse_from(["voxrelay", "-q", "-v", "config", "path"]).unwrap();
        assert_eq!(cli.verbosity(), -1);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["voxrelay"]).is_err());
    }
}
