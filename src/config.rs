use crate::defaults;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub recognition: RecognitionSection,
    pub pipeline: PipelineSection,
    pub logging: LoggingConfig,
}

/// HTTP session endpoint and peer connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub stun_server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

/// Recognition backend connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub address: String,
    pub connect_timeout_ms: u64,
}

/// Audio format and language sent in the recognition handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionSection {
    pub sample_rate: u32,
    pub channels: u16,
    pub language: String,
}

/// Watchdog intervals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub first_frame_timeout_ms: u64,
    pub frame_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: defaults::LISTEN_ADDR.to_string(),
            stun_server: defaults::STUN_SERVER.to_string(),
            static_dir: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: defaults::BACKEND_ADDR.to_string(),
            connect_timeout_ms: defaults::BACKEND_CONNECT_TIMEOUT_MS,
        }
    }
}

impl Default for RecognitionSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            first_frame_timeout_ms: defaults::FIRST_FRAME_TIMEOUT_MS,
            frame_timeout_ms: defaults::FRAME_TIMEOUT_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(RelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXRELAY_BACKEND_ADDR → backend.address
    /// - VOXRELAY_LANGUAGE → recognition.language
    /// - VOXRELAY_LISTEN → server.listen
    /// - VOXRELAY_STUN_SERVER → server.stun_server
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(address) = std::env::var("VOXRELAY_BACKEND_ADDR")
            && !address.is_empty()
        {
            self.backend.address = address;
        }

        if let Ok(language) = std::env::var("VOXRELAY_LANGUAGE")
            && !language.is_empty()
        {
            self.recognition.language = language;
        }

        if let Ok(listen) = std::env::var("VOXRELAY_LISTEN")
            && !listen.is_empty()
        {
            self.server.listen = listen;
        }

        if let Ok(stun) = std::env::var("VOXRELAY_STUN_SERVER")
            && !stun.is_empty()
        {
            self.server.stun_server = stun;
        }

        self
    }

    /// Check values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.recognition.sample_rate == 0 {
            return Err(invalid("recognition.sample_rate", "must be greater than 0"));
        }
        if !(1..=2).contains(&self.recognition.channels) {
            return Err(invalid("recognition.channels", "must be 1 or 2"));
        }
        if self.recognition.language.trim().is_empty() {
            return Err(invalid("recognition.language", "must not be empty"));
        }
        if self.pipeline.frame_timeout_ms == 0 {
            return Err(invalid("pipeline.frame_timeout_ms", "must be greater than 0"));
        }
        if self.pipeline.first_frame_timeout_ms < self.pipeline.frame_timeout_ms {
            return Err(invalid(
                "pipeline.first_frame_timeout_ms",
                "must not be shorter than pipeline.frame_timeout_ms",
            ));
        }
        if self.backend.connect_timeout_ms == 0 {
            return Err(invalid("backend.connect_timeout_ms", "must be greater than 0"));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxrelay/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("voxrelay").join("config.toml"))
            .ok_or(RelayError::ConfigDirUnavailable)
    }
}

fn invalid(key: &str, message: &str) -> RelayError {
    RelayError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
