//! Server configuration
//!
//! Defaults match the reference deployment (ws://127.0.0.1:8000, 100ms ticks).
//! A TOML file may override any field; CLI flags are applied on top by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::net::lookup_host;

use crate::error::ConfigError;
use crate::phase::DEFAULT_TIME_STEP;
use crate::signal::DEFAULT_NOISE_AMPLITUDE;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Config file name inside the platform config dir
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Interface to listen on
    pub host: String,
    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Wall-clock delay between samples
    pub tick_interval_ms: u64,
    /// Phase advance per sample
    pub time_step: f64,
    /// Bound on the uniform angular noise
    pub noise_amplitude: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            time_step: DEFAULT_TIME_STEP,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
        }
    }
}

impl StreamConfig {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file. Values are checked by [`StreamConfig::validate`] once
    /// all overrides are layered on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content, path)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Load from `explicit` if given, else the default location if it exists,
    /// else fall back to defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_step must be a positive finite number, got {}",
                self.time_step
            )));
        }
        if !self.noise_amplitude.is_finite() || self.noise_amplitude < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "noise_amplitude must be a non-negative finite number, got {}",
                self.noise_amplitude
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// `host:port` as given, bracketing bare IPv6 hosts
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Resolve the bind address, taking the first result
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        lookup_host(self.bind_address())
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("{} did not resolve to any address", self.host),
                )
            })
    }
}

/// `<config dir>/sinecast/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sinecast").join(CONFIG_FILE))
}
