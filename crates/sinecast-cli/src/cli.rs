//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sinecast_core::{ConfigError, StreamConfig};

#[derive(Debug, Parser)]
#[command(name = "sinecast", version, about)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream samples to WebSocket clients (default)
    Serve(ServeArgs),
    /// Connect to a server and print received samples
    Tail(TailArgs),
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Config file (defaults to <config dir>/sinecast/config.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Milliseconds between samples
    #[arg(long = "tick-ms")]
    pub tick_ms: Option<u64>,

    /// Phase advance per sample
    #[arg(long)]
    pub time_step: Option<f64>,

    /// Bound on the angular noise
    #[arg(long)]
    pub noise: Option<f64>,
}

impl ServeArgs {
    /// Defaults, then the config file, then flags. Validation happens at bind.
    pub fn load_config(&self) -> Result<StreamConfig, ConfigError> {
        let config = StreamConfig::discover(self.config.as_deref())?;
        Ok(self.apply(config))
    }

    /// Apply flag overrides on top of a loaded config
    pub fn apply(&self, mut config: StreamConfig) -> StreamConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
        if let Some(time_step) = self.time_step {
            config.time_step = time_step;
        }
        if let Some(noise) = self.noise {
            config.noise_amplitude = noise;
        }
        config
    }
}

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Server URL
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    pub url: String,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}
