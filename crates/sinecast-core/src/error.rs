//! Error types for the streaming server

use std::net::SocketAddr;
use std::num::ParseFloatError;
use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures surfaced by the server and its sessions
#[derive(Debug, Error)]
pub enum StreamError {
    /// Listener could not be bound (address in use, permission denied)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Peer never completed the WebSocket upgrade
    #[error("WebSocket handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    /// Transport failure that is not a plain peer disconnect
    #[error("transport error with {peer}: {source}")]
    Transport {
        peer: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure to parse an `x,y,z` message
#[derive(Debug, Error, PartialEq)]
pub enum ParseCoordinateError {
    #[error("expected 3 comma-separated values, found {0}")]
    Arity(usize),

    #[error("invalid coordinate value {value:?}: {source}")]
    Number {
        value: String,
        #[source]
        source: ParseFloatError,
    },
}
