//! sinecast core library
//!
//! Generates a noisy three-axis sine signal and streams it as `x,y,z` text
//! messages to WebSocket clients at a fixed tick interval.

pub mod config;
pub mod error;
pub mod phase;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod signal;

pub use config::StreamConfig;
pub use error::{ConfigError, ParseCoordinateError, StreamError};
pub use phase::PhaseClock;
pub use server::SampleServer;
pub use session::{ActiveSessions, SessionEnd, SessionState};
pub use shutdown::ShutdownHandle;
pub use signal::{Coordinate, SignalGenerator};
