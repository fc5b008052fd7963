//! Shutdown support for the server
//!
//! Lets an external signal stop the accept loop and every live session.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for server shutdown
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Stop the server and all sessions
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Token to hand to [`crate::SampleServer::run`]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
