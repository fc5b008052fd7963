//! Accept loop supervisor
//!
//! Binds the listener, spawns one session task per accepted connection and
//! keeps accepting until the shutdown token fires. Sessions share nothing but
//! the phase clock.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::phase::PhaseClock;
use crate::session::{ActiveSessions, Session, SessionContext, SessionEnd};
use crate::signal::SignalGenerator;

/// WebSocket server streaming samples to every connected peer
pub struct SampleServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: SessionContext,
    active: ActiveSessions,
}

impl SampleServer {
    /// Bind with a fresh phase clock
    pub async fn bind(config: &StreamConfig) -> Result<Self, StreamError> {
        let phase = Arc::new(PhaseClock::new(config.time_step));
        Self::bind_with_phase(config, phase).await
    }

    /// Bind sharing an existing phase clock
    pub async fn bind_with_phase(
        config: &StreamConfig,
        phase: Arc<PhaseClock>,
    ) -> Result<Self, StreamError> {
        config.validate()?;

        let addr = config.bind_address();
        let bind_err = |source: std::io::Error| StreamError::Bind {
            addr: addr.clone(),
            source,
        };
        let resolved = config.resolve().await.map_err(bind_err)?;
        let listener = TcpListener::bind(resolved).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        Ok(Self {
            listener,
            local_addr,
            context: SessionContext {
                phase,
                generator: SignalGenerator::new(config.noise_amplitude),
                tick_interval: config.tick_interval(),
            },
            active: ActiveSessions::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL clients connect to
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn phase(&self) -> Arc<PhaseClock> {
        Arc::clone(&self.context.phase)
    }

    pub fn active_sessions(&self) -> ActiveSessions {
        self.active.clone()
    }

    /// Accept connections until `shutdown` fires, then cancel and drain all sessions
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), StreamError> {
        let Self {
            listener,
            local_addr,
            context,
            active,
        } = self;

        info!("Server started on ws://{}", local_addr);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        spawn_session(
                            &mut sessions,
                            stream,
                            peer,
                            context.clone(),
                            active.clone(),
                            shutdown.child_token(),
                        );
                    }
                    Err(e) => {
                        // e.g. peer reset before accept, or fd exhaustion
                        warn!(error = %StreamError::Accept(e), "accept failed");
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "session task failed");
                    }
                }
            }
        }

        drop(listener);
        info!(
            sessions = sessions.len(),
            "Shutting down, waiting for sessions to close"
        );
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "session task failed");
            }
        }
        info!("Server stopped");

        Ok(())
    }
}

fn spawn_session(
    sessions: &mut JoinSet<()>,
    stream: TcpStream,
    peer: SocketAddr,
    context: SessionContext,
    active: ActiveSessions,
    cancel: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
    }

    sessions.spawn(async move {
        let _guard = active.enter();
        info!(peer = %peer, "Client connected");

        let mut session = Session::new(peer, context);
        let outcome = session.run(stream, cancel).await;
        let state = session.state();
        match outcome {
            Ok(SessionEnd::PeerClosed) => info!(peer = %peer, ?state, "Client disconnected"),
            Ok(SessionEnd::Shutdown) => {
                info!(peer = %peer, ?state, "Client session closed by shutdown")
            }
            Err(e) => warn!(peer = %peer, ?state, error = %e, "Client session ended with error"),
        }
    });
}
