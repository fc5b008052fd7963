//! Per-connection streaming loop
//!
//! A session upgrades one TCP connection to WebSocket and pushes one `x,y,z`
//! text message per tick until the peer goes away or the server shuts down.
//! The only suspension points are the send and the inter-tick wait.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::StreamError;
use crate::phase::PhaseClock;
use crate::signal::SignalGenerator;

/// Upper bound on sending the final Close frame
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a single session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingConnection,
    Streaming,
    Closed,
}

/// Why a session ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed or dropped the connection
    PeerClosed,
    /// Server is shutting down
    Shutdown,
}

/// Count of live sessions
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    count: Arc<AtomicUsize>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Register a session; it is released when the guard drops
    pub fn enter(&self) -> SessionGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            count: Arc::clone(&self.count),
        }
    }
}

/// Decrements [`ActiveSessions`] on drop
#[derive(Debug)]
pub struct SessionGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a session needs, shared by all sessions of one server
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub phase: Arc<PhaseClock>,
    pub generator: SignalGenerator,
    pub tick_interval: Duration,
}

/// One accepted connection
pub struct Session {
    peer: SocketAddr,
    context: SessionContext,
    state: SessionState,
}

impl Session {
    pub fn new(peer: SocketAddr, context: SessionContext) -> Self {
        Self {
            peer,
            context,
            state: SessionState::AwaitingConnection,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Upgrade `stream` and stream samples until disconnect or `cancel` fires
    pub async fn run(
        &mut self,
        stream: TcpStream,
        cancel: CancellationToken,
    ) -> Result<SessionEnd, StreamError> {
        let result = self.stream_samples(stream, &cancel).await;
        self.transition(SessionState::Closed);
        result
    }

    async fn stream_samples(
        &mut self,
        stream: TcpStream,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, StreamError> {
        let ws = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SessionEnd::Shutdown),
            ws = tokio_tungstenite::accept_async(stream) => ws.map_err(|source| {
                StreamError::Handshake { peer: self.peer, source }
            })?,
        };
        self.transition(SessionState::Streaming);

        let (mut ws_tx, mut ws_rx) = ws.split();

        loop {
            let time = self.context.phase.advance();
            let sample = self.context.generator.next_sample(time);
            let message = sample.to_string();
            trace!(peer = %self.peer, time, %message, "sending sample");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.send_close(&mut ws_tx).await;
                    return Ok(SessionEnd::Shutdown);
                }
                sent = ws_tx.send(Message::Text(message.into())) => {
                    if let Err(e) = sent {
                        return self.classify(e);
                    }
                }
            }

            // Inbound frames are only watched for closure; their content is ignored.
            let pause = tokio::time::sleep(self.context.tick_interval);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.send_close(&mut ws_tx).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                    _ = &mut pause => break,
                    incoming = ws_rx.next() => match incoming {
                        None | Some(Ok(Message::Close(_))) => {
                            if timeout(CLOSE_TIMEOUT, ws_tx.close()).await.is_err() {
                                debug!(peer = %self.peer, "close reply timed out");
                            }
                            return Ok(SessionEnd::PeerClosed);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return self.classify(e),
                    },
                }
            }
        }
    }

    /// Best-effort Close frame; a peer that stopped reading cannot stall shutdown
    async fn send_close<S>(&self, ws_tx: &mut S)
    where
        S: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        match timeout(CLOSE_TIMEOUT, ws_tx.send(Message::Close(None))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(peer = %self.peer, error = %e, "close frame not delivered"),
            Err(_) => debug!(peer = %self.peer, "close frame timed out"),
        }
    }

    /// Peer disconnects end the session normally; anything else is a transport error
    fn classify(&self, error: tungstenite::Error) -> Result<SessionEnd, StreamError> {
        if is_disconnect(&error) {
            debug!(peer = %self.peer, error = %error, "peer went away");
            Ok(SessionEnd::PeerClosed)
        } else {
            Err(StreamError::Transport {
                peer: self.peer,
                source: error,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(peer = %self.peer, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

/// Whether a transport error just means the peer is gone
pub fn is_disconnect(error: &tungstenite::Error) -> bool {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(e) => matches!(
            e.kind(),
            ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        assert!(is_disconnect(&tungstenite::Error::ConnectionClosed));
        assert!(is_disconnect(&tungstenite::Error::AlreadyClosed));
        assert!(is_disconnect(&tungstenite::Error::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(is_disconnect(&tungstenite::Error::Io(std::io::Error::from(
            ErrorKind::BrokenPipe
        ))));
        assert!(is_disconnect(&tungstenite::Error::Io(std::io::Error::from(
            ErrorKind::ConnectionReset
        ))));
    }

    #[test]
    fn test_other_errors_are_not_disconnects() {
        assert!(!is_disconnect(&tungstenite::Error::Io(std::io::Error::from(
            ErrorKind::PermissionDenied
        ))));
        assert!(!is_disconnect(&tungstenite::Error::Protocol(
            ProtocolError::SendAfterClosing
        )));
        assert!(!is_disconnect(&tungstenite::Error::Protocol(
            ProtocolError::HandshakeIncomplete
        )));
    }

    #[test]
    fn test_active_sessions_guard() {
        let active = ActiveSessions::new();
        assert_eq!(active.get(), 0);
        let a = active.enter();
        let b = active.clone().enter();
        assert_eq!(active.get(), 2);
        drop(a);
        assert_eq!(active.get(), 1);
        drop(b);
        assert_eq!(active.get(), 0);
    }

    #[test]
    fn test_new_session_awaits_connection() {
        let context = SessionContext {
            phase: Arc::new(PhaseClock::default()),
            generator: SignalGenerator::default(),
            tick_interval: Duration::from_millis(100),
        };
        let session = Session::new("127.0.0.1:1".parse().unwrap(), context);
        assert_eq!(session.state(), SessionState::AwaitingConnection);
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_on_stalled_reader() {
        use tokio::net::TcpSocket;

        let server_socket = TcpSocket::new_v4().unwrap();
        server_socket.set_send_buffer_size(4096).unwrap();
        server_socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = server_socket.listen(16).unwrap();
        let addr = listener.local_addr().unwrap();

        let client_socket = TcpSocket::new_v4().unwrap();
        client_socket.set_recv_buffer_size(2048).unwrap();
        let (client, accepted) = tokio::join!(client_socket.connect(addr), listener.accept());
        let client = client.unwrap();
        let (stream, peer) = accepted.unwrap();

        let context = SessionContext {
            phase: Arc::new(PhaseClock::default()),
            generator: SignalGenerator::default(),
            tick_interval: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut session = Session::new(peer, context);
                let outcome = session.run(stream, cancel).await;
                (outcome, session.state())
            }
        });

        // Complete the handshake, then never read so the server's sends back up
        let (ws, _response) = tokio_tungstenite::client_async(format!("ws://{addr}"), client)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        cancel.cancel();
        let (outcome, state) = timeout(CLOSE_TIMEOUT * 3, task)
            .await
            .expect("session kept running after shutdown")
            .unwrap();
        assert_eq!(outcome.unwrap(), SessionEnd::Shutdown);
        assert_eq!(state, SessionState::Closed);
        drop(ws);
    }
}
