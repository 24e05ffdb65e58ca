//! Per-socket task.
//!
//! Every connection attempt runs in its own task which owns the physical
//! socket. The task reports what happens on the wire as [`SocketEvent`]s
//! tagged with the attempt id, and performs the closing handshake when the
//! controller asks for it through the [`SocketHandle`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};

use super::connector::{BoxSocket, Connector, HeaderProvider, build_request};
use crate::domain::AttemptId;
use crate::service::timer::deadline_after;

/// Close code reported when the peer's close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the connection ended without a close frame,
/// including connections that never opened.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// What happened on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    /// The handshake completed.
    Open,
    /// A text frame arrived.
    Message(String),
    /// Transport-level failure. A `Closed` event always follows.
    Error(String),
    /// The socket is gone. Always the last event of an attempt.
    Closed {
        /// Close code (see [`CLOSE_NO_STATUS`] and [`CLOSE_ABNORMAL`]).
        code: u16,
        /// Close reason from the peer's frame.
        reason: String,
    },
}

/// A [`SocketEventKind`] tagged with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    /// Originating socket.
    pub attempt: AttemptId,
    /// Event payload.
    pub kind: SocketEventKind,
}

/// Channel the socket tasks report into.
pub type SocketEventSender = mpsc::UnboundedSender<SocketEvent>;

/// Settings shared by every socket a controller spawns.
#[derive(Clone)]
pub struct SocketOptions {
    /// Opens the physical connection.
    pub connector: Arc<dyn Connector>,
    /// Supplies handshake headers.
    pub headers: Option<HeaderProvider>,
    /// Upper bound on the closing handshake.
    pub close_timeout: Duration,
}

impl std::fmt::Debug for SocketOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketOptions")
            .field("connector", &self.connector)
            .field("headers", &self.headers.as_ref().map(|_| "<provider>"))
            .field("close_timeout", &self.close_timeout)
            .finish()
    }
}

/// Controller-side handle to a running socket task.
#[derive(Debug)]
pub struct SocketHandle {
    attempt: AttemptId,
    close_tx: Option<oneshot::Sender<()>>,
}

impl SocketHandle {
    /// Spawns the task for `attempt` connecting to `url`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(attempt: AttemptId, url: String, options: &SocketOptions, events: SocketEventSender) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        let socket_task = SocketTask {
            attempt,
            events,
            close_timeout: options.close_timeout,
        };
        let connector = Arc::clone(&options.connector);
        let headers = options.headers.clone();
        tokio::spawn(async move {
            socket_task
                .run(&url, headers.as_ref(), connector.as_ref(), close_rx)
                .await;
        });
        Self {
            attempt,
            close_tx: Some(close_tx),
        }
    }

    /// Returns the attempt this socket belongs to.
    #[must_use]
    pub const fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Requests closure. Returns `false` if closure was already requested.
    ///
    /// If the handshake has not completed yet the socket is closed as soon
    /// as it does.
    pub fn close(&mut self) -> bool {
        match self.close_tx.take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

struct SocketTask {
    attempt: AttemptId,
    events: SocketEventSender,
    close_timeout: Duration,
}

impl SocketTask {
    fn emit(&self, kind: SocketEventKind) {
        let _ = self.events.send(SocketEvent {
            attempt: self.attempt,
            kind,
        });
    }

    fn fail(&self, error: String) {
        self.emit(SocketEventKind::Error(error));
        self.emit(SocketEventKind::Closed {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        });
    }

    async fn run(
        self,
        url: &str,
        headers: Option<&HeaderProvider>,
        connector: &dyn Connector,
        mut close_rx: oneshot::Receiver<()>,
    ) {
        tracing::debug!(attempt = %self.attempt, url, "connecting");

        let request = match build_request(url, headers) {
            Ok(request) => request,
            Err(err) => return self.fail(err.to_string()),
        };
        let socket = match connector.connect(request).await {
            Ok(socket) => socket,
            Err(err) => return self.fail(err.to_string()),
        };

        // A dropped handle counts as a close request.
        let mut close_requested = !matches!(close_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty));

        let (mut sink, mut stream) = socket.split();
        let mut deadline = None;
        let mut received: Option<(u16, String)> = None;

        if close_requested {
            tracing::debug!(attempt = %self.attempt, "close requested while connecting");
            deadline = Some(self.begin_close(&mut sink).await);
        } else {
            self.emit(SocketEventKind::Open);
        }

        loop {
            tokio::select! {
                _ = &mut close_rx, if !close_requested => {
                    close_requested = true;
                    if received.is_none() {
                        deadline = Some(self.begin_close(&mut sink).await);
                    }
                }
                () = sleep_until(deadline) => {
                    tracing::debug!(attempt = %self.attempt, "close handshake timed out");
                    break;
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.emit(SocketEventKind::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        received = Some(frame.map_or_else(
                            || (CLOSE_NO_STATUS, String::new()),
                            |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                        ));
                        deadline.get_or_insert_with(|| deadline_after(self.close_timeout));
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::trace!(attempt = %self.attempt, "ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) | None => {
                        break;
                    }
                    Some(Err(err)) => {
                        self.emit(SocketEventKind::Error(err.to_string()));
                        break;
                    }
                }
            }
        }

        let (code, reason) = received.unwrap_or((CLOSE_ABNORMAL, String::new()));
        self.emit(SocketEventKind::Closed { code, reason });
    }

    async fn begin_close(&self, sink: &mut SplitSink<BoxSocket, Message>) -> Instant {
        if let Err(err) = sink.send(Message::Close(None)).await {
            tracing::debug!(attempt = %self.attempt, error = %err, "failed to send close frame");
        }
        deadline_after(self.close_timeout)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
