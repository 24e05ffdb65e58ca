//! Shared fixtures for controller integration tests.
//!
//! [`FakeConnector`] hands the controller one end of an in-memory duplex
//! stream wrapped as a client WebSocket and gives the test the server end,
//! so frames, closes, and timing can be scripted under tokio's paused clock.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{self, Message};

use eventsub_session::config::SessionConfig;
use eventsub_session::domain::SessionEvent;
use eventsub_session::error::SessionError;
use eventsub_session::service::SessionController;
use eventsub_session::ws::connector::{BoxSocket, Connector};

/// Endpoint the test controller dials by default.
pub const TEST_URL: &str = "ws://eventsub.test/ws";

/// Upper bound on waiting for anything in a test.
const WAIT: Duration = Duration::from_secs(300);

/// A connection attempt observed by the fake connector.
#[derive(Debug)]
pub struct Dial {
    /// Request URI.
    pub uri: String,
    /// Handshake headers as `(lowercase name, value)`.
    pub headers: Vec<(String, String)>,
    /// Server end of the connection; `None` if the dial was refused.
    pub server: Option<ServerSocket>,
}

impl Dial {
    /// Returns the server end, panicking if the dial was refused.
    pub fn accept(self) -> ServerSocket {
        let Some(server) = self.server else {
            panic!("dial to {} was refused", self.uri);
        };
        server
    }

    /// Returns the value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Connector backed by in-memory duplex streams.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    dials: mpsc::UnboundedSender<Dial>,
    refusing: Arc<AtomicBool>,
}

impl FakeConnector {
    /// Creates the connector and the channel its dials are reported on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Dial>) {
        let (dials, rx) = mpsc::unbounded_channel();
        let connector = Self {
            dials,
            refusing: Arc::new(AtomicBool::new(false)),
        };
        (connector, rx)
    }

    /// Makes subsequent dials fail (`true`) or succeed (`false`).
    pub fn refuse(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

impl Connector for FakeConnector {
    fn connect(&self, request: Request) -> BoxFuture<'static, Result<BoxSocket, SessionError>> {
        let uri = request.uri().to_string();
        let headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let refusing = self.refusing.load(Ordering::SeqCst);
        let dials = self.dials.clone();

        Box::pin(async move {
            if refusing {
                let _ = dials.send(Dial {
                    uri,
                    headers,
                    server: None,
                });
                let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
                return Err(SessionError::from(tungstenite::Error::Io(refused)));
            }

            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
            let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            let _ = dials.send(Dial {
                uri,
                headers,
                server: Some(ServerSocket(server)),
            });
            Ok(Box::pin(client) as BoxSocket)
        })
    }
}

/// Server end of a fake connection.
#[derive(Debug)]
pub struct ServerSocket(WebSocketStream<DuplexStream>);

impl ServerSocket {
    /// Sends a text frame.
    pub async fn send(&mut self, text: String) {
        if let Err(err) = self.0.send(Message::text(text)).await {
            panic!("server send failed: {err}");
        }
    }

    /// Closes with `code` and drains until the connection ends. Returns
    /// the close frame received from the client, if any.
    pub async fn close(mut self, code: u16) -> Option<Option<CloseFrame>> {
        let frame = CloseFrame {
            code: code.into(),
            reason: "".into(),
        };
        if let Err(err) = self.0.close(Some(frame)).await {
            panic!("server close failed: {err}");
        }
        self.drain().await
    }

    /// Reads until the client's close frame arrives and the connection
    /// ends. Returns the client's frame.
    pub async fn expect_close(mut self) -> Option<Option<CloseFrame>> {
        self.drain().await
    }

    async fn drain(&mut self) -> Option<Option<CloseFrame>> {
        let mut received = None;
        while let Some(Ok(message)) = self.0.next().await {
            if let Message::Close(frame) = message {
                received = Some(frame);
            }
        }
        received
    }
}

/// A controller wired to a [`FakeConnector`].
#[derive(Debug)]
pub struct Harness {
    /// Controller under test.
    pub controller: SessionController,
    /// Receives every event.
    pub events: broadcast::Receiver<SessionEvent>,
    /// Reports every dial.
    pub dials: mpsc::UnboundedReceiver<Dial>,
    /// Controls refusal of dials.
    pub connector: FakeConnector,
}

impl Harness {
    /// Starts a controller with [`config`] overrides applied by `customize`.
    pub fn start(customize: impl FnOnce(SessionConfig) -> SessionConfig) -> Self {
        let (connector, dials) = FakeConnector::new();
        let controller = SessionController::builder(customize(config()))
            .connector(Arc::new(connector.clone()))
            .build();
        let events = controller.subscribe();
        Self {
            controller,
            events,
            dials,
            connector,
        }
    }

    /// Waits for the next dial.
    pub async fn next_dial(&mut self) -> Dial {
        match tokio::time::timeout(WAIT, self.dials.recv()).await {
            Ok(Some(dial)) => dial,
            Ok(None) => panic!("connector dropped"),
            Err(_) => panic!("no dial within {WAIT:?}"),
        }
    }

    /// Connects and returns the accepted server end.
    pub async fn open(&mut self) -> ServerSocket {
        self.controller.connect(None, false);
        self.next_dial().await.accept()
    }

    /// Connects and completes the welcome for `session_id`.
    pub async fn establish(&mut self, session_id: &str, keepalive: u64) -> ServerSocket {
        let mut server = self.open().await;
        server.send(welcome(session_id, Some(keepalive))).await;
        assert_eq!(
            self.next_event().await,
            SessionEvent::Connected {
                session_id: session_id.to_string()
            }
        );
        server
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> SessionEvent {
        match tokio::time::timeout(WAIT, self.events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => panic!("event stream failed: {err}"),
            Err(_) => panic!("no event within {WAIT:?}"),
        }
    }

    /// Asserts that no event is pending.
    pub fn assert_no_event(&mut self) {
        if let Ok(event) = self.events.try_recv() {
            panic!("unexpected event {event:?}");
        }
    }

    /// Asserts that no dial is pending.
    pub fn assert_no_dial(&mut self) {
        if let Ok(dial) = self.dials.try_recv() {
            panic!("unexpected dial to {}", dial.uri);
        }
    }
}

/// Default test configuration.
pub fn config() -> SessionConfig {
    SessionConfig {
        url: TEST_URL.to_string(),
        ..SessionConfig::default()
    }
}

/// Lets every runnable task make progress.
///
/// Under a paused clock the sleep only completes once the runtime is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn frame(message_type: &str, extra: serde_json::Value, payload: serde_json::Value) -> String {
    let mut metadata = serde_json::json!({
        "message_id": format!("{message_type}-id"),
        "message_type": message_type,
        "message_timestamp": "2023-07-19T14:56:51.634234626Z",
    });
    if let (Some(metadata), Some(extra)) = (metadata.as_object_mut(), extra.as_object()) {
        metadata.extend(extra.clone());
    }
    serde_json::json!({ "metadata": metadata, "payload": payload }).to_string()
}

/// `session_welcome` frame.
pub fn welcome(session_id: &str, keepalive: Option<u64>) -> String {
    frame(
        "session_welcome",
        serde_json::json!({}),
        serde_json::json!({
            "session": {
                "id": session_id,
                "status": "connected",
                "keepalive_timeout_seconds": keepalive,
                "reconnect_url": null,
                "connected_at": "2023-07-19T14:56:51.616329898Z",
            }
        }),
    )
}

/// `session_keepalive` frame.
pub fn keepalive() -> String {
    frame("session_keepalive", serde_json::json!({}), serde_json::json!({}))
}

/// `notification` frame for `subscription_type`.
pub fn notification(subscription_type: &str, event: serde_json::Value) -> String {
    frame(
        "notification",
        serde_json::json!({
            "subscription_type": subscription_type,
            "subscription_version": "1",
        }),
        serde_json::json!({
            "subscription": {
                "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
                "type": subscription_type,
                "version": "1",
                "status": "enabled",
            },
            "event": event,
        }),
    )
}

/// `session_reconnect` frame pointing at `url`.
pub fn reconnect(session_id: &str, url: &str) -> String {
    frame(
        "session_reconnect",
        serde_json::json!({}),
        serde_json::json!({
            "session": {
                "id": session_id,
                "status": "reconnecting",
                "keepalive_timeout_seconds": null,
                "reconnect_url": url,
            }
        }),
    )
}

/// `revocation` frame for `subscription_type`.
pub fn revocation(subscription_type: &str) -> String {
    frame(
        "revocation",
        serde_json::json!({
            "subscription_type": subscription_type,
            "subscription_version": "1",
        }),
        serde_json::json!({
            "subscription": {
                "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
                "type": subscription_type,
                "version": "1",
                "status": "authorization_revoked",
            }
        }),
    )
}
