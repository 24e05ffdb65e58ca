//! Session error types.
//!
//! [`SessionError`] covers everything that can go wrong while building a
//! connection or loading configuration. [`ProtocolError`] describes frames
//! the server sent that could not be understood; the dispatcher turns those
//! into `protocol_error` events instead of propagating them.

use tokio_tungstenite::tungstenite;

/// Central error type for the session manager.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// WebSocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// A header returned by the header provider could not be attached to
    /// the handshake request.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as supplied by the provider.
        name: String,
        /// Why the header was rejected.
        reason: String,
    },

    /// Configuration value rejected at load time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inbound frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<tungstenite::Error> for SessionError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Decoding failure for an inbound text frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or lacks the `metadata` envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope is valid but the payload does not match the shape
    /// required by its `message_type`.
    #[error("invalid {message_type} payload: {source}")]
    InvalidPayload {
        /// Wire name of the message type being decoded.
        message_type: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}
