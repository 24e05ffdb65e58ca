//! Public events emitted by the session controller.
//!
//! Every observable outcome of the session manager is a [`SessionEvent`]
//! published through the [`super::EventBus`]. Consumers subscribe to the
//! bus (optionally through an [`super::EventFilter`]) and forward
//! notifications to their own subscription-management logic.

use std::time::Duration;

use serde::Serialize;

use super::{AttemptId, CloseCode};
use crate::ws::messages::EventMessage;

/// A connection close, as observed by the socket that closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseEvent {
    /// Socket that closed.
    pub attempt: AttemptId,
    /// Close code reported by the peer (1005 if its frame carried none,
    /// 1006 if the connection ended without a close frame).
    pub code: u16,
    /// Close reason text from the peer's frame, if any.
    pub reason: String,
}

impl CloseEvent {
    /// Returns the typed close code.
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        CloseCode::from(self.code)
    }
}

/// Event emitted to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A first-time session was welcomed; create subscriptions now.
    Connected {
        /// Server-assigned session id.
        session_id: String,
    },
    /// A handoff completed; subscriptions carried over to the new session.
    Reconnected {
        /// Server-assigned session id of the new connection.
        session_id: String,
    },
    /// Keepalive received.
    SessionKeepalive,
    /// Any notification, regardless of subscription type.
    Notification(EventMessage),
    /// The same notification, addressed by its subscription type.
    Subscription {
        /// Subscription type, e.g. `"channel.update"`.
        subscription_type: String,
        /// Metadata and payload, identical to the generic notification.
        message: EventMessage,
    },
    /// The server asked the client to move to a new connection.
    SessionReconnect {
        /// URL of the replacement connection.
        url: String,
    },
    /// A subscription was revoked.
    Revocation(EventMessage),
    /// No frame arrived within the keepalive interval.
    SessionSilenced,
    /// A socket closed.
    Close(CloseEvent),
    /// A frame could not be decoded; the connection keeps running.
    ProtocolError {
        /// Socket that delivered the frame.
        attempt: AttemptId,
        /// The frame as received.
        raw: String,
        /// Decode error description.
        error: String,
    },
    /// A reconnect was scheduled after a close.
    ReconnectScheduled {
        /// Reconnect attempts since the last successful open.
        attempts: u32,
        /// Delay before the reconnect is made.
        delay: Duration,
    },
}

impl SessionEvent {
    /// Returns the event name consumers subscribe to.
    ///
    /// For [`SessionEvent::Subscription`] this is the subscription type
    /// itself, so a consumer can listen for `"channel.update"` directly.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Reconnected { .. } => "reconnected",
            Self::SessionKeepalive => "session_keepalive",
            Self::Notification(_) => "notification",
            Self::Subscription {
                subscription_type, ..
            } => subscription_type,
            Self::SessionReconnect { .. } => "session_reconnect",
            Self::Revocation(_) => "revocation",
            Self::SessionSilenced => "session_silenced",
            Self::Close(_) => "close",
            Self::ProtocolError { .. } => "protocol_error",
            Self::ReconnectScheduled { .. } => "reconnect_scheduled",
        }
    }
}
