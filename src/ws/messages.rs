//! EventSub wire messages: envelope, metadata, and typed payloads.
//!
//! Every inbound frame is a JSON object of the form
//! `{ "metadata": { .. }, "payload": { .. } }`. The payload shape depends on
//! `metadata.message_type`; [`InboundMessage::parse`] selects the typed
//! variant and validates it in one step.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Envelope metadata shared by every message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Server-generated unique message id.
    pub message_id: String,
    /// Wire name of the message type (e.g. `"notification"`).
    pub message_type: String,
    /// Server timestamp of the message.
    pub message_timestamp: DateTime<Utc>,
    /// Subscription type, present on notifications and revocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
    /// Subscription version, present on notifications and revocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_version: Option<String>,
}

/// Discriminator for the message types the server sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// First message on a new connection; carries the session id.
    SessionWelcome,
    /// Sent when no event arrived within the keepalive interval.
    SessionKeepalive,
    /// An event for one of the session's subscriptions.
    Notification,
    /// Request to move to a new connection.
    SessionReconnect,
    /// A subscription was revoked by the server.
    Revocation,
}

impl MessageType {
    /// Maps a wire name to a known message type.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "session_welcome" => Some(Self::SessionWelcome),
            "session_keepalive" => Some(Self::SessionKeepalive),
            "notification" => Some(Self::Notification),
            "session_reconnect" => Some(Self::SessionReconnect),
            "revocation" => Some(Self::Revocation),
            _ => None,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionWelcome => "session_welcome",
            Self::SessionKeepalive => "session_keepalive",
            Self::Notification => "notification",
            Self::SessionReconnect => "session_reconnect",
            Self::Revocation => "revocation",
        }
    }
}

/// Metadata plus untouched payload, as handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Envelope metadata.
    pub metadata: Metadata,
    /// Type-specific payload, passed through as received.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// `payload.session` of a `session_welcome` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WelcomeSession {
    /// Session id to use when creating subscriptions.
    pub id: String,
    /// Session status (normally `"connected"`).
    #[serde(default)]
    pub status: Option<String>,
    /// Maximum server silence before the client must assume the connection
    /// is dead. `None` keeps the previously negotiated interval.
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    /// Time the server accepted the connection.
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
}

/// `payload.session` of a `session_reconnect` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectSession {
    /// Id of the session being migrated.
    #[serde(default)]
    pub id: Option<String>,
    /// URL of the connection that replaces this one.
    pub reconnect_url: String,
}

/// `payload.subscription` of notifications and revocations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionInfo {
    /// Subscription id.
    #[serde(default)]
    pub id: Option<String>,
    /// Subscription type, e.g. `"channel.update"`.
    #[serde(rename = "type")]
    pub subscription_type: String,
    /// Subscription version.
    #[serde(default)]
    pub version: Option<String>,
    /// Subscription status; carries the revocation reason.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload<T> {
    session: T,
}

#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    subscription: SubscriptionInfo,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `session_welcome`.
    Welcome {
        /// Envelope metadata.
        metadata: Metadata,
        /// Session assigned by the server.
        session: WelcomeSession,
    },
    /// `session_keepalive`.
    Keepalive {
        /// Envelope metadata.
        metadata: Metadata,
    },
    /// `notification`.
    Notification {
        /// Subscription the event belongs to.
        subscription: SubscriptionInfo,
        /// Metadata and full payload.
        message: EventMessage,
    },
    /// `session_reconnect`.
    Reconnect {
        /// Envelope metadata.
        metadata: Metadata,
        /// Where to reconnect.
        session: ReconnectSession,
    },
    /// `revocation`.
    Revocation {
        /// Subscription that was revoked.
        subscription: SubscriptionInfo,
        /// Metadata and full payload.
        message: EventMessage,
    },
    /// A well-formed envelope with a `message_type` this client does not know.
    Unrecognized(EventMessage),
}

impl InboundMessage {
    /// Decodes a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the frame is not a JSON
    /// envelope, or [`ProtocolError::InvalidPayload`] if the payload does not
    /// match the shape required by its message type.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let envelope: EventMessage = serde_json::from_str(raw).map_err(ProtocolError::Malformed)?;
        let Some(kind) = MessageType::from_wire(&envelope.metadata.message_type) else {
            return Ok(Self::Unrecognized(envelope));
        };

        let message = match kind {
            MessageType::SessionWelcome => {
                let SessionPayload { session } = decode(kind, &envelope.payload)?;
                Self::Welcome {
                    metadata: envelope.metadata,
                    session,
                }
            }
            MessageType::SessionKeepalive => Self::Keepalive {
                metadata: envelope.metadata,
            },
            MessageType::Notification => {
                let SubscriptionPayload { subscription } = decode(kind, &envelope.payload)?;
                Self::Notification {
                    subscription,
                    message: envelope,
                }
            }
            MessageType::SessionReconnect => {
                let SessionPayload { session } = decode(kind, &envelope.payload)?;
                Self::Reconnect {
                    metadata: envelope.metadata,
                    session,
                }
            }
            MessageType::Revocation => {
                let SubscriptionPayload { subscription } = decode(kind, &envelope.payload)?;
                Self::Revocation {
                    subscription,
                    message: envelope,
                }
            }
        };
        Ok(message)
    }
}

fn decode<T: DeserializeOwned>(kind: MessageType, payload: &serde_json::Value) -> Result<T, ProtocolError> {
    T::deserialize(payload).map_err(|source| ProtocolError::InvalidPayload {
        message_type: kind.as_str(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const TS: &str = "2023-07-19T14:56:51.634234626Z";

    fn frame(message_type: &str, payload: serde_json::Value) -> String {
        serde_json::json!({
            "metadata": {
                "message_id": "96a3f3b5-5dec-4eed-908e-e11ee657416c",
                "message_type": message_type,
                "message_timestamp": TS,
            },
            "payload": payload,
        })
        .to_string()
    }

    #[test]
    fn parses_welcome() {
        let raw = frame(
            "session_welcome",
            serde_json::json!({
                "session": {
                    "id": "AQoQILE98gtqShGmLD7AM6yJThAB",
                    "status": "connected",
                    "connected_at": TS,
                    "keepalive_timeout_seconds": 10,
                    "reconnect_url": null
                }
            }),
        );
        let Ok(InboundMessage::Welcome { session, metadata }) = InboundMessage::parse(&raw) else {
            panic!("expected welcome");
        };
        assert_eq!(session.id, "AQoQILE98gtqShGmLD7AM6yJThAB");
        assert_eq!(session.keepalive_timeout_seconds, Some(10));
        assert_eq!(metadata.message_type, "session_welcome");
    }

    #[test]
    fn welcome_with_null_keepalive_is_accepted() {
        let raw = frame(
            "session_welcome",
            serde_json::json!({ "session": { "id": "abc", "keepalive_timeout_seconds": null } }),
        );
        let Ok(InboundMessage::Welcome { session, .. }) = InboundMessage::parse(&raw) else {
            panic!("expected welcome");
        };
        assert_eq!(session.keepalive_timeout_seconds, None);
    }

    #[test]
    fn parses_notification_and_keeps_payload() {
        let payload = serde_json::json!({
            "subscription": { "id": "f1c2", "type": "channel.update", "version": "2", "status": "enabled" },
            "event": { "broadcaster_user_id": "1337", "title": "Best Stream Ever" }
        });
        let raw = frame("notification", payload.clone());
        let Ok(InboundMessage::Notification { subscription, message }) = InboundMessage::parse(&raw) else {
            panic!("expected notification");
        };
        assert_eq!(subscription.subscription_type, "channel.update");
        assert_eq!(message.payload, payload);
    }

    #[test]
    fn parses_reconnect_url() {
        let raw = frame(
            "session_reconnect",
            serde_json::json!({
                "session": { "id": "abc", "reconnect_url": "wss://eventsub.wss.twitch.tv?token=xyz" }
            }),
        );
        let Ok(InboundMessage::Reconnect { session, .. }) = InboundMessage::parse(&raw) else {
            panic!("expected reconnect");
        };
        assert_eq!(session.reconnect_url, "wss://eventsub.wss.twitch.tv?token=xyz");
    }

    #[test]
    fn keepalive_accepts_empty_payload() {
        let raw = frame("session_keepalive", serde_json::json!({}));
        assert!(matches!(InboundMessage::parse(&raw), Ok(InboundMessage::Keepalive { .. })));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let raw = frame("session_hibernate", serde_json::json!({}));
        let Ok(InboundMessage::Unrecognized(message)) = InboundMessage::parse(&raw) else {
            panic!("expected unrecognized");
        };
        assert_eq!(message.metadata.message_type, "session_hibernate");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(InboundMessage::parse("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(InboundMessage::parse("{\"payload\":{}}"), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn notification_without_subscription_is_invalid() {
        let raw = frame("notification", serde_json::json!({ "event": {} }));
        let Err(ProtocolError::InvalidPayload { message_type, .. }) = InboundMessage::parse(&raw) else {
            panic!("expected invalid payload");
        };
        assert_eq!(message_type, "notification");
    }

    #[test]
    fn reconnect_without_url_is_invalid() {
        let raw = frame("session_reconnect", serde_json::json!({ "session": { "id": "abc" } }));
        assert!(matches!(
            InboundMessage::parse(&raw),
            Err(ProtocolError::InvalidPayload { message_type: "session_reconnect", .. })
        ));
    }

    #[test]
    fn message_type_round_trips_wire_names() {
        for name in ["session_welcome", "session_keepalive", "notification", "session_reconnect", "revocation"] {
            let Some(kind) = MessageType::from_wire(name) else {
                panic!("known type {name}");
            };
            assert_eq!(kind.as_str(), name);
        }
    }
}
