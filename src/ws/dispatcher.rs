//! Inbound frame routing.
//!
//! The [`Dispatcher`] decodes each text frame, publishes the consumer-facing
//! events it implies, and tells the controller what the frame means for the
//! session through a [`Directive`].

use super::messages::{InboundMessage, WelcomeSession};
use crate::domain::{AttemptId, EventBus, SessionEvent};

/// Chat messages arrive at a rate that would drown the debug log.
const NOISY_SUBSCRIPTION: &str = "channel.chat.message";

/// Session-level consequence of a dispatched frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A new session was assigned.
    Welcome(WelcomeSession),
    /// The connection proved alive; rearm the keepalive watchdog.
    Rearm,
    /// Move to a new connection at the given URL.
    Handoff(String),
    /// Nothing for the controller to do.
    Ignore,
}

/// Decodes frames and publishes the events they carry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    bus: EventBus,
}

impl Dispatcher {
    /// Creates a dispatcher publishing to `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Decodes and routes a raw text frame received on `attempt`.
    ///
    /// Frames that cannot be decoded are published as
    /// [`SessionEvent::ProtocolError`] and otherwise ignored.
    pub fn dispatch(&self, attempt: AttemptId, raw: &str) -> Directive {
        match InboundMessage::parse(raw) {
            Ok(message) => self.route(attempt, message),
            Err(err) => {
                tracing::warn!(%attempt, error = %err, "dropping undecodable frame");
                self.bus.publish(SessionEvent::ProtocolError {
                    attempt,
                    raw: raw.to_owned(),
                    error: err.to_string(),
                });
                Directive::Ignore
            }
        }
    }

    /// Routes an already decoded message.
    pub fn route(&self, attempt: AttemptId, message: InboundMessage) -> Directive {
        match message {
            InboundMessage::Welcome { session, .. } => {
                tracing::debug!(
                    %attempt,
                    session_id = %session.id,
                    keepalive = ?session.keepalive_timeout_seconds,
                    "session welcome"
                );
                Directive::Welcome(session)
            }
            InboundMessage::Keepalive { .. } => {
                tracing::trace!(%attempt, "keepalive");
                self.bus.publish(SessionEvent::SessionKeepalive);
                Directive::Rearm
            }
            InboundMessage::Notification {
                subscription,
                message,
            } => {
                let subscription_type = subscription.subscription_type;
                if subscription_type == NOISY_SUBSCRIPTION {
                    tracing::trace!(%attempt, %subscription_type, "notification");
                } else {
                    tracing::debug!(%attempt, %subscription_type, "notification");
                }
                self.bus.publish(SessionEvent::Notification(message.clone()));
                self.bus.publish(SessionEvent::Subscription {
                    subscription_type,
                    message,
                });
                Directive::Rearm
            }
            InboundMessage::Reconnect { session, .. } => {
                tracing::debug!(%attempt, url = %session.reconnect_url, "reconnect requested");
                self.bus.publish(SessionEvent::SessionReconnect {
                    url: session.reconnect_url.clone(),
                });
                Directive::Handoff(session.reconnect_url)
            }
            InboundMessage::Revocation {
                subscription,
                message,
            } => {
                tracing::info!(
                    %attempt,
                    subscription_type = %subscription.subscription_type,
                    status = ?subscription.status,
                    "subscription revoked"
                );
                self.bus.publish(SessionEvent::Revocation(message));
                Directive::Ignore
            }
            InboundMessage::Unrecognized(message) => {
                tracing::debug!(
                    %attempt,
                    message_type = %message.metadata.message_type,
                    "unexpected message type"
                );
                Directive::Ignore
            }
        }
    }
}
