//! Server-assigned session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AttemptId;

/// Identity and keepalive contract of one welcomed connection.
///
/// Created from a `session_welcome` message and replaced wholesale by the
/// next one; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Server-assigned session id, used when creating subscriptions.
    pub id: String,
    /// Keepalive interval declared by the server, without the local margin.
    pub keepalive_timeout: Duration,
    /// Socket that received the welcome.
    pub attempt: AttemptId,
    /// Local time the welcome was processed.
    pub established_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session welcomed on `attempt`.
    #[must_use]
    pub fn new(id: String, keepalive_timeout: Duration, attempt: AttemptId) -> Self {
        Self {
            id,
            keepalive_timeout,
            attempt,
            established_at: Utc::now(),
        }
    }
}
