//! Connection attempt identifier.
//!
//! [`AttemptId`] numbers every physical socket the controller creates. It is
//! used to tell the current connection apart from one that has been
//! superseded during a reconnect handoff.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically increasing identifier of a physical socket.
///
/// Allocated when a connect is initiated and never reused for the lifetime
/// of a controller. Every [`crate::ws::connection::SocketEvent`] carries the
/// id of the socket that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(u64);

impl AttemptId {
    /// The first id handed out by a controller.
    #[must_use]
    pub const fn first() -> Self {
        Self(1)
    }

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::first()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AttemptId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
