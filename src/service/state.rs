//! Observable controller state.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{AttemptId, Session};

/// Lifecycle state of the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No current connection.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Socket open, waiting for `session_welcome`.
    AwaitingWelcome,
    /// Welcomed and receiving frames.
    Active,
    /// Handoff in progress: the replacement connection is not welcomed
    /// yet while the old one may still deliver frames.
    ReconnectPending,
    /// Closure requested, waiting for the socket to close.
    Closing,
}

impl ConnectionState {
    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingWelcome => "awaiting_welcome",
            Self::Active => "active",
            Self::ReconnectPending => "reconnect_pending",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the controller, published after every step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Socket currently eligible for connect/close commands.
    pub current_attempt: Option<AttemptId>,
    /// Superseded sockets that have not closed yet.
    pub draining_attempts: Vec<AttemptId>,
    /// Session of the current connection, once welcomed.
    pub session: Option<Session>,
    /// Reconnects scheduled since the last successful open.
    pub backoff_attempts: u32,
    /// Interval the keepalive watchdog counts down from.
    pub silence_interval: Duration,
    /// Whether the keepalive watchdog is running.
    pub watchdog_armed: bool,
    /// Whether a backoff reconnect is pending.
    pub reconnect_scheduled: bool,
}
