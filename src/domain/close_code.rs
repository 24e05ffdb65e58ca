//! Close-code retry policy.
//!
//! The server reports why it closed a connection with a numeric code in the
//! 4000 range. [`CloseCode::policy`] maps each code to what the controller
//! should do next. The mapping is an exhaustive `match`, so adding a code
//! forces a policy decision.

use std::fmt;

/// Close code received with a WebSocket close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 4000: internal server error.
    InternalServerError,
    /// 4001: the client sent inbound traffic.
    ClientSentInboundTraffic,
    /// 4002: the client failed a ping-pong.
    PingPongFailure,
    /// 4003: no subscription was created within the grace period.
    ConnectionUnused,
    /// 4004: reconnect grace time expired; the superseded connection of a
    /// handoff is being retired.
    ReconnectGraceExpired,
    /// 4005: network timeout.
    NetworkTimeout,
    /// 4006: network error.
    NetworkError,
    /// 4007: the reconnect URL was invalid.
    InvalidReconnect,
    /// Any other code, including standard WebSocket codes such as 1000,
    /// 1005 and 1006.
    Other(u16),
}

/// What the controller does after a connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosePolicy {
    /// Schedule a reconnect with backoff, unless auto-reconnect is disabled.
    Reconnect,
    /// Do nothing; the caller decides if and when to connect again.
    Terminal,
    /// The old connection of a completed handoff died as expected; do
    /// nothing and leave the backoff state alone.
    ExpectedHandoff,
}

impl CloseCode {
    /// Returns the numeric wire value.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::InternalServerError => 4000,
            Self::ClientSentInboundTraffic => 4001,
            Self::PingPongFailure => 4002,
            Self::ConnectionUnused => 4003,
            Self::ReconnectGraceExpired => 4004,
            Self::NetworkTimeout => 4005,
            Self::NetworkError => 4006,
            Self::InvalidReconnect => 4007,
            Self::Other(code) => code,
        }
    }

    /// Returns the human-readable reason used in log lines.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::InternalServerError => "Internal Server Error",
            Self::ClientSentInboundTraffic => "Client sent inbound traffic",
            Self::PingPongFailure => "Client failed ping-pong",
            Self::ConnectionUnused => "Connection unused",
            Self::ReconnectGraceExpired => "Reconnect grace time expired",
            Self::NetworkTimeout => "Network Timeout",
            Self::NetworkError => "Network error",
            Self::InvalidReconnect => "Invalid Reconnect",
            Self::Other(_) => "Unspecified",
        }
    }

    /// Returns the retry decision for this code.
    #[must_use]
    pub const fn policy(self) -> ClosePolicy {
        match self {
            Self::ConnectionUnused => ClosePolicy::Terminal,
            Self::ReconnectGraceExpired => ClosePolicy::ExpectedHandoff,
            Self::InternalServerError
            | Self::ClientSentInboundTraffic
            | Self::PingPongFailure
            | Self::NetworkTimeout
            | Self::NetworkError
            | Self::InvalidReconnect
            | Self::Other(_) => ClosePolicy::Reconnect,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            4000 => Self::InternalServerError,
            4001 => Self::ClientSentInboundTraffic,
            4002 => Self::PingPongFailure,
            4003 => Self::ConnectionUnused,
            4004 => Self::ReconnectGraceExpired,
            4005 => Self::NetworkTimeout,
            4006 => Self::NetworkError,
            4007 => Self::InvalidReconnect,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.code()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.reason())
    }
}
