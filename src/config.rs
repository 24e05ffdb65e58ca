//! Session configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with defaults matching the public
//! EventSub endpoint.

use std::time::Duration;

use crate::domain::backoff::{DEFAULT_BACKOFF_STEP, DEFAULT_BACKOFF_STEP_MS};
use crate::error::SessionError;
use crate::service::watchdog::DEFAULT_KEEPALIVE;

/// Public EventSub WebSocket endpoint.
pub const DEFAULT_EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

/// Session manager configuration.
///
/// Loaded once at startup via [`SessionConfig::from_env`], or built from
/// [`SessionConfig::default`] with struct update syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Endpoint used when `connect` is called without a URL.
    pub url: String,

    /// Connect as soon as the controller starts.
    pub connect: bool,

    /// Close the connection when the keepalive watchdog fires.
    pub silence_reconnect: bool,

    /// Never schedule reconnects after a close.
    pub disable_auto_reconnect: bool,

    /// Backoff increment per failed attempt.
    pub backoff_step: Duration,

    /// Upper bound on the backoff delay (`None` = unbounded).
    pub backoff_max: Option<Duration>,

    /// Keepalive interval assumed until a welcome declares one.
    pub default_keepalive: Duration,

    /// Upper bound on a closing handshake.
    pub close_timeout: Duration,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EVENTSUB_URL.to_string(),
            connect: false,
            silence_reconnect: true,
            disable_auto_reconnect: false,
            backoff_step: DEFAULT_BACKOFF_STEP,
            backoff_max: None,
            default_keepalive: DEFAULT_KEEPALIVE,
            close_timeout: Duration::from_secs(5),
            event_bus_capacity: 1024,
        }
    }
}

impl SessionConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `EVENTSUB_URL` is not a
    /// `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, SessionError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `EVENTSUB_URL` is not a
    /// `ws://` or `wss://` URL.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let url = lookup("EVENTSUB_URL").unwrap_or(defaults.url);
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SessionError::InvalidConfig(format!(
                "EVENTSUB_URL must be a ws:// or wss:// url, got {url:?}"
            )));
        }

        let backoff_max_ms: u64 = parse_value(lookup("EVENTSUB_BACKOFF_MAX_MS").as_deref(), 0);

        Ok(Self {
            url,
            connect: parse_bool(lookup("EVENTSUB_CONNECT").as_deref(), defaults.connect),
            silence_reconnect: parse_bool(
                lookup("EVENTSUB_SILENCE_RECONNECT").as_deref(),
                defaults.silence_reconnect,
            ),
            disable_auto_reconnect: parse_bool(
                lookup("EVENTSUB_DISABLE_AUTO_RECONNECT").as_deref(),
                defaults.disable_auto_reconnect,
            ),
            backoff_step: Duration::from_millis(parse_value(
                lookup("EVENTSUB_BACKOFF_STEP_MS").as_deref(),
                DEFAULT_BACKOFF_STEP_MS,
            )),
            backoff_max: (backoff_max_ms > 0).then(|| Duration::from_millis(backoff_max_ms)),
            default_keepalive: Duration::from_secs(parse_value(
                lookup("EVENTSUB_DEFAULT_KEEPALIVE_SECS").as_deref(),
                defaults.default_keepalive.as_secs(),
            )),
            close_timeout: Duration::from_secs(parse_value(
                lookup("EVENTSUB_CLOSE_TIMEOUT_SECS").as_deref(),
                defaults.close_timeout.as_secs(),
            )),
            event_bus_capacity: parse_value(
                lookup("EVENT_BUS_CAPACITY").as_deref(),
                defaults.event_bus_capacity,
            ),
        })
    }
}

/// Parses `raw` as `T`, returning `default` on missing or invalid values.
fn parse_value<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parses `raw` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
