//! # eventsub-session
//!
//! Client-side session manager for the Twitch EventSub WebSocket transport.
//!
//! The crate keeps a single logical event session alive over a sequence of
//! physical WebSocket connections: it decodes the server's framed messages,
//! tracks the session id and keepalive interval, detects silence, follows
//! server-directed handoffs to a new URL, and reconnects with linear backoff
//! after unexpected closes. Everything it observes is published as a typed
//! [`domain::SessionEvent`]; creating subscriptions over HTTP is left to the
//! consumer, which reacts to `connected`.
//!
//! ## Architecture
//!
//! ```text
//! Consumer
//!     │  connect / close            ▲ SessionEvent
//!     ▼                             │
//!     ├── SessionController (service/)   ── EventBus (domain/)
//!     │      Watchdog, Backoff, retry Timer
//!     │
//!     ├── Dispatcher (ws/)          decode + route frames
//!     │
//!     └── SocketHandle tasks (ws/)  one per connection attempt
//!            Connector (tokio-tungstenite)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use eventsub_session::config::SessionConfig;
//! use eventsub_session::service::SessionController;
//!
//! # async fn run() -> Result<(), eventsub_session::error::SessionError> {
//! let controller = SessionController::new(SessionConfig::from_env()?);
//! let mut events = controller.subscribe();
//! controller.connect(None, false);
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
