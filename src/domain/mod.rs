//! Domain layer: session model, retry policy, and event system.
//!
//! This module contains the value types the controller reasons about
//! (attempt ids, sessions, close codes, backoff state) and the event bus
//! through which every outcome reaches consumers.

pub mod attempt;
pub mod backoff;
pub mod close_code;
pub mod event;
pub mod event_bus;
pub mod event_filter;
pub mod session;

pub use attempt::AttemptId;
pub use backoff::Backoff;
pub use close_code::{CloseCode, ClosePolicy};
pub use event::{CloseEvent, SessionEvent};
pub use event_bus::EventBus;
pub use event_filter::{EventFilter, FilteredReceiver};
pub use session::Session;
