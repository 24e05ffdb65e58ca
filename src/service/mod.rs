//! Service layer: session orchestration.
//!
//! [`SessionController`] owns the connection lifecycle. It spawns sockets
//! through the [`crate::ws`] layer, tracks keepalive with a [`Watchdog`],
//! schedules reconnects with [`crate::domain::Backoff`], and emits
//! everything it observes through the [`crate::domain::EventBus`].

pub mod controller;
pub mod state;
pub mod timer;
pub mod watchdog;

pub use controller::{SessionController, SessionControllerBuilder};
pub use state::{ConnectionState, SessionSnapshot};
pub use timer::Timer;
pub use watchdog::Watchdog;
