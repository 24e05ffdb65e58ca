//! WebSocket layer: wire messages, frame dispatch, socket tasks.
//!
//! Each physical connection runs in its own task (see [`connection`]) and
//! reports tagged events to the controller, which hands text frames to the
//! [`dispatcher`].

pub mod connection;
pub mod connector;
pub mod dispatcher;
pub mod messages;
