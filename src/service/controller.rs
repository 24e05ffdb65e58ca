//! Session controller: connection lifecycle, keepalive, reconnects.
//!
//! [`SessionController`] is a cheap handle; the state lives in a single
//! driver task that serializes commands, socket events, and timer expiry
//! through one `select!` loop. Public operations return immediately and
//! report their outcome as [`SessionEvent`]s.
//!
//! # Attempts
//!
//! Every connect allocates a new [`AttemptId`]. Exactly one attempt is
//! current. A `session_reconnect` handoff keeps the previous attempt open in
//! a draining set until the server closes it: its frames are still
//! dispatched to consumers, but only the current attempt can change the
//! session, the watchdog, or the backoff state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::state::{ConnectionState, SessionSnapshot};
use super::timer::Timer;
use super::watchdog::Watchdog;
use crate::config::SessionConfig;
use crate::domain::{
    AttemptId, Backoff, CloseEvent, ClosePolicy, EventBus, EventFilter, FilteredReceiver, Session,
    SessionEvent,
};
use crate::ws::connection::{SocketEvent, SocketEventKind, SocketEventSender, SocketHandle, SocketOptions};
use crate::ws::connector::{Connector, HeaderProvider, TungsteniteConnector};
use crate::ws::dispatcher::{Directive, Dispatcher};
use crate::ws::messages::WelcomeSession;

/// Requests from the handle to the driver task.
#[derive(Debug)]
enum Command {
    Connect { url: Option<String>, is_reconnect: bool },
    Close,
    Shutdown,
}

/// Configures and starts a [`SessionController`].
pub struct SessionControllerBuilder {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    headers: Option<HeaderProvider>,
    bus: Option<EventBus>,
}

impl fmt::Debug for SessionControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionControllerBuilder")
            .field("config", &self.config)
            .field("connector", &self.connector)
            .field("headers", &self.headers.as_ref().map(|_| "<provider>"))
            .field("bus", &self.bus)
            .finish()
    }
}

impl SessionControllerBuilder {
    /// Starts from `config` with the default connector and no headers.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            connector: Arc::new(TungsteniteConnector),
            headers: None,
            bus: None,
        }
    }

    /// Replaces the connector used to open sockets.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Sets the provider of handshake headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderProvider) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Publishes into an existing bus, so consumers can subscribe before
    /// the controller starts.
    #[must_use]
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Spawns the driver task. Connects immediately if `config.connect` is
    /// set.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn build(self) -> SessionController {
        let bus = self
            .bus
            .unwrap_or_else(|| EventBus::new(self.config.event_bus_capacity));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            silence_interval: self.config.default_keepalive,
            ..SessionSnapshot::default()
        });

        let auto_connect = self.config.connect;
        let driver = Driver {
            options: SocketOptions {
                connector: self.connector,
                headers: self.headers,
                close_timeout: self.config.close_timeout,
            },
            dispatcher: Dispatcher::new(bus.clone()),
            bus: bus.clone(),
            commands: commands_rx,
            socket_tx,
            socket_rx,
            snapshot: snapshot_tx,
            next_attempt: AttemptId::first(),
            state: ConnectionState::Idle,
            current: None,
            draining: BTreeMap::new(),
            session: None,
            backoff: Backoff::new(self.config.backoff_step, self.config.backoff_max),
            watchdog: Watchdog::new(self.config.default_keepalive),
            retry: Timer::new(),
            config: self.config,
        };
        let task = tokio::spawn(driver.run());

        let controller = SessionController {
            commands: commands_tx,
            bus,
            snapshot: snapshot_rx,
            task,
        };
        if auto_connect {
            controller.connect(None, false);
        }
        controller
    }
}

/// Handle to a running session.
///
/// Dropping the handle stops the driver, closes every socket, and cancels
/// both timers.
#[derive(Debug)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<Command>,
    bus: EventBus,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Starts a controller with the default connector.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::builder(config).build()
    }

    /// Returns a builder for custom connectors, headers, or event buses.
    #[must_use]
    pub fn builder(config: SessionConfig) -> SessionControllerBuilder {
        SessionControllerBuilder::new(config)
    }

    /// Opens a new connection to `url` (default: the configured endpoint).
    ///
    /// `is_reconnect` marks a handoff: the current connection stays open and
    /// the welcome on the new one is reported as `reconnected`.
    pub fn connect(&self, url: Option<&str>, is_reconnect: bool) {
        self.send(Command::Connect {
            url: url.map(str::to_owned),
            is_reconnect,
        });
    }

    /// Requests closure of the current connection. A no-op without one.
    pub fn close(&self) {
        self.send(Command::Close);
    }

    /// Subscribes to every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Subscribes to the events accepted by `filter`.
    #[must_use]
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        self.bus.subscribe_filtered(filter)
    }

    /// Returns the bus events are published on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the latest published state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver notified after every state change.
    #[must_use]
    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Stops the driver and waits for it to finish. Sockets are asked to
    /// close; their close events are not reported.
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "session driver ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("session driver stopped; command ignored");
        }
    }
}

/// The current connection and how it was opened.
#[derive(Debug)]
struct Attempt {
    socket: SocketHandle,
    is_reconnect: bool,
}

/// Owns all session state; runs inside the driver task.
struct Driver {
    config: SessionConfig,
    options: SocketOptions,
    bus: EventBus,
    dispatcher: Dispatcher,
    commands: mpsc::UnboundedReceiver<Command>,
    socket_tx: SocketEventSender,
    socket_rx: mpsc::UnboundedReceiver<SocketEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    next_attempt: AttemptId,
    state: ConnectionState,
    current: Option<Attempt>,
    draining: BTreeMap<AttemptId, SocketHandle>,
    session: Option<Session>,
    backoff: Backoff,
    watchdog: Watchdog,
    retry: Timer,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect { url, is_reconnect }) => self.connect(url, is_reconnect),
                    Some(Command::Close) => self.close(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.socket_rx.recv() => self.on_socket_event(event),
                () = self.watchdog.expired() => self.on_silence(),
                () = self.retry.expired() => {
                    tracing::debug!(attempts = self.backoff.attempts(), "backoff elapsed; reconnecting");
                    self.connect(None, false);
                }
            }
            self.publish_snapshot();
        }

        self.stop();
        self.publish_snapshot();
        tracing::debug!("session driver stopped");
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.socket.attempt() == attempt)
    }

    fn connect(&mut self, url: Option<String>, is_reconnect: bool) {
        self.retry.cancel();

        let url = url.unwrap_or_else(|| self.config.url.clone());
        let attempt = self.next_attempt;
        self.next_attempt = attempt.next();

        if let Some(previous) = self.current.take() {
            let mut socket = previous.socket;
            if is_reconnect {
                tracing::debug!(old = %socket.attempt(), new = %attempt, "handing off; old connection stays open");
            } else {
                tracing::debug!(old = %socket.attempt(), new = %attempt, "superseding current connection");
                socket.close();
            }
            self.draining.insert(socket.attempt(), socket);
        }
        if !is_reconnect {
            self.watchdog.cancel();
            self.session = None;
        }

        tracing::debug!(%attempt, %url, is_reconnect, "connecting");
        let socket = SocketHandle::spawn(attempt, url, &self.options, self.socket_tx.clone());
        self.current = Some(Attempt {
            socket,
            is_reconnect,
        });
        self.state = if is_reconnect {
            ConnectionState::ReconnectPending
        } else {
            ConnectionState::Connecting
        };
    }

    fn close(&mut self) {
        let Some(current) = self.current.as_mut() else {
            tracing::debug!("close requested without a connection; ignoring");
            return;
        };
        let attempt = current.socket.attempt();
        if current.socket.close() {
            tracing::debug!(%attempt, "closing connection");
            self.state = ConnectionState::Closing;
        } else {
            tracing::debug!(%attempt, "close already requested");
        }
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        let SocketEvent { attempt, kind } = event;
        let is_current = self.is_current(attempt);
        match kind {
            SocketEventKind::Open => self.on_open(attempt, is_current),
            SocketEventKind::Message(raw) => self.on_message(attempt, is_current, &raw),
            SocketEventKind::Error(error) => {
                tracing::warn!(%attempt, %error, "connection error");
            }
            SocketEventKind::Closed { code, reason } => self.on_close(CloseEvent {
                attempt,
                code,
                reason,
            }),
        }
    }

    fn on_open(&mut self, attempt: AttemptId, is_current: bool) {
        if !is_current {
            tracing::debug!(%attempt, "superseded connection opened");
            return;
        }
        tracing::debug!(%attempt, "connection opened");
        self.backoff.reset();
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::AwaitingWelcome;
        }
    }

    fn on_message(&mut self, attempt: AttemptId, is_current: bool, raw: &str) {
        let directive = self.dispatcher.dispatch(attempt, raw);
        if !is_current {
            if !matches!(directive, Directive::Ignore | Directive::Rearm) {
                tracing::debug!(%attempt, ?directive, "ignoring session change from superseded connection");
            }
            return;
        }

        match directive {
            Directive::Welcome(welcome) => self.on_welcome(attempt, welcome),
            Directive::Rearm if self.session.is_some() => self.watchdog.reset(),
            Directive::Rearm | Directive::Ignore => {}
            Directive::Handoff(url) => self.connect(Some(url), true),
        }
    }

    fn on_welcome(&mut self, attempt: AttemptId, welcome: WelcomeSession) {
        let declared = welcome.keepalive_timeout_seconds.map(Duration::from_secs);
        let keepalive_timeout = declared
            .or_else(|| self.session.as_ref().map(|s| s.keepalive_timeout))
            .unwrap_or(self.config.default_keepalive);
        let is_reconnect = self
            .current
            .as_ref()
            .is_some_and(|current| current.is_reconnect);

        let session = Session::new(welcome.id, keepalive_timeout, attempt);
        tracing::info!(
            %attempt,
            session_id = %session.id,
            keepalive_secs = keepalive_timeout.as_secs(),
            is_reconnect,
            "session established"
        );

        let session_id = session.id.clone();
        self.session = Some(session);
        self.state = ConnectionState::Active;
        self.watchdog.arm(declared);

        let event = if is_reconnect {
            SessionEvent::Reconnected { session_id }
        } else {
            SessionEvent::Connected { session_id }
        };
        self.bus.publish(event);
    }

    fn on_close(&mut self, close: CloseEvent) {
        let attempt = close.attempt;
        let close_code = close.close_code();
        let is_current = self.is_current(attempt);
        tracing::info!(
            %attempt,
            session_id = self.session.as_ref().map_or("", |s| s.id.as_str()),
            code = close_code.code(),
            reason = close_code.reason(),
            "connection closed"
        );
        self.bus.publish(SessionEvent::Close(close));

        if !is_current {
            self.draining.remove(&attempt);
            tracing::debug!(%attempt, "superseded connection closed");
            return;
        }

        self.current = None;
        self.session = None;
        self.watchdog.cancel();
        self.state = ConnectionState::Idle;

        match close_code.policy() {
            ClosePolicy::Terminal => {
                tracing::info!(%attempt, "connection unused; waiting for the caller to reconnect");
            }
            ClosePolicy::ExpectedHandoff => {
                tracing::debug!(%attempt, "handoff connection retired");
            }
            ClosePolicy::Reconnect if self.config.disable_auto_reconnect => {
                tracing::debug!(%attempt, "auto reconnect disabled");
            }
            ClosePolicy::Reconnect => {
                let delay = self.backoff.schedule();
                let attempts = self.backoff.attempts();
                tracing::debug!(%attempt, attempts, delay_ms = delay.as_millis(), "reconnect scheduled");
                self.retry.arm(delay);
                self.bus
                    .publish(SessionEvent::ReconnectScheduled { attempts, delay });
            }
        }
    }

    fn on_silence(&mut self) {
        tracing::warn!(
            session_id = self.session.as_ref().map_or("", |s| s.id.as_str()),
            interval_secs = self.watchdog.interval().as_secs(),
            "connection silenced"
        );
        self.bus.publish(SessionEvent::SessionSilenced);
        if self.config.silence_reconnect {
            self.close();
        }
    }

    fn stop(&mut self) {
        self.retry.cancel();
        self.watchdog.cancel();
        if let Some(mut current) = self.current.take() {
            current.socket.close();
        }
        for socket in self.draining.values_mut() {
            socket.close();
        }
        self.draining.clear();
        self.session = None;
        self.state = ConnectionState::Idle;
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            state: self.state,
            current_attempt: self.current.as_ref().map(|c| c.socket.attempt()),
            draining_attempts: self.draining.keys().copied().collect(),
            session: self.session.clone(),
            backoff_attempts: self.backoff.attempts(),
            silence_interval: self.watchdog.interval(),
            watchdog_armed: self.watchdog.is_armed(),
            reconnect_scheduled: self.retry.is_armed(),
        });
    }
}
