//! Name-based event filtering for consumers.
//!
//! A consumer that only cares about a few subscription types (or only
//! lifecycle events) builds an [`EventFilter`] and receives through a
//! [`FilteredReceiver`], which skips everything else.

use std::collections::HashSet;

use tokio::sync::broadcast;

use super::SessionEvent;

/// Set of event names a consumer is interested in.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted names. If `all` is true, this set is ignored.
    names: HashSet<String>,
    /// Whether every event is accepted.
    all: bool,
}

impl EventFilter {
    /// Creates an empty filter that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self {
            names: HashSet::new(),
            all: true,
        }
    }

    /// Creates a filter for the given event names.
    #[must_use]
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new();
        filter.subscribe(names);
        filter
    }

    /// Adds event names. `"*"` enables the wildcard.
    pub fn subscribe<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if name == "*" {
                self.all = true;
            } else {
                self.names.insert(name);
            }
        }
    }

    /// Removes event names.
    pub fn unsubscribe<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.names.remove(name);
        }
    }

    /// Returns `true` if the event passes the filter.
    #[must_use]
    pub fn matches(&self, event: &SessionEvent) -> bool {
        self.all || self.names.contains(event.name())
    }

    /// Returns the number of explicitly listed names.
    #[must_use]
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the wildcard is active.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.all
    }
}

/// Broadcast receiver that skips events rejected by its [`EventFilter`].
#[derive(Debug)]
pub struct FilteredReceiver {
    inner: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    /// Wraps a bus receiver.
    #[must_use]
    pub fn new(inner: broadcast::Receiver<SessionEvent>, filter: EventFilter) -> Self {
        Self { inner, filter }
    }

    /// Returns the filter in use.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Receives the next matching event.
    ///
    /// Lagging is logged and skipped rather than reported.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::RecvError::Closed`] once the bus has been
    /// dropped.
    pub async fn recv(&mut self) -> Result<SessionEvent, broadcast::error::RecvError> {
        loop {
            match self.inner.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event consumer lagged behind event bus");
                }
                Err(err @ broadcast::error::RecvError::Closed) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventBus;

    #[test]
    fn empty_matches_nothing() {
        let filter = EventFilter::new();
        assert!(!filter.matches(&SessionEvent::SessionKeepalive));
    }

    #[test]
    fn named_filter_matches_listed_events() {
        let filter = EventFilter::names(["session_silenced", "close"]);
        assert!(filter.matches(&SessionEvent::SessionSilenced));
        assert!(!filter.matches(&SessionEvent::SessionKeepalive));
        assert_eq!(filter.count(), 2);
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut filter = EventFilter::new();
        filter.subscribe(["*"]);
        assert!(filter.is_all());
        assert!(filter.matches(&SessionEvent::SessionKeepalive));
        assert!(EventFilter::all().matches(&SessionEvent::SessionSilenced));
    }

    #[test]
    fn unsubscribe_removes_name() {
        let mut filter = EventFilter::names(["session_keepalive"]);
        filter.unsubscribe(["session_keepalive"]);
        assert!(!filter.matches(&SessionEvent::SessionKeepalive));
    }

    #[tokio::test]
    async fn filtered_receiver_skips_other_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_filtered(EventFilter::names(["session_silenced"]));

        bus.publish(SessionEvent::SessionKeepalive);
        bus.publish(SessionEvent::SessionSilenced);

        let Ok(event) = rx.recv().await else {
            panic!("expected silenced event");
        };
        assert_eq!(event, SessionEvent::SessionSilenced);
    }

    #[tokio::test]
    async fn filtered_receiver_reports_closed_bus() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe_filtered(EventFilter::all());
        drop(bus);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
