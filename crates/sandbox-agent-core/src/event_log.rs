//! Append-only event log with live subscription.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use futures::{StreamExt, stream::BoxStream};
use thiserror::Error;
use tokio::sync::watch;

use crate::event::{EventKind, SessionEvent};

/// Event log error.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Event log is closed: a terminal event was already appended")]
    Closed,
    #[error("Event log lock poisoned")]
    Poisoned,
}

#[derive(Default)]
struct Inner {
    events: Vec<SessionEvent>,
    closed: bool,
}

/// Ordered, append-only log of one session's events.
///
/// Subscribers replay history then follow live appends, so a late
/// subscriber sees the same sequence as an early one. Nothing is evicted;
/// the log lives as long as its session record.
pub struct EventLog {
    inner: RwLock<Inner>,
    len_tx: watch::Sender<usize>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner::default()),
            len_tx,
        }
    }

    /// Append an event, assigning its sequence number and timestamp.
    ///
    /// # Errors
    /// Returns [`EventLogError::Closed`] once a terminal event has been appended.
    pub fn append(&self, kind: EventKind) -> Result<SessionEvent, EventLogError> {
        let mut inner = self.inner.write().map_err(|_| EventLogError::Poisoned)?;
        if inner.closed {
            tracing::warn!(kind = kind.tag(), "append after terminal event rejected");
            return Err(EventLogError::Closed);
        }

        let event = SessionEvent {
            seq: inner.events.len() as u64,
            timestamp: now_millis(),
            kind,
        };
        inner.closed = event.is_terminal();
        inner.events.push(event.clone());
        // Notify while still holding the lock so watchers never observe a
        // length ahead of the stored events.
        self.len_tx.send_replace(inner.events.len());

        Ok(event)
    }

    /// Number of events appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a terminal event has been appended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// Snapshot of every event appended so far.
    #[must_use]
    pub fn history(&self) -> Vec<SessionEvent> {
        self.read().events.clone()
    }

    /// Event at `index`, or `Err(closed)` when there is none yet.
    fn at(&self, index: usize) -> Result<SessionEvent, bool> {
        let inner = self.read();
        inner.events.get(index).cloned().ok_or(inner.closed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lazy stream of the whole log: history first, then live appends.
    ///
    /// The stream ends right after yielding the terminal event.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> BoxStream<'static, SessionEvent> {
        let rx = self.len_tx.subscribe();
        let state = (Arc::clone(self), rx, 0_usize, false);

        futures::stream::unfold(state, |(log, mut rx, cursor, done)| async move {
            if done {
                return None;
            }
            loop {
                match log.at(cursor) {
                    Ok(event) => {
                        let done = event.is_terminal();
                        return Some((event, (log, rx, cursor + 1, done)));
                    }
                    Err(true) => return None,
                    Err(false) => {}
                }
                // The sender lives inside `log`, so this only fails if the
                // log itself is gone.
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        })
        .boxed()
    }
}
