//! Session manager for orchestrating streaming sessions.

use std::{
    collections::{HashMap, VecDeque},
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use futures::{Stream, StreamExt, stream::BoxStream};
use sandbox_agent_core::{
    AgentRuntime, EventLog, SessionEvent, SessionId, SessionStorage,
    traits::{Session, SessionFilter, SessionStatus, StorageError},
};
use sandbox_agent_executor::ToolTable;
use tokio::sync::{RwLock, oneshot, watch};

use crate::session::{SessionOutcome, SessionPolicy, SessionState, StreamingSession};

/// Finished sessions whose event logs stay subscribable.
pub const DEFAULT_RETAIN_FINISHED: usize = 256;

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Prompt must not be empty")]
    EmptyPrompt,
}

/// Interrupt handle and live subscriber count, shared with [`Subscription`]s.
struct SessionControl {
    interrupt_tx: Mutex<Option<oneshot::Sender<()>>>,
    subscribers: AtomicUsize,
}

impl SessionControl {
    fn new(interrupt_tx: oneshot::Sender<()>) -> Self {
        Self {
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            subscribers: AtomicUsize::new(0),
        }
    }

    fn take_interrupt(&self) -> Option<oneshot::Sender<()>> {
        self.interrupt_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn interrupt(&self, session_id: SessionId) {
        if let Some(tx) = self.take_interrupt() {
            let _ = tx.send(());
            tracing::info!(%session_id, "interrupt requested");
        }
    }
}

/// Live state kept per session.
struct ActiveSession {
    log: Arc<EventLog>,
    state: watch::Receiver<SessionState>,
    control: Arc<SessionControl>,
}

/// Event stream of a session that counts as a live subscriber.
///
/// When the last live subscription is dropped before the terminal event,
/// the session is interrupted.
pub struct Subscription {
    session_id: SessionId,
    events: BoxStream<'static, SessionEvent>,
    log: Arc<EventLog>,
    control: Arc<SessionControl>,
}

impl Stream for Subscription {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.control.subscribers.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 || self.log.is_closed() {
            return;
        }
        tracing::info!(session_id = %self.session_id, "last subscriber left before the terminal event");
        self.control.interrupt(self.session_id);
    }
}

/// Starts sessions, hands out their event streams, and interrupts them.
///
/// Each session runs as its own task. Sessions share the runtime and the
/// tool table, never their transcripts or logs.
pub struct SessionManager<S>
where
    S: SessionStorage,
{
    storage: Arc<S>,
    runtime: Arc<dyn AgentRuntime>,
    tools: Arc<ToolTable>,
    policy: SessionPolicy,
    active_sessions: RwLock<HashMap<SessionId, ActiveSession>>,
    finished: Mutex<VecDeque<SessionId>>,
    retain_finished: usize,
}

impl<S> SessionManager<S>
where
    S: SessionStorage + 'static,
{
    /// Create a new session manager.
    #[must_use]
    pub fn new(storage: S, runtime: Arc<dyn AgentRuntime>, tools: ToolTable, policy: SessionPolicy) -> Self {
        Self {
            storage: Arc::new(storage),
            runtime,
            tools: Arc::new(tools),
            policy,
            active_sessions: RwLock::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            retain_finished: DEFAULT_RETAIN_FINISHED,
        }
    }

    /// Keep at most `count` finished sessions subscribable.
    #[must_use]
    pub const fn with_retain_finished(mut self, count: usize) -> Self {
        self.retain_finished = count;
        self
    }

    /// Start a new session and return its id. The session runs in the background.
    ///
    /// # Errors
    /// Returns error if the prompt is empty or the session cannot be stored.
    pub async fn start_session(self: &Arc<Self>, prompt: &str) -> Result<SessionId, ManagerError> {
        if prompt.trim().is_empty() {
            return Err(ManagerError::EmptyPrompt);
        }

        let session_id = self.storage.create(prompt).await?;
        self.storage
            .update_status(session_id, SessionStatus::Running)
            .await?;

        let log = Arc::new(EventLog::new());
        let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();

        let session = StreamingSession::new(
            session_id,
            prompt,
            Arc::clone(&self.runtime),
            Arc::clone(&self.tools),
            Arc::clone(&log),
            self.policy,
        );

        // Registered before the task starts so the session is subscribable at once.
        self.active_sessions.write().await.insert(
            session_id,
            ActiveSession {
                log,
                state: session.state_watch(),
                control: Arc::new(SessionControl::new(interrupt_tx)),
            },
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            // A dropped sender means nobody can interrupt any more, not a cancel.
            let cancelled = async move {
                if interrupt_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let outcome = session.run(cancelled).await;
            manager.finish(session_id, outcome).await;
        });

        tracing::info!(%session_id, "session spawned");
        Ok(session_id)
    }

    async fn finish(&self, session_id: SessionId, outcome: SessionOutcome) {
        let status = match outcome {
            SessionOutcome::Completed => SessionStatus::Completed,
            SessionOutcome::Failed(_) => SessionStatus::Failed,
            SessionOutcome::Cancelled => SessionStatus::Cancelled,
        };
        if let Err(e) = self.storage.update_status(session_id, status).await {
            tracing::warn!(%session_id, error = %e, "failed to record session status");
        }
        tracing::info!(%session_id, ?outcome, "session finished");

        if let Some(active) = self.active_sessions.read().await.get(&session_id) {
            active.control.take_interrupt();
        }

        let evicted: Vec<SessionId> = {
            let mut finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
            finished.push_back(session_id);
            let excess = finished.len().saturating_sub(self.retain_finished);
            finished.drain(..excess).collect()
        };
        if !evicted.is_empty() {
            let mut sessions = self.active_sessions.write().await;
            for id in &evicted {
                sessions.remove(id);
            }
            tracing::debug!(count = evicted.len(), "evicted finished session logs");
        }
    }

    /// Ordered event stream for a session, from its first event.
    ///
    /// The stream observes the session without keeping it alive; see [`Self::attach`].
    ///
    /// # Errors
    /// Returns error if the session is unknown or its log was evicted.
    pub async fn subscribe(&self, session_id: SessionId) -> Result<BoxStream<'static, SessionEvent>, ManagerError> {
        self.active_sessions
            .read()
            .await
            .get(&session_id)
            .map(|s| s.log.subscribe())
            .ok_or(ManagerError::NotFound(session_id))
    }

    /// Like [`Self::subscribe`], but the caller counts as a live subscriber.
    ///
    /// The session is interrupted once every attached subscription has been
    /// dropped before the terminal event.
    ///
    /// # Errors
    /// Returns error if the session is unknown or its log was evicted.
    pub async fn attach(&self, session_id: SessionId) -> Result<Subscription, ManagerError> {
        let sessions = self.active_sessions.read().await;
        let session = sessions
            .get(&session_id)
            .ok_or(ManagerError::NotFound(session_id))?;
        session.control.subscribers.fetch_add(1, Ordering::AcqRel);
        Ok(Subscription {
            session_id,
            events: session.log.subscribe(),
            log: Arc::clone(&session.log),
            control: Arc::clone(&session.control),
        })
    }

    /// Interrupt a running session. Interrupting a finished session is a no-op.
    ///
    /// # Errors
    /// Returns error if the session is unknown.
    pub async fn interrupt(&self, session_id: SessionId) -> Result<(), ManagerError> {
        self.active_sessions
            .read()
            .await
            .get(&session_id)
            .ok_or(ManagerError::NotFound(session_id))?
            .control
            .interrupt(session_id);
        Ok(())
    }

    /// Current state of a session's loop.
    ///
    /// Sessions whose logs were evicted report the state implied by their
    /// stored status.
    ///
    /// # Errors
    /// Returns error if the session is unknown or storage fails.
    pub async fn state(&self, session_id: SessionId) -> Result<SessionState, ManagerError> {
        if let Some(session) = self.active_sessions.read().await.get(&session_id) {
            return Ok(*session.state.borrow());
        }
        let status = self.get(session_id).await?.status;
        Ok(match status {
            SessionStatus::Completed => SessionState::Closed,
            status if status.is_finished() => SessionState::Errored,
            _ => SessionState::Idle,
        })
    }

    /// Stored record of a session.
    ///
    /// # Errors
    /// Returns error if the session is unknown or storage fails.
    pub async fn get(&self, session_id: SessionId) -> Result<Session, ManagerError> {
        self.storage
            .get(session_id)
            .await?
            .ok_or(ManagerError::NotFound(session_id))
    }

    /// Stored sessions, newest first.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, ManagerError> {
        Ok(self.storage.list(filter).await?)
    }
}
