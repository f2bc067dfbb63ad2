//! Streaming session: one prompt driven to a final answer.
//!
//! A session is a single cooperative loop. It asks the runtime for the next
//! step, emits what the runtime produced, runs at most one tool invocation at
//! a time, and feeds the result back. Every observable step is appended to
//! the session's [`EventLog`] in the order it happened.

use std::{collections::HashSet, future::Future, sync::Arc};

use sandbox_agent_core::{
    AgentRuntime, ErrorKind, EventKind, EventLog, EventLogError, RuntimeAction, RuntimeError,
    SessionId, SessionLimits, ToolInvocation, Transcript, TranscriptEntry,
};
use sandbox_agent_executor::ToolTable;
use tokio::sync::watch;

/// Lifecycle of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Reasoning,
    AwaitingTool,
    Finalizing,
    Closed,
    Errored,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A final answer was emitted.
    Completed,
    /// A terminal error event of this kind was emitted.
    Failed(ErrorKind),
    /// The client interrupted the session.
    Cancelled,
}

/// Escalation bounds for a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Consecutive failed tool outcomes tolerated before the session is fatal.
    pub max_tool_failures: u32,
    /// Runtime steps allowed before the session is fatal.
    pub max_steps: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionLimits::default())
    }
}

impl From<&SessionLimits> for SessionPolicy {
    fn from(limits: &SessionLimits) -> Self {
        Self {
            max_tool_failures: limits.max_tool_failures,
            max_steps: limits.max_steps,
        }
    }
}

/// Unrecoverable condition that ends the loop with an `error` event.
struct Fatal {
    kind: ErrorKind,
    message: String,
}

impl Fatal {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<RuntimeError> for Fatal {
    fn from(err: RuntimeError) -> Self {
        let kind = match err {
            RuntimeError::Protocol(_) => ErrorKind::ProtocolError,
            RuntimeError::Request(_) => ErrorKind::FatalSession,
        };
        Self::new(kind, err.to_string())
    }
}

/// A single agent turn from prompt to terminal event.
pub struct StreamingSession {
    id: SessionId,
    runtime: Arc<dyn AgentRuntime>,
    tools: Arc<ToolTable>,
    log: Arc<EventLog>,
    policy: SessionPolicy,
    state: watch::Sender<SessionState>,
    transcript: Transcript,
    seen_invocations: HashSet<String>,
    consecutive_failures: u32,
    steps: u32,
}

impl StreamingSession {
    /// Create an idle session for `prompt`, writing into `log`.
    #[must_use]
    pub fn new(
        id: SessionId,
        prompt: impl Into<String>,
        runtime: Arc<dyn AgentRuntime>,
        tools: Arc<ToolTable>,
        log: Arc<EventLog>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            id,
            runtime,
            tools,
            log,
            policy,
            state: watch::Sender::new(SessionState::Idle),
            transcript: Transcript::new(prompt),
            seen_invocations: HashSet::new(),
            consecutive_failures: 0,
            steps: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that follows every state transition, including the final one.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }

    /// Drive the session until it closes, errors, or `cancelled` resolves.
    ///
    /// Cancellation drops the in-flight runtime or tool call and appends a
    /// terminal `cancelled` error event.
    pub async fn run<F>(mut self, cancelled: F) -> SessionOutcome
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(cancelled);

        let driven = tokio::select! {
            biased;
            () = &mut cancelled => None,
            result = self.drive() => Some(result),
        };

        match driven {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) => {
                // Only reachable if the log was closed or poisoned underneath us.
                tracing::error!(session_id = %self.id, error = %e, "session event log unavailable");
                self.set_state(SessionState::Errored);
                SessionOutcome::Failed(ErrorKind::FatalSession)
            }
            None => {
                tracing::info!(session_id = %self.id, state = ?self.state(), "session interrupted");
                self.set_state(SessionState::Errored);
                if let Err(e) = self.log.append(EventKind::Error {
                    kind: ErrorKind::Cancelled,
                    message: "session interrupted by client".into(),
                }) {
                    tracing::warn!(session_id = %self.id, error = %e, "failed to record cancellation");
                }
                SessionOutcome::Cancelled
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    async fn drive(&mut self) -> Result<SessionOutcome, EventLogError> {
        self.set_state(SessionState::Reasoning);
        tracing::info!(session_id = %self.id, "session started");

        match self.reason().await? {
            Ok(()) => {
                tracing::info!(session_id = %self.id, steps = self.steps, "session completed");
                Ok(SessionOutcome::Completed)
            }
            Err(fatal) => {
                tracing::error!(
                    session_id = %self.id,
                    kind = ?fatal.kind,
                    message = %fatal.message,
                    "session failed"
                );
                self.set_state(SessionState::Errored);
                self.log.append(EventKind::Error {
                    kind: fatal.kind,
                    message: fatal.message,
                })?;
                Ok(SessionOutcome::Failed(fatal.kind))
            }
        }
    }

    /// The reasoning loop. The outer error is the log; the inner one ends the session.
    async fn reason(&mut self) -> Result<Result<(), Fatal>, EventLogError> {
        let declarations = self.tools.declarations();
        let runtime = Arc::clone(&self.runtime);

        loop {
            if self.steps >= self.policy.max_steps {
                return Ok(Err(Fatal::new(
                    ErrorKind::FatalSession,
                    format!("session exceeded {} reasoning steps", self.policy.max_steps),
                )));
            }
            self.steps += 1;

            let step = match runtime.next_step(&self.transcript, &declarations).await {
                Ok(step) => step,
                Err(e) => return Ok(Err(e.into())),
            };

            if let Some(text) = step.thinking {
                self.log.append(EventKind::Thinking { text: text.clone() })?;
                self.transcript.push(TranscriptEntry::Thinking { text });
            }

            match step.action {
                RuntimeAction::Finish { answer } => {
                    self.set_state(SessionState::Finalizing);
                    self.log.append(EventKind::FinalAnswer { text: answer })?;
                    self.set_state(SessionState::Closed);
                    return Ok(Ok(()));
                }
                RuntimeAction::CallTool {
                    invocation_id,
                    tool_name,
                    arguments,
                } => {
                    if invocation_id.trim().is_empty() {
                        return Ok(Err(Fatal::new(
                            ErrorKind::ProtocolError,
                            "runtime issued a tool call without an invocation id",
                        )));
                    }
                    if !self.seen_invocations.insert(invocation_id.clone()) {
                        return Ok(Err(Fatal::new(
                            ErrorKind::ProtocolError,
                            format!("runtime reused invocation id '{invocation_id}'"),
                        )));
                    }

                    let invocation = ToolInvocation::new(invocation_id, tool_name, arguments);
                    if let Some(fatal) = self.call_tool(invocation).await? {
                        return Ok(Err(fatal));
                    }
                    self.set_state(SessionState::Reasoning);
                }
            }
        }
    }

    async fn call_tool(&mut self, invocation: ToolInvocation) -> Result<Option<Fatal>, EventLogError> {
        self.set_state(SessionState::AwaitingTool);
        self.log.append(EventKind::ToolCall(invocation.clone()))?;
        self.transcript.push(TranscriptEntry::ToolCall(invocation.clone()));

        let tools = Arc::clone(&self.tools);
        let mut result = tools.dispatch(&invocation).await;
        // The result always answers the invocation that was emitted.
        result.invocation_id.clone_from(&invocation.invocation_id);

        let failure = result.failure_kind();
        self.log.append(EventKind::ToolResult(result.clone()))?;
        self.transcript.push(TranscriptEntry::ToolResult(result));

        let Some(kind) = failure else {
            self.consecutive_failures = 0;
            return Ok(None);
        };

        self.consecutive_failures += 1;
        tracing::warn!(
            session_id = %self.id,
            invocation_id = %invocation.invocation_id,
            ?kind,
            consecutive = self.consecutive_failures,
            "tool invocation failed"
        );

        if self.consecutive_failures > self.policy.max_tool_failures {
            return Ok(Some(Fatal::new(
                ErrorKind::FatalSession,
                format!(
                    "{} consecutive tool failures exceeded the retry budget of {}",
                    self.consecutive_failures, self.policy.max_tool_failures
                ),
            )));
        }
        Ok(None)
    }
}
