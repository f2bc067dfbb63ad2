//! Collaborator traits: storage, code execution and the agent runtime.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    execution::{ExecutionRequest, ExecutionResult},
    tool::{ToolDeclaration, ToolInvocation, ToolResult},
};

/// Session identifier.
pub type SessionId = Uuid;

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is created but its loop has not started.
    Pending,
    /// Session loop is running.
    Running,
    /// Session produced a final answer.
    Completed,
    /// Session ended with an unrecoverable error.
    Failed,
    /// Session was interrupted by its client.
    Cancelled,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Session filter for queries.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Filter by status.
    pub status: Option<SessionStatus>,
    /// Limit results.
    pub limit: Option<usize>,
}

/// Persisted session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The user prompt that opened the session.
    pub prompt: String,
    /// Current status.
    pub status: SessionStatus,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for session storage backends.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Create a new session record in `Pending` state.
    async fn create(&self, prompt: &str) -> Result<SessionId, StorageError>;

    /// Get a session by ID.
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Update session status.
    async fn update_status(&self, id: SessionId, status: SessionStatus) -> Result<(), StorageError>;

    /// List sessions with optional filter, newest first.
    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError>;
}

/// Something that runs code to completion.
///
/// Implementations hold no per-session state and must be safe to call
/// concurrently from many sessions. Failures are reported through
/// [`ExecutionResult::exit_status`], never as an `Err`.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute `request`, returning no later than `timeout` after the call.
    async fn execute(&self, request: &ExecutionRequest, timeout: Duration) -> ExecutionResult;
}

/// One entry of the conversation the runtime reasons over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum TranscriptEntry {
    User { text: String },
    Thinking { text: String },
    ToolCall(ToolInvocation),
    ToolResult(ToolResult),
}

/// Everything the runtime has seen in this session, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Start a transcript from the user's prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            entries: vec![TranscriptEntry::User { text: prompt.into() }],
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Most recent tool result, if any.
    #[must_use]
    pub fn last_tool_result(&self) -> Option<&ToolResult> {
        self.entries.iter().rev().find_map(|e| match e {
            TranscriptEntry::ToolResult(r) => Some(r),
            _ => None,
        })
    }

    /// Number of tool results recorded.
    #[must_use]
    pub fn tool_results(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::ToolResult(_)))
            .count()
    }
}

/// What the runtime wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeAction {
    /// Run a tool.
    CallTool {
        invocation_id: String,
        tool_name: String,
        arguments: Value,
    },
    /// Stop and answer.
    Finish { answer: String },
}

/// One reasoning step: optional thinking text followed by an action.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStep {
    pub thinking: Option<String>,
    pub action: RuntimeAction,
}

impl RuntimeStep {
    #[must_use]
    pub fn call_tool(invocation_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            thinking: None,
            action: RuntimeAction::CallTool {
                invocation_id: invocation_id.into(),
                tool_name: tool_name.into(),
                arguments,
            },
        }
    }

    #[must_use]
    pub fn finish(answer: impl Into<String>) -> Self {
        Self {
            thinking: None,
            action: RuntimeAction::Finish {
                answer: answer.into(),
            },
        }
    }

    /// Attach thinking text to this step.
    #[must_use]
    pub fn with_thinking(mut self, text: impl Into<String>) -> Self {
        self.thinking = Some(text.into());
        self
    }
}

/// Agent runtime error.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime answered, but the answer is malformed.
    #[error("Malformed runtime output: {0}")]
    Protocol(String),
    /// The runtime could not be reached or refused the request.
    #[error("Runtime request failed: {0}")]
    Request(String),
}

/// The reasoning process that decides between tool calls and answers.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Decide the next step given everything seen so far.
    async fn next_step(
        &self,
        transcript: &Transcript,
        tools: &[ToolDeclaration],
    ) -> Result<RuntimeStep, RuntimeError>;
}
