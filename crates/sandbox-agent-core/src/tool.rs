//! Tool invocations, results and declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::ExecutionResult;

/// Error taxonomy shared by tool results and terminal session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Tool call was malformed and never reached the sandbox.
    InvalidArguments,
    /// Network or signing failure reaching the sandbox.
    TransportError,
    /// Code executed but raised or failed.
    RuntimeError,
    /// Execution exceeded its deadline.
    Timeout,
    /// The agent runtime produced malformed output.
    ProtocolError,
    /// Retry or step budget exhausted, or the runtime became unusable.
    FatalSession,
    /// The session was interrupted by its client.
    Cancelled,
}

/// Structured description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDescriptor {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArguments, message)
    }
}

/// A tool call requested by the agent runtime.
///
/// `arguments` is kept exactly as the runtime produced it; the tool adapter
/// validates it into an [`ExecutionRequest`](crate::ExecutionRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub invocation_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(invocation_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Either the tool ran, or it was rejected before running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran. The executed code may still have failed; see `exit_status`.
    Ok { result: ExecutionResult },
    /// The tool did not run.
    Error { error: ErrorDescriptor },
}

/// Result of resolving one [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub invocation_id: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    #[must_use]
    pub fn executed(invocation_id: impl Into<String>, result: ExecutionResult) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            outcome: ToolOutcome::Ok { result },
        }
    }

    #[must_use]
    pub fn rejected(invocation_id: impl Into<String>, error: ErrorDescriptor) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            outcome: ToolOutcome::Error { error },
        }
    }

    /// The execution result, if the tool ran.
    #[must_use]
    pub const fn execution(&self) -> Option<&ExecutionResult> {
        match &self.outcome {
            ToolOutcome::Ok { result } => Some(result),
            ToolOutcome::Error { .. } => None,
        }
    }

    /// Error taxonomy entry for this result, `None` when the code ran cleanly.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            ToolOutcome::Ok { result } => match result.exit_status {
                crate::ExitStatus::Ok => None,
                crate::ExitStatus::RuntimeError => Some(ErrorKind::RuntimeError),
                crate::ExitStatus::Timeout => Some(ErrorKind::Timeout),
                crate::ExitStatus::TransportError => Some(ErrorKind::TransportError),
            },
            ToolOutcome::Error { error } => Some(error.kind),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.failure_kind().is_some()
    }
}

/// Declaration of a tool as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}
