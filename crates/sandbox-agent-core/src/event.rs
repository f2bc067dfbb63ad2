//! Session events.

use serde::{Deserialize, Serialize};

use crate::tool::{ErrorKind, ToolInvocation, ToolResult};

/// What happened. Serialized adjacently as `{type, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum EventKind {
    /// Intermediate reasoning text from the runtime.
    Thinking { text: String },
    /// The runtime asked for a tool to run.
    ToolCall(ToolInvocation),
    /// A tool invocation was resolved.
    ToolResult(ToolResult),
    /// The session produced its answer. Terminal.
    FinalAnswer { text: String },
    /// The session failed. Terminal.
    Error { kind: ErrorKind, message: String },
}

impl EventKind {
    /// Wire tag of this kind.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ToolCall(_) => "toolCall",
            Self::ToolResult(_) => "toolResult",
            Self::FinalAnswer { .. } => "finalAnswer",
            Self::Error { .. } => "error",
        }
    }

    /// Whether no event may follow this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Error { .. })
    }
}

/// One entry of a session's ordered event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Zero-based position in the log.
    pub seq: u64,
    /// Unix epoch milliseconds at append time.
    pub timestamp: i64,
    pub kind: EventKind,
}

impl SessionEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
