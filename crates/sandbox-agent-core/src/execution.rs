//! Execution requests and results exchanged with the sandbox.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Request identifier, unique per execution.
pub type RequestId = Uuid;

/// Languages the sandbox accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    /// Wire name of the language.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
        }
    }

    /// Parse a wire name. Matching is case-insensitive.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("python") {
            Some(Self::Python)
        } else {
            None
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an [`ExecutionRequest`] cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("code must not be empty")]
    EmptyCode,
}

/// A single piece of code to run in the sandbox.
///
/// Fields are private; a request cannot change once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    code: String,
    language: Language,
    request_id: RequestId,
}

impl ExecutionRequest {
    /// Build a request with a fresh request id.
    ///
    /// # Errors
    /// Returns [`RequestError::EmptyCode`] if `code` is blank.
    pub fn new(code: impl Into<String>, language: Language) -> Result<Self, RequestError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(RequestError::EmptyCode);
        }
        Ok(Self {
            code,
            language,
            request_id: Uuid::new_v4(),
        })
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitStatus {
    /// Code ran and exited zero.
    Ok,
    /// Code ran and raised or exited non-zero.
    RuntimeError,
    /// Execution exceeded its deadline.
    Timeout,
    /// The sandbox could not be reached or answered garbage.
    TransportError,
}

impl ExitStatus {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Outcome of one [`ExecutionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub request_id: RequestId,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: ExitStatus,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Result carrying sandbox output verbatim.
    #[must_use]
    pub fn completed(
        request_id: RequestId,
        stdout: String,
        stderr: String,
        exit_status: ExitStatus,
        duration_ms: u64,
    ) -> Self {
        Self {
            request_id,
            stdout,
            stderr,
            exit_status,
            duration_ms,
        }
    }

    /// Result for a request that never got a usable answer from the sandbox.
    #[must_use]
    pub fn transport_error(request_id: RequestId, diagnostic: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            request_id,
            stdout: String::new(),
            stderr: diagnostic.into(),
            exit_status: ExitStatus::TransportError,
            duration_ms,
        }
    }

    /// Result for a request cut off at its deadline.
    #[must_use]
    pub fn timed_out(request_id: RequestId, duration_ms: u64) -> Self {
        Self {
            request_id,
            stdout: String::new(),
            stderr: format!("execution exceeded deadline of {duration_ms} ms"),
            exit_status: ExitStatus::Timeout,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_code_is_rejected() {
        assert_eq!(
            ExecutionRequest::new("   \n", Language::Python),
            Err(RequestError::EmptyCode)
        );
    }

    #[test]
    fn each_request_gets_its_own_id() {
        let a = ExecutionRequest::new("print(1)", Language::Python).unwrap();
        let b = ExecutionRequest::new("print(1)", Language::Python).unwrap();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn language_parse_ignores_case() {
        assert_eq!(Language::parse("Python"), Some(Language::Python));
        assert_eq!(Language::parse("ruby"), None);
    }

    #[test]
    fn exit_status_uses_camel_case_on_the_wire() {
        let json = serde_json::to_string(&ExitStatus::TransportError).unwrap();
        assert_eq!(json, "\"transportError\"");
    }
}
