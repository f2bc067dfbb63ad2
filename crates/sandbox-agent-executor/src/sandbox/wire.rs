//! Sandbox HTTP wire format.

use sandbox_agent_core::{ExecutionRequest, Language};
use serde::{Deserialize, Serialize};

/// Body of an execution call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRequest<'a> {
    pub code: &'a str,
    pub language: Language,
    pub tool_id: &'a str,
}

impl<'a> SandboxRequest<'a> {
    #[must_use]
    pub fn new(request: &'a ExecutionRequest, tool_id: &'a str) -> Self {
        Self {
            code: request.code(),
            language: request.language(),
            tool_id,
        }
    }
}

/// Body of a successful HTTP response.
///
/// A non-zero `exit_code` means the code itself failed, not the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
}
