//! The `run_code` tool: validates arguments and runs them in the sandbox.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sandbox_agent_core::{
    CodeExecutor, ErrorDescriptor, ExecutionRequest, Language, ToolDeclaration, ToolInvocation,
    ToolResult,
};
use serde_json::{Value, json};

use crate::tools::ToolHandler;

/// Name under which the tool is declared to the runtime.
pub const RUN_CODE: &str = "run_code";

const DESCRIPTION: &str = "Run a Python program in an isolated sandbox and return its stdout, \
    stderr and exit status. Use print() to surface results; only the Python standard library \
    is available.";

/// A `run_code` tool built with a zero execution deadline.
#[derive(Debug, thiserror::Error)]
#[error("execution timeout must be greater than zero")]
pub struct ZeroTimeout;

/// Tool adapter between the agent runtime and a [`CodeExecutor`].
pub struct RunCodeTool {
    executor: Arc<dyn CodeExecutor>,
    timeout: Duration,
}

impl RunCodeTool {
    /// `timeout` bounds every execution; the caller picks it.
    ///
    /// # Errors
    /// Returns [`ZeroTimeout`] if `timeout` is zero.
    pub fn new(executor: Arc<dyn CodeExecutor>, timeout: Duration) -> Result<Self, ZeroTimeout> {
        if timeout.is_zero() {
            return Err(ZeroTimeout);
        }
        Ok(Self { executor, timeout })
    }

    /// Check raw tool arguments against the declared schema.
    ///
    /// `language` may be omitted and defaults to Python.
    ///
    /// # Errors
    /// Returns an `invalidArguments` descriptor naming the first violation.
    pub fn validate(arguments: &Value) -> Result<ExecutionRequest, ErrorDescriptor> {
        let object = arguments
            .as_object()
            .ok_or_else(|| ErrorDescriptor::invalid_arguments("arguments must be a JSON object"))?;

        let code = match object.get("code") {
            Some(Value::String(code)) => code,
            Some(_) => return Err(ErrorDescriptor::invalid_arguments("'code' must be a string")),
            None => return Err(ErrorDescriptor::invalid_arguments("'code' is required")),
        };

        let language = match object.get("language") {
            None | Some(Value::Null) => Language::Python,
            Some(Value::String(name)) => Language::parse(name).ok_or_else(|| {
                ErrorDescriptor::invalid_arguments(format!("unsupported language '{name}'"))
            })?,
            Some(_) => {
                return Err(ErrorDescriptor::invalid_arguments("'language' must be a string"));
            }
        };

        ExecutionRequest::new(code.clone(), language)
            .map_err(|e| ErrorDescriptor::invalid_arguments(e.to_string()))
    }
}

#[async_trait]
impl ToolHandler for RunCodeTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: RUN_CODE.into(),
            description: DESCRIPTION.into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Complete program to execute"
                    },
                    "language": {
                        "type": "string",
                        "enum": [Language::Python.as_str()],
                        "description": "Language of the program"
                    }
                },
                "required": ["code"]
            }),
        }
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> ToolResult {
        let request = match Self::validate(&invocation.arguments) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(
                    invocation_id = %invocation.invocation_id,
                    reason = %error.message,
                    "rejected run_code arguments"
                );
                return ToolResult::rejected(invocation.invocation_id.clone(), error);
            }
        };

        tracing::debug!(
            invocation_id = %invocation.invocation_id,
            request_id = %request.request_id(),
            "dispatching run_code to sandbox"
        );

        let result = self.executor.execute(&request, self.timeout).await;
        if !result.exit_status.is_ok() {
            tracing::warn!(
                invocation_id = %invocation.invocation_id,
                request_id = %result.request_id,
                status = ?result.exit_status,
                "executed code did not succeed"
            );
        }

        ToolResult::executed(invocation.invocation_id.clone(), result)
    }
}
