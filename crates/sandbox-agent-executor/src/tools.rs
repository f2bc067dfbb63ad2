//! Tool table: declared tools keyed by name.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use sandbox_agent_core::{ErrorDescriptor, ToolDeclaration, ToolInvocation, ToolResult};

/// A capability the agent runtime may call by name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Declaration presented to the model. The name is the dispatch key.
    fn declaration(&self) -> ToolDeclaration;

    /// Resolve an invocation. Failures are returned as values.
    async fn invoke(&self, invocation: &ToolInvocation) -> ToolResult;
}

/// Closed set of tools available to a session.
#[derive(Default, Clone)]
pub struct ToolTable {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name, replacing any previous one.
    #[must_use]
    pub fn with(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    /// Register a pre-erased tool.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.declaration().name;
        self.handlers.insert(name, handler);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Declarations for every registered tool, ordered by name.
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.handlers.values().map(|h| h.declaration()).collect()
    }

    /// Dispatch an invocation to its tool.
    ///
    /// Unknown tool names resolve to an `invalidArguments` result.
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> ToolResult {
        match self.handlers.get(&invocation.tool_name) {
            Some(handler) => handler.invoke(invocation).await,
            None => {
                tracing::warn!(
                    invocation_id = %invocation.invocation_id,
                    tool = %invocation.tool_name,
                    "runtime requested an undeclared tool"
                );
                ToolResult::rejected(
                    invocation.invocation_id.clone(),
                    ErrorDescriptor::invalid_arguments(format!(
                        "unknown tool '{}'",
                        invocation.tool_name
                    )),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use sandbox_agent_core::ErrorKind;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: "echo".into(),
                description: "echo".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, invocation: &ToolInvocation) -> ToolResult {
            ToolResult::rejected(
                invocation.invocation_id.clone(),
                ErrorDescriptor::invalid_arguments(invocation.arguments.to_string()),
            )
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_name() {
        let table = ToolTable::new().with(Echo);
        let result = table
            .dispatch(&ToolInvocation::new("1", "echo", json!({"x": 1})))
            .await;
        assert_eq!(result.invocation_id, "1");
        assert!(table.get("echo").is_some());
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_arguments() {
        let table = ToolTable::new().with(Echo);
        let result = table
            .dispatch(&ToolInvocation::new("2", "rm_rf", json!({})))
            .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::InvalidArguments));
    }
}
