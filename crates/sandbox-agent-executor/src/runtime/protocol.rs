//! OpenAI-compatible chat completions wire types and mapping.

use sandbox_agent_core::{
    RuntimeError, RuntimeStep, ToolDeclaration, ToolInvocation, Transcript, TranscriptEntry,
};
use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    pub stream: bool,
}

/// One chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reasoning text some providers return next to `content`.
    #[serde(default, skip_serializing)]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Function name and JSON-encoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A declared function tool.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolDeclaration,
}

/// Response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

fn function_type() -> String {
    "function".into()
}

/// Build the request for the next step of `transcript`.
#[must_use]
pub fn to_chat_request(
    model: &str,
    instruction: &str,
    transcript: &Transcript,
    tools: &[ToolDeclaration],
) -> ChatRequest {
    let mut messages = vec![ChatMessage::text("system", instruction)];

    for entry in &transcript.entries {
        match entry {
            TranscriptEntry::User { text } => messages.push(ChatMessage::text("user", text.clone())),
            TranscriptEntry::Thinking { text } => {
                messages.push(ChatMessage::text("assistant", text.clone()));
            }
            TranscriptEntry::ToolCall(invocation) => {
                let call = to_chat_tool_call(invocation);
                // Thinking and the call it led to form one assistant turn.
                match messages.last_mut() {
                    Some(last) if last.role == "assistant" && last.tool_calls.is_empty() => {
                        last.tool_calls.push(call);
                    }
                    _ => messages.push(ChatMessage {
                        role: "assistant".into(),
                        tool_calls: vec![call],
                        ..ChatMessage::default()
                    }),
                }
            }
            TranscriptEntry::ToolResult(result) => messages.push(ChatMessage {
                role: "tool".into(),
                content: Some(serde_json::to_string(&result.outcome).unwrap_or_default()),
                tool_call_id: Some(result.invocation_id.clone()),
                ..ChatMessage::default()
            }),
        }
    }

    ChatRequest {
        model: model.into(),
        messages,
        tools: tools
            .iter()
            .cloned()
            .map(|function| ChatTool {
                kind: "function",
                function,
            })
            .collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        stream: false,
    }
}

fn to_chat_tool_call(invocation: &ToolInvocation) -> ChatToolCall {
    ChatToolCall {
        id: invocation.invocation_id.clone(),
        kind: function_type(),
        function: FunctionCall {
            name: invocation.tool_name.clone(),
            arguments: invocation.arguments.to_string(),
        },
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Map a model reply to the next runtime step.
///
/// Only the first tool call is honored; invocations are never pipelined.
///
/// # Errors
/// Returns [`RuntimeError::Protocol`] when the reply has no choices, no
/// usable content, or tool arguments that are not valid JSON.
pub fn from_chat_response(response: ChatResponse) -> Result<RuntimeStep, RuntimeError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RuntimeError::Protocol("response has no choices".into()))?
        .message;

    let reasoning = non_blank(message.reasoning_content);
    let content = non_blank(message.content);

    if let Some(call) = message.tool_calls.into_iter().next() {
        if call.id.is_empty() {
            return Err(RuntimeError::Protocol("tool call without an id".into()));
        }
        let arguments = serde_json::from_str(&call.function.arguments).map_err(|e| {
            RuntimeError::Protocol(format!(
                "tool call {} has unparseable arguments: {e}",
                call.id
            ))
        })?;
        let thinking = match (reasoning, content) {
            (Some(r), Some(c)) => Some(format!("{r}\n\n{c}")),
            (r, c) => r.or(c),
        };
        let step = RuntimeStep::call_tool(call.id, call.function.name, arguments);
        return Ok(match thinking {
            Some(text) => step.with_thinking(text),
            None => step,
        });
    }

    let answer =
        content.ok_or_else(|| RuntimeError::Protocol("reply has neither content nor tool calls".into()))?;
    let step = RuntimeStep::finish(answer);
    Ok(match reasoning {
        Some(text) => step.with_thinking(text),
        None => step,
    })
}

#[cfg(test)]
mod tests {
    use sandbox_agent_core::{
        ErrorDescriptor, RuntimeAction, ToolInvocation, ToolResult, TranscriptEntry,
    };
    use serde_json::json;

    use super::*;

    fn reply(message: serde_json::Value) -> ChatResponse {
        serde_json::from_value(json!({ "choices": [{ "message": message }] })).unwrap()
    }

    #[test]
    fn transcript_maps_to_chat_turns() {
        let mut transcript = Transcript::new("fib(100)?");
        transcript.push(TranscriptEntry::Thinking {
            text: "I'll compute it.".into(),
        });
        transcript.push(TranscriptEntry::ToolCall(ToolInvocation::new(
            "call_1",
            "run_code",
            json!({"code": "print(1)"}),
        )));
        transcript.push(TranscriptEntry::ToolResult(ToolResult::rejected(
            "call_1",
            ErrorDescriptor::invalid_arguments("nope"),
        )));

        let request = to_chat_request("m", "be helpful", &transcript, &[]);
        let roles: Vec<_> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
        assert_eq!(request.messages[2].tool_calls[0].id, "call_1");
        assert_eq!(request.messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn tool_call_reply_becomes_call_step() {
        let step = from_chat_response(reply(json!({
            "role": "assistant",
            "content": "Let me run this.",
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": { "name": "run_code", "arguments": "{\"code\":\"print(2)\"}" }
            }]
        })))
        .unwrap();

        assert_eq!(step.thinking.as_deref(), Some("Let me run this."));
        assert_eq!(
            step.action,
            RuntimeAction::CallTool {
                invocation_id: "call_9".into(),
                tool_name: "run_code".into(),
                arguments: json!({"code": "print(2)"}),
            }
        );
    }

    #[test]
    fn plain_reply_becomes_final_answer() {
        let step = from_chat_response(reply(json!({
            "role": "assistant",
            "reasoning_content": "Checked the output.",
            "content": "The answer is 354224848179261915075."
        })))
        .unwrap();
        assert_eq!(step.thinking.as_deref(), Some("Checked the output."));
        assert!(matches!(step.action, RuntimeAction::Finish { answer } if answer.contains("3542248")));
    }

    #[test]
    fn unparseable_arguments_are_a_protocol_error() {
        let err = from_chat_response(reply(json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "run_code", "arguments": "{not json" }
            }]
        })))
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Protocol(_)));
    }

    #[test]
    fn empty_reply_is_a_protocol_error() {
        let err = from_chat_response(ChatResponse { choices: vec![] }).unwrap_err();
        assert!(matches!(err, RuntimeError::Protocol(_)));
        let err = from_chat_response(reply(json!({"role": "assistant", "content": "  "}))).unwrap_err();
        assert!(matches!(err, RuntimeError::Protocol(_)));
    }
}
