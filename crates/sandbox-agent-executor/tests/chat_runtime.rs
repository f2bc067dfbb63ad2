//! Integration tests for the chat-completions runtime using wiremock.

use sandbox_agent_core::{
    AgentProfile, AgentRuntime, RuntimeAction, RuntimeError, Transcript, config::ModelSettings,
};
use sandbox_agent_executor::{ChatCompletionsRuntime, RunCodeTool, ToolHandler};
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime(server: &MockServer) -> ChatCompletionsRuntime {
    let settings = ModelSettings {
        endpoint: format!("{}/api/v3", server.uri()),
        key: Secret::new("model-key".into()),
        name: "deepseek-v3-2-251201".into(),
    };
    ChatCompletionsRuntime::new(&settings, AgentProfile::default())
}

fn declarations() -> Vec<sandbox_agent_core::ToolDeclaration> {
    let executor = std::sync::Arc::new(sandbox_agent_core::test_utils::RecordingExecutor::printing(""));
    vec![RunCodeTool::new(executor, std::time::Duration::from_secs(1))
        .unwrap()
        .declaration()]
}

#[tokio::test]
async fn sends_tools_and_instruction_then_parses_tool_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .and(header("authorization", "Bearer model-key"))
        .and(body_partial_json(json!({
            "model": "deepseek-v3-2-251201",
            "tool_choice": "auto"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "run_code",
                            "arguments": "{\"code\": \"print(1)\", \"language\": \"python\"}"
                        }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let step = runtime(&server)
        .next_step(&Transcript::new("Compute something"), &declarations())
        .await
        .expect("step");

    let received = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).expect("json body");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "run_code");
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"].as_str().unwrap_or_default().contains("run_code"));
    assert_eq!(body["messages"][1]["content"], "Compute something");

    assert!(step.thinking.is_none());
    match step.action {
        RuntimeAction::CallTool {
            invocation_id,
            tool_name,
            arguments,
        } => {
            assert_eq!(invocation_id, "call_abc");
            assert_eq!(tool_name, "run_code");
            assert_eq!(arguments["code"], "print(1)");
        }
        other => panic!("expected tool call, got {other:?}"),
    }
}

#[tokio::test]
async fn http_failure_is_a_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = runtime(&server)
        .next_step(&Transcript::new("hi"), &[])
        .await
        .unwrap_err();

    match err {
        RuntimeError::Request(msg) => assert!(msg.contains("401"), "message: {msg}"),
        other => panic!("expected request error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = runtime(&server)
        .next_step(&Transcript::new("hi"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Protocol(_)));
}
