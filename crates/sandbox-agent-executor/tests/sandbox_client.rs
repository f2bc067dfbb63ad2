//! Integration tests for the sandbox client using wiremock.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use sandbox_agent_core::{CodeExecutor, CredentialPair, ExecutionRequest, ExitStatus, Language};
use sandbox_agent_executor::{NoopSigner, SandboxClient, StaticKeySigner};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIB_100: &str = "354224848179261915075";

fn client(server: &MockServer) -> SandboxClient {
    SandboxClient::with_signer(
        format!("{}/run", server.uri()),
        "cn-beijing",
        "tool-1",
        Arc::new(StaticKeySigner::new(CredentialPair::new("AK", "SK"))),
    )
}

fn request(code: &str) -> ExecutionRequest {
    ExecutionRequest::new(code, Language::Python).expect("valid request")
}

#[tokio::test]
async fn successful_execution_returns_stdout() {
    let server = MockServer::start().await;
    let code = "a, b = 0, 1\nfor _ in range(100):\n    a, b = b, a + b\nprint(a)";

    Mock::given(method("POST"))
        .and(path("/run"))
        .and(body_json(json!({"code": code, "language": "python", "toolId": "tool-1"})))
        .and(header("x-access-key", "AK"))
        .and(header("x-region", "cn-beijing"))
        .and(header_exists("x-content-sha256"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stdout": format!("{FIB_100}\n"),
            "stderr": "",
            "exitCode": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = request(code);
    let result = client(&server).execute(&req, Duration::from_secs(5)).await;

    assert_eq!(result.exit_status, ExitStatus::Ok);
    assert_eq!(result.request_id, req.request_id());
    assert!(result.stdout.contains(FIB_100));
}

#[tokio::test]
async fn non_zero_exit_is_runtime_error_with_verbatim_streams() {
    let server = MockServer::start().await;
    let traceback = "Traceback (most recent call last):\n  File \"<string>\", line 1, in <module>\nZeroDivisionError: division by zero\n";

    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stdout": "before\n",
            "stderr": traceback,
            "exitCode": 1
        })))
        .mount(&server)
        .await;

    let result = client(&server)
        .execute(&request("print('before')\n1/0"), Duration::from_secs(5))
        .await;

    assert_eq!(result.exit_status, ExitStatus::RuntimeError);
    assert_eq!(result.stdout, "before\n");
    assert_eq!(result.stderr, traceback);
}

#[tokio::test]
async fn http_error_status_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(503).set_body_string("sandbox overloaded"))
        .mount(&server)
        .await;

    let result = client(&server)
        .execute(&request("print(1)"), Duration::from_secs(5))
        .await;

    assert_eq!(result.exit_status, ExitStatus::TransportError);
    assert!(result.stderr.contains("503"), "stderr: {}", result.stderr);
    assert!(result.stderr.contains("sandbox overloaded"));
}

#[tokio::test]
async fn malformed_body_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let result = client(&server)
        .execute(&request("print(1)"), Duration::from_secs(5))
        .await;

    assert_eq!(result.exit_status, ExitStatus::TransportError);
    assert!(!result.stderr.is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Port 9 (discard) on localhost is closed in test environments.
    let client = SandboxClient::with_signer("http://127.0.0.1:9/run", "r", "t", Arc::new(NoopSigner));

    let result = client
        .execute(&request("print(1)"), Duration::from_secs(5))
        .await;

    assert_eq!(result.exit_status, ExitStatus::TransportError);
    assert!(!result.stderr.is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_before_any_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = SandboxClient::with_signer(
        server.uri(),
        "r",
        "t",
        Arc::new(StaticKeySigner::new(CredentialPair::new("", ""))),
    );
    let result = client
        .execute(&request("print(1)"), Duration::from_secs(5))
        .await;

    assert_eq!(result.exit_status, ExitStatus::TransportError);
    assert!(result.stderr.contains("signing"));
}

#[tokio::test]
async fn slow_sandbox_times_out_without_blocking_past_the_deadline() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"stdout": "late", "stderr": "", "exitCode": 0}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let started = Instant::now();
    let result = client(&server).execute(&request("import time; time.sleep(10)"), timeout).await;

    assert_eq!(result.exit_status, ExitStatus::Timeout);
    assert!(started.elapsed() < timeout + Duration::from_secs(1));
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn concurrent_calls_do_not_cross_results() {
    let server = MockServer::start().await;

    for n in 0..4 {
        Mock::given(method("POST"))
            .and(body_json(json!({"code": format!("print({n})"), "language": "python", "toolId": "tool-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"stdout": format!("{n}\n"), "stderr": "", "exitCode": 0}))
                    .set_delay(Duration::from_millis(50 * (4 - n))),
            )
            .mount(&server)
            .await;
    }

    let client = client(&server);
    let requests: Vec<_> = (0..4).map(|n| request(&format!("print({n})"))).collect();
    let results = run_all(&client, &requests).await;

    for (req, result) in requests.iter().zip(&results) {
        assert_eq!(result.request_id, req.request_id());
        let expected = req.code().trim_start_matches("print(").trim_end_matches(')');
        assert_eq!(result.stdout.trim(), expected);
    }
}

async fn run_all(
    client: &SandboxClient,
    requests: &[ExecutionRequest],
) -> Vec<sandbox_agent_core::ExecutionResult> {
    let mut handles = Vec::new();
    for req in requests {
        let client = client.clone();
        let req = req.clone();
        handles.push(tokio::spawn(async move {
            client.execute(&req, Duration::from_secs(5)).await
        }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}
