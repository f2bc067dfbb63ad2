//! SSE transport over a [`SessionManager`].
//!
//! Routes:
//! - `POST /sessions` with `{prompt}` returns `{sessionId}`
//! - `GET /sessions?status=&limit=` lists stored session records, newest first
//! - `GET /sessions/{id}` returns the stored session record
//! - `GET /sessions/{id}/events` streams the session log as SSE
//! - `GET /health` returns `ok`

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use sandbox_agent_core::{
    SessionEvent, SessionId, SessionStorage,
    traits::{Session, SessionFilter},
};
use sandbox_agent_session::{ManagerError, SessionManager};

use crate::protocol::{ErrorBody, ListSessionsQuery, StartSessionRequest, StartSessionResponse, WireEvent};

/// Interval of keep-alive comments on idle event streams.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// SSE handler state.
struct SseState<S: SessionStorage> {
    manager: Arc<SessionManager<S>>,
    keep_alive: Duration,
}

impl<S: SessionStorage> Clone for SseState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            keep_alive: self.keep_alive,
        }
    }
}

/// HTTP error mapped from [`ManagerError`].
struct ApiError(ManagerError);

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::EmptyPrompt => StatusCode::BAD_REQUEST,
            ManagerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn to_sse_event(event: &SessionEvent) -> Option<Event> {
    let wire = match WireEvent::from_event(event) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::error!(seq = event.seq, error = %e, "failed to encode session event");
            return None;
        }
    };
    match Event::default().id(event.seq.to_string()).json_data(&wire) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(seq = event.seq, error = %e, "failed to encode session event");
            None
        }
    }
}

async fn start_session<S>(
    State(state): State<SseState<S>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), ApiError>
where
    S: SessionStorage + 'static,
{
    let session_id = state.manager.start_session(&request.prompt).await?;
    Ok((StatusCode::CREATED, Json(StartSessionResponse { session_id })))
}

async fn get_session<S>(
    State(state): State<SseState<S>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Session>, ApiError>
where
    S: SessionStorage + 'static,
{
    Ok(Json(state.manager.get(session_id).await?))
}

async fn list_sessions<S>(
    State(state): State<SseState<S>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, ApiError>
where
    S: SessionStorage + 'static,
{
    let filter = SessionFilter {
        status: query.status,
        limit: query.limit,
    };
    Ok(Json(state.manager.list(filter).await?))
}

/// Each connection is an attached subscriber: the session is interrupted
/// only after every connection watching it has gone away.
async fn session_events<S>(
    State(state): State<SseState<S>>,
    Path(session_id): Path<SessionId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
    S: SessionStorage + 'static,
{
    let mut events = state.manager.attach(session_id).await?;

    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            if let Some(sse) = to_sse_event(&event) {
                yield Ok(sse);
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

async fn health() -> &'static str {
    "ok"
}

/// Create the session router.
///
/// # Example
/// ```ignore
/// let app = create_router(manager, DEFAULT_KEEP_ALIVE)
///     .layer(CorsLayer::permissive());
/// ```
#[must_use]
pub fn create_router<S>(manager: Arc<SessionManager<S>>, keep_alive: Duration) -> Router
where
    S: SessionStorage + 'static,
{
    Router::new()
        .route("/sessions", post(start_session::<S>).get(list_sessions::<S>))
        .route("/sessions/{id}", get(get_session::<S>))
        .route("/sessions/{id}/events", get(session_events::<S>))
        .route("/health", get(health))
        .with_state(SseState {
            manager,
            keep_alive,
        })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use sandbox_agent_core::{
        CodeExecutor, RuntimeStep,
        test_utils::{RecordingExecutor, ScriptedRuntime},
    };
    use sandbox_agent_executor::{RUN_CODE, RunCodeTool, ToolTable};
    use sandbox_agent_session::{SessionPolicy, storage::MemoryStorage};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let executor: Arc<dyn CodeExecutor> = Arc::new(RecordingExecutor::printing("4\n"));
        let runtime = ScriptedRuntime::from_fn(|transcript| {
            Ok(match transcript.last_tool_result() {
                None => RuntimeStep::call_tool("call_1", RUN_CODE, json!({"code": "print(2 + 2)"}))
                    .with_thinking("Running it."),
                Some(_) => RuntimeStep::finish("2 + 2 = 4"),
            })
        });
        let manager = SessionManager::new(
            MemoryStorage::new(),
            Arc::new(runtime),
            ToolTable::new().with(RunCodeTool::new(executor, Duration::from_secs(5)).unwrap()),
            SessionPolicy::default(),
        );
        create_router(Arc::new(manager), DEFAULT_KEEP_ALIVE)
    }

    fn post_session(prompt: &str) -> Request<Body> {
        Request::post("/sessions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "prompt": prompt }).to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn empty_prompt_is_a_bad_request() {
        let response = app().oneshot(post_session("")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let uri = format!("/sessions/{}/events", uuid::Uuid::new_v4());
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sessions_are_listed_with_filters() {
        let app = app();
        for prompt in ["first", "second"] {
            let response = app.clone().oneshot(post_session(prompt)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let all: Vec<Value> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s["prompt"].is_string()));

        let response = app
            .clone()
            .oneshot(Request::get("/sessions?limit=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let limited: Vec<Value> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(limited.len(), 1);

        let response = app
            .oneshot(Request::get("/sessions?status=pending").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let pending: Vec<Value> = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn events_stream_as_data_records() {
        let app = app();
        let response = app.clone().oneshot(post_session("2 + 2?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let session_id = created["sessionId"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::get(format!("/sessions/{session_id}/events"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = body_text(response).await;
        let records: Vec<Value> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();
        let types: Vec<_> = records.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["thinking", "toolCall", "toolResult", "finalAnswer"]);
        assert!(records.iter().all(|r| r["timestamp"].as_i64().is_some()));
        assert_eq!(records[3]["payload"]["text"], "2 + 2 = 4");
    }
}
