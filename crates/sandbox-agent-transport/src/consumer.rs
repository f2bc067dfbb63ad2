//! HTTP client consumer for the SSE endpoint.

use futures::{StreamExt, stream::BoxStream};
use sandbox_agent_core::{SessionEvent, SessionId, traits::Session};
use thiserror::Error;

use crate::protocol::{ListSessionsQuery, StartSessionRequest, StartSessionResponse, WireEvent};

/// Client consumer error.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed event record: {0}")]
    Decode(String),
    #[error("event stream ended before a terminal event")]
    Truncated,
}

/// Splits an SSE byte stream into `data` payloads.
///
/// Comments, `id:` and `event:` fields are ignored.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    records.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                self.data_lines
                    .push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        records
    }
}

/// Parse one record. `Ok(None)` means an event type this version skips.
fn parse_record(data: &str) -> Result<Option<SessionEvent>, ConsumerError> {
    let wire: WireEvent =
        serde_json::from_str(data).map_err(|e| ConsumerError::Decode(format!("{e}: {data}")))?;
    let kind = wire.kind.clone();
    let event = wire
        .into_event()
        .map_err(|e| ConsumerError::Decode(format!("{kind}: {e}")))?;
    if event.is_none() {
        tracing::warn!(event_type = %kind, "skipping unknown event type");
    }
    Ok(event)
}

/// Client for a session server.
#[derive(Debug, Clone)]
pub struct EventStreamClient {
    base_url: String,
    http: reqwest::Client,
}

impl EventStreamClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8000`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ConsumerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(ConsumerError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    /// Open a session for `prompt`.
    ///
    /// # Errors
    /// Returns error if the server is unreachable or rejects the prompt.
    pub async fn start_session(&self, prompt: &str) -> Result<SessionId, ConsumerError> {
        let response = self
            .http
            .post(format!("{}/sessions", self.base_url))
            .json(&StartSessionRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await?;
        let created: StartSessionResponse = Self::check(response).await?.json().await?;
        tracing::debug!(session_id = %created.session_id, "session started");
        Ok(created.session_id)
    }

    /// Stored record of a session.
    ///
    /// # Errors
    /// Returns error if the server is unreachable or the session is unknown.
    pub async fn session(&self, session_id: SessionId) -> Result<Session, ConsumerError> {
        let response = self
            .http
            .get(format!("{}/sessions/{session_id}", self.base_url))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Stored session records matching `query`, newest first.
    ///
    /// # Errors
    /// Returns error if the server is unreachable or fails.
    pub async fn sessions(&self, query: &ListSessionsQuery) -> Result<Vec<Session>, ConsumerError> {
        let response = self
            .http
            .get(format!("{}/sessions", self.base_url))
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Lazy, finite sequence of a session's events.
    ///
    /// The stream ends right after `finalAnswer` or `error`. Unknown event
    /// types are skipped. A connection that closes early yields
    /// [`ConsumerError::Truncated`]. Dropping the stream disconnects; a
    /// session that has not finished is interrupted once its last
    /// subscriber has disconnected.
    ///
    /// # Errors
    /// Returns error if the stream cannot be opened.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
    ) -> Result<BoxStream<'static, Result<SessionEvent, ConsumerError>>, ConsumerError> {
        let response = self
            .http
            .get(format!("{}/sessions/{session_id}/events", self.base_url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let mut body = Self::check(response).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(ConsumerError::Http(e));
                        return;
                    }
                };
                for data in decoder.push(&chunk) {
                    match parse_record(&data) {
                        Ok(Some(event)) => {
                            let terminal = event.is_terminal();
                            yield Ok(event);
                            if terminal {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            yield Err(ConsumerError::Truncated);
        };
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_split_chunks_and_comments() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b": keep-alive\n\nid: 0\ndata: {\"a\"").is_empty());
        let records = decoder.push(b":1}\r\n\r\ndata: x\n");
        assert_eq!(records, vec!["{\"a\":1}".to_string()]);
        assert_eq!(decoder.push(b"\n"), vec!["x".to_string()]);
    }

    #[test]
    fn decoder_keeps_multibyte_text_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let text = "data: π\n\n".as_bytes();
        let (head, tail) = text.split_at(7);
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["π".to_string()]);
    }

    #[test]
    fn unknown_record_is_skipped() {
        let parsed = parse_record(r#"{"type":"heartbeat","payload":null,"timestamp":5}"#).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn garbage_record_is_a_decode_error() {
        assert!(matches!(parse_record("not json"), Err(ConsumerError::Decode(_))));
    }
}
