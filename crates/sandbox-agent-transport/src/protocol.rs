//! Wire protocol for client-server communication.

use sandbox_agent_core::{EventKind, SessionEvent, SessionId, traits::SessionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Event types this version understands.
pub const KNOWN_TYPES: [&str; 5] = ["thinking", "toolCall", "toolResult", "finalAnswer", "error"];

/// One SSE `data:` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub seq: u64,
}

impl WireEvent {
    /// Encode a session event.
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized.
    pub fn from_event(event: &SessionEvent) -> Result<Self, serde_json::Error> {
        let Value::Object(mut tagged) = serde_json::to_value(&event.kind)? else {
            return Err(serde::ser::Error::custom("event kind is not an object"));
        };
        Ok(Self {
            kind: event.kind.tag().to_string(),
            payload: tagged.remove("payload").unwrap_or(Value::Null),
            timestamp: event.timestamp,
            seq: event.seq,
        })
    }

    /// Whether this version knows the record's type.
    #[must_use]
    pub fn is_known(&self) -> bool {
        KNOWN_TYPES.contains(&self.kind.as_str())
    }

    /// Decode back into a session event.
    ///
    /// Returns `Ok(None)` for types this version does not know.
    ///
    /// # Errors
    /// Returns error if a known type carries a malformed payload.
    pub fn into_event(self) -> Result<Option<SessionEvent>, serde_json::Error> {
        if !self.is_known() {
            return Ok(None);
        }
        let kind: EventKind = serde_json::from_value(json!({
            "type": self.kind,
            "payload": self.payload,
        }))?;
        Ok(Some(SessionEvent {
            seq: self.seq,
            timestamp: self.timestamp,
            kind,
        }))
    }
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub prompt: String,
}

/// Response of `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: SessionId,
}

/// Query of `GET /sessions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Error body returned by the HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use sandbox_agent_core::{ErrorKind, ToolInvocation};

    use super::*;

    fn event(kind: EventKind) -> SessionEvent {
        SessionEvent {
            seq: 3,
            timestamp: 1_700_000_000_000,
            kind,
        }
    }

    #[test]
    fn record_has_flat_type_and_payload() {
        let wire = WireEvent::from_event(&event(EventKind::ToolCall(ToolInvocation::new(
            "call_1",
            "run_code",
            json!({"code": "print(1)"}),
        ))))
        .unwrap();

        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["type"], "toolCall");
        assert_eq!(value["payload"]["invocationId"], "call_1");
        assert_eq!(value["payload"]["arguments"]["code"], "print(1)");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["seq"], 3);
    }

    #[test]
    fn known_record_decodes() {
        let original = event(EventKind::Error {
            kind: ErrorKind::FatalSession,
            message: "retry budget exhausted".into(),
        });
        let decoded = WireEvent::from_event(&original).unwrap().into_event().unwrap();
        assert_eq!(decoded, Some(original));
    }

    #[test]
    fn unknown_type_is_skipped() {
        let wire: WireEvent = serde_json::from_str(
            r#"{"type":"progress","payload":{"percent":40},"timestamp":1}"#,
        )
        .unwrap();
        assert!(!wire.is_known());
        assert_eq!(wire.into_event().unwrap(), None);
    }

    #[test]
    fn malformed_known_payload_is_an_error() {
        let wire: WireEvent =
            serde_json::from_str(r#"{"type":"thinking","payload":{"txt":1},"timestamp":1}"#).unwrap();
        tokio_test::assert_err!(wire.into_event());
    }

    #[test]
    fn start_response_is_camel_case() {
        let id = uuid::Uuid::new_v4();
        let json = serde_json::to_value(StartSessionResponse { session_id: id }).unwrap();
        assert_eq!(json["sessionId"], id.to_string());
    }
}
