//! CDP Protocol Types and wire codec
//!
//! These are the fundamental types for CDP communication.
//! Keep them minimal - domain-specific shapes live in `domains`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request ID - monotonically increasing per connection
pub type RequestId = u64;

/// Target ID from Chrome
pub type TargetId = String;

/// Session ID for attached targets
pub type SessionId = String;

/// Browser context ID from Chrome
pub type BrowserContextId = String;

/// CDP Request sent to browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CDPRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorPayload {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Successful CDP response
#[derive(Debug, Clone, PartialEq)]
pub struct CDPResponse {
    pub id: RequestId,
    pub session_id: Option<SessionId>,
    pub result: Value,
}

/// CDP Event from browser (no request ID)
#[derive(Debug, Clone, PartialEq)]
pub struct CDPEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<SessionId>,
}

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum CDPMessage {
    Response(CDPResponse),
    ResponseError {
        id: RequestId,
        session_id: Option<SessionId>,
        error: ErrorPayload,
    },
    Event(CDPEvent),
    Malformed { raw: String, reason: String },
}

/// Loose view of an envelope. Unknown keys are ignored so newer protocol
/// revisions still decode.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<SessionId>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorPayload>,
}

/// Serialize a command for the wire.
pub fn encode_command(request: &CDPRequest) -> serde_json::Result<String> {
    serde_json::to_string(request)
}

/// Parse an inbound frame. Never fails: anything unusable comes back as
/// `CDPMessage::Malformed` with the raw text kept for diagnostics.
pub fn decode(raw: &str) -> CDPMessage {
    let malformed = |reason: String| CDPMessage::Malformed {
        raw: raw.to_string(),
        reason,
    };

    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => return malformed(e.to_string()),
    };

    match (envelope.id, envelope.method) {
        (Some(_), Some(method)) => malformed(format!("message has both id and method ({method})")),
        (Some(id), None) => match (envelope.result, envelope.error) {
            (Some(_), Some(_)) => malformed(format!("response {id} has both result and error")),
            (_, Some(error)) => CDPMessage::ResponseError {
                id,
                session_id: envelope.session_id,
                error,
            },
            (result, None) => CDPMessage::Response(CDPResponse {
                id,
                session_id: envelope.session_id,
                result: result.unwrap_or(Value::Null),
            }),
        },
        (None, Some(method)) => CDPMessage::Event(CDPEvent {
            method,
            params: envelope.params.unwrap_or(Value::Null),
            session_id: envelope.session_id,
        }),
        (None, None) => malformed("message has neither id nor method".to_string()),
    }
}

/// Serialize an inbound-shaped message. Used by the in-memory peer and
/// anything that needs to replay captured traffic.
pub fn encode_message(message: &CDPMessage) -> String {
    let mut object = Map::new();
    let session_id = match message {
        CDPMessage::Response(response) => {
            object.insert("id".into(), response.id.into());
            object.insert("result".into(), response.result.clone());
            &response.session_id
        }
        CDPMessage::ResponseError {
            id,
            session_id,
            error,
        } => {
            object.insert("id".into(), (*id).into());
            object.insert(
                "error".into(),
                serde_json::to_value(error).unwrap_or(Value::Null),
            );
            session_id
        }
        CDPMessage::Event(event) => {
            object.insert("method".into(), event.method.clone().into());
            object.insert("params".into(), event.params.clone());
            &event.session_id
        }
        CDPMessage::Malformed { raw, .. } => return raw.clone(),
    };
    if let Some(session_id) = session_id {
        object.insert("sessionId".into(), session_id.clone().into());
    }
    Value::Object(object).to_string()
}
