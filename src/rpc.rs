//! JSON-RPC 2.0 wire types.
//!
//! This module is the minimal concrete codec the session coordinator needs:
//! outbound requests/notifications, inbound responses, and the
//! classification of an inbound frame into "response" vs.
//! "server-initiated request".

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation key for an outbound request. Assumed unique while in flight.
pub type RequestId = u64;

/// Reserved method used to establish or resume a session.
pub const METHOD_CONNECT: &str = "connect";
/// Reserved method used for a best-effort graceful close notice.
pub const METHOD_CLOSE_SESSION: &str = "closeSession";
/// Reserved method used for heartbeat pings.
pub const METHOD_PING: &str = "ping";

/// Server error code meaning "invalid/expired session" during resumption.
pub const SESSION_INVALID_CODE: i64 = 40007;

/// Outbound request or notification (client → server).
///
/// A `None` `id` marks a notification: no response is expected and no
/// pending slot is allocated for it.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl RpcRequest {
    #[must_use]
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
            session_id: None,
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Server-level error payload (`error` member of a JSON-RPC response).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Raw incoming frame before classification. Every inbound text message is
/// deserialized into this type first, then classified via
/// [`RawIncoming::classify`].
#[derive(Debug, Deserialize)]
pub struct RawIncoming {
    /// Present for responses; absent for server-initiated requests/notifications.
    pub id: Option<RequestId>,
    /// Present for requests (and, non-standard, carried on some responses).
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<RpcErrorObject>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// A parsed response to a previously sent request.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub id: RequestId,
    pub result: Result<Value, RpcErrorObject>,
    pub session_id: Option<String>,
}

/// A parsed server-initiated request (has `method`; `id` is `Some` when the
/// server expects a reply, `None` when it is itself a notification).
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Classification of a raw inbound frame.
pub enum IncomingKind {
    Response(RpcResponse),
    Request(IncomingRequest),
}

impl RawIncoming {
    /// Classify this frame as a response or a server-initiated request.
    ///
    /// A frame carrying `method` is always treated as a server-initiated
    /// request, even if it also carries an `id` — the `id` is then the
    /// server's own correlation id for its request, which the reply (sent
    /// via [`crate::responder::ResponseSender`]) must echo. Returns `None`
    /// if the frame is unclassifiable (neither `id` nor `method` present).
    #[must_use]
    pub fn classify(self) -> Option<IncomingKind> {
        if let Some(method) = self.method {
            return Some(IncomingKind::Request(IncomingRequest {
                id: self.id,
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            }));
        }
        let id = self.id?;
        let result = match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        };
        Some(IncomingKind::Response(RpcResponse {
            id,
            result,
            session_id: self.session_id,
        }))
    }
}

/// Outbound reply to a server-initiated request, sent through
/// [`crate::responder::ResponseSender`].
#[derive(Debug, Clone, Serialize)]
pub struct RpcReply {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcReply {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: RequestId, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_without_id_is_notification() {
        let req = RpcRequest::new(None, "ping", None);
        assert!(req.is_notification());
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("id").is_none() || value["id"].is_null());
    }

    #[test]
    fn request_serializes_session_id_when_present() {
        let req = RpcRequest::new(Some(1), "connect", None).with_session_id(Some("S".into()));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["sessionId"], "S");
    }

    #[test]
    fn request_id_round_trips() {
        let req = RpcRequest::new(Some(42), "foo", Some(json!({"x": 1})));
        let text = serde_json::to_string(&req).unwrap();
        let raw: RawIncoming = serde_json::from_str(&text).unwrap();
        assert_eq!(raw.id, Some(42));
    }

    #[test]
    fn classify_success_response() {
        let raw: RawIncoming =
            serde_json::from_str(r#"{"id":1,"result":{"value":2},"sessionId":"S"}"#).unwrap();
        match raw.classify() {
            Some(IncomingKind::Response(resp)) => {
                assert_eq!(resp.id, 1);
                assert_eq!(resp.result.unwrap()["value"], 2);
                assert_eq!(resp.session_id.as_deref(), Some("S"));
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn classify_error_response_40007() {
        let raw: RawIncoming =
            serde_json::from_str(r#"{"id":1,"error":{"code":40007,"message":"invalid session"}}"#)
                .unwrap();
        match raw.classify() {
            Some(IncomingKind::Response(resp)) => {
                let err = resp.result.unwrap_err();
                assert_eq!(err.code, SESSION_INVALID_CODE);
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn classify_server_request() {
        let raw: RawIncoming =
            serde_json::from_str(r#"{"id":5,"method":"Target.closed","params":{}}"#).unwrap();
        match raw.classify() {
            Some(IncomingKind::Request(req)) => {
                assert_eq!(req.id, Some(5));
                assert_eq!(req.method, "Target.closed");
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn classify_notification_from_server() {
        let raw: RawIncoming = serde_json::from_str(r#"{"method":"ping"}"#).unwrap();
        match raw.classify() {
            Some(IncomingKind::Request(req)) => assert_eq!(req.id, None),
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn classify_unclassifiable_is_none() {
        let raw: RawIncoming = serde_json::from_str(r"{}").unwrap();
        assert!(raw.classify().is_none());
    }

    #[test]
    fn reply_round_trips_id() {
        let reply = RpcReply::success(7, json!({"ok": true}));
        let text = serde_json::to_string(&reply).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["result"]["ok"], true);
    }
}
