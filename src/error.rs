use std::fmt;

use crate::rpc::RequestId;

/// Errors produced by the JSON-RPC client.
///
/// A flat enum with a hand-written `Display` impl rather than a `thiserror`
/// derive.
#[derive(Debug, Clone)]
pub enum JsonRpcClientError {
    /// A send was attempted after the user explicitly called `close()`.
    /// Non-recoverable; the client instance must be replaced.
    ClientClosed,

    /// The transport connect attempt exceeded `connection_timeout_ms`.
    TransportTimeout,

    /// No response arrived within `request_timeout_ms`.
    RequestTimeout { method: String },

    /// The server returned a JSON-RPC `error` payload.
    JsonRpcError { code: i64, message: String },

    /// Inbound text was not valid JSON, or not a classifiable JSON-RPC
    /// frame. Logged and dropped; never surfaced to a waiting caller.
    ProtocolFraming(String),

    /// The session lock could not be acquired within
    /// `connection_lock_timeout_ms`. Treated as a fatal stuck state: the
    /// client tears itself down.
    LockTimeout,

    /// An awaiting caller was interrupted (its oneshot sender was dropped)
    /// while waiting on a response.
    InterruptedWait,

    /// `PendingRequests::reserve` was called twice for the same id while
    /// the first reservation was still outstanding.
    DuplicateRequestId(RequestId),

    /// A transport-level I/O error (connect failure, write failure).
    Transport(String),
}

impl fmt::Display for JsonRpcClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client is closed"),
            Self::TransportTimeout => write!(f, "transport connect timed out"),
            Self::RequestTimeout { method } => write!(f, "request timed out: {method}"),
            Self::JsonRpcError { code, message } => {
                write!(f, "server error {code}: {message}")
            }
            Self::ProtocolFraming(msg) => write!(f, "malformed JSON-RPC frame: {msg}"),
            Self::LockTimeout => write!(f, "timed out acquiring the session lock"),
            Self::InterruptedWait => write!(f, "interrupted while awaiting a response"),
            Self::DuplicateRequestId(id) => write!(f, "request id already reserved: {id}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for JsonRpcClientError {}
