//! Writes outbound replies to server-initiated requests through the
//! transport.

use std::sync::Arc;

use crate::error::JsonRpcClientError;
use crate::rpc::{METHOD_PING, RpcReply};
use crate::transport::Transport;

/// Writes replies to server-initiated requests. `send_response` and
/// `send_ping_response` differ only in log verbosity — pings can dominate
/// logs and must be suppressible without losing normal-traffic visibility.
#[derive(Clone)]
pub struct ResponseSender {
    transport: Arc<dyn Transport>,
}

impl ResponseSender {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a reply to a non-ping server-initiated request.
    ///
    /// # Errors
    ///
    /// Returns the underlying transport error if the write fails.
    pub async fn send_response(&self, reply: &RpcReply) -> Result<(), JsonRpcClientError> {
        let text = serde_json::to_string(reply)
            .map_err(|e| JsonRpcClientError::ProtocolFraming(e.to_string()))?;
        tracing::debug!(id = reply.id, "sending response");
        self.transport.send_text(text).await
    }

    /// Send a reply to a `ping` server-initiated request, logged at
    /// `trace` rather than `debug` since heartbeat traffic would otherwise
    /// dominate normal-traffic logs.
    ///
    /// # Errors
    ///
    /// Returns the underlying transport error if the write fails.
    pub async fn send_ping_response(&self, reply: &RpcReply) -> Result<(), JsonRpcClientError> {
        let text = serde_json::to_string(reply)
            .map_err(|e| JsonRpcClientError::ProtocolFraming(e.to_string()))?;
        tracing::trace!(id = reply.id, method = METHOD_PING, "sending ping response");
        self.transport.send_text(text).await
    }
}
