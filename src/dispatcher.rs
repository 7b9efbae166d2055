//! The server-initiated-request dispatcher.
//!
//! Routes inbound server requests either to a freshly spawned task or
//! inline on the caller's context, per
//! [`crate::config::ClientConfig::concurrent_server_request`]. The
//! concurrent path exists so that a handler issuing a *synchronous*
//! outbound request to the server can still have its reply frame received
//! on the transport receive context — running it inline would deadlock the
//! transport task waiting on a response it is itself responsible for
//! reading.

use std::sync::Arc;

use crate::responder::ResponseSender;
use crate::rpc::IncomingRequest;

/// Application-level sink for server-initiated requests and connection
/// lifecycle notifications. Only `handle_request` may produce output, via
/// the passed [`ResponseSender`].
#[async_trait::async_trait]
pub trait HandlerManager: Send + Sync + 'static {
    async fn after_connection_established(&self, session_id: Option<String>) {
        let _ = session_id;
    }

    async fn after_connection_closed(&self, session_id: Option<String>, reason: String) {
        let _ = (session_id, reason);
    }

    async fn handle_request(&self, request: IncomingRequest, responder: ResponseSender) {
        let _ = (request, responder);
    }
}

/// A [`HandlerManager`] that ignores everything. The default when the
/// caller registers no application-level handler.
pub struct NoopHandlerManager;

#[async_trait::async_trait]
impl HandlerManager for NoopHandlerManager {}

/// Dispatches inbound server requests to a [`HandlerManager`], either
/// concurrently or inline per `concurrent_server_request`.
#[derive(Clone)]
pub struct ServerRequestDispatcher {
    handler: Arc<dyn HandlerManager>,
    concurrent: bool,
}

impl ServerRequestDispatcher {
    #[must_use]
    pub fn new(handler: Arc<dyn HandlerManager>, concurrent: bool) -> Self {
        Self { handler, concurrent }
    }

    /// Dispatch `request` to the handler. If `concurrent` is true, the
    /// handler runs on a spawned task; otherwise it runs inline and this
    /// call does not return until the handler completes.
    pub async fn dispatch(&self, request: IncomingRequest, responder: ResponseSender) {
        if self.concurrent {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                handler.handle_request(request, responder).await;
            });
        } else {
            self.handler.handle_request(request, responder).await;
        }
    }
}
