//! The pending-request registry.
//!
//! Tracks outstanding request ids with awaitable slots, as its own
//! shareable type independent of the transport (see `transport.rs`) and the
//! session coordinator (see `session.rs`).

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::JsonRpcClientError;
use crate::rpc::{RequestId, RpcResponse};

/// Outcome delivered to a waiter: either the matching response, or a
/// terminal error. Timeouts are enforced by the waiter itself, not by this
/// registry.
pub type PendingOutcome = Result<RpcResponse, JsonRpcClientError>;

/// A reserved slot for an in-flight request, returned by
/// [`PendingRequests::reserve`].
pub struct PendingSlot {
    pub id: RequestId,
    receiver: oneshot::Receiver<PendingOutcome>,
}

impl PendingSlot {
    /// Await the response, or surface [`JsonRpcClientError::InterruptedWait`]
    /// if the registry dropped the sender without completing it (this should
    /// only happen as a defensive fallback; normal teardown always completes
    /// every slot via [`PendingRequests::close_all`]).
    pub async fn wait(self) -> PendingOutcome {
        self.receiver
            .await
            .unwrap_or(Err(JsonRpcClientError::InterruptedWait))
    }
}

/// Registry of outstanding request ids with awaitable slots.
///
/// `reserve`/`complete`/`close_all` are safe to call from any task; the map
/// preserves no ordering between concurrent requests.
#[derive(Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<RequestId, oneshot::Sender<PendingOutcome>>>,
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for `id`. Fails if `id` is already reserved.
    ///
    /// # Errors
    ///
    /// Returns [`JsonRpcClientError::DuplicateRequestId`] if a slot for this
    /// id is already outstanding.
    pub fn reserve(&self, id: RequestId) -> Result<PendingSlot, JsonRpcClientError> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slots.contains_key(&id) {
            return Err(JsonRpcClientError::DuplicateRequestId(id));
        }
        slots.insert(id, tx);
        Ok(PendingSlot { id, receiver: rx })
    }

    /// Fulfill the awaitable for `response.id`, if still reserved. A
    /// response whose id matches no reservation is dropped; we only log at
    /// debug.
    pub fn complete(&self, response: RpcResponse) {
        let sender = {
            let mut slots = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.remove(&response.id)
        };
        match sender {
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => {
                tracing::debug!(id = response.id, "response matched no pending request");
            }
        }
    }

    /// Fulfill every outstanding slot with a terminal error and clear the
    /// map. Idempotent.
    pub fn close_all(&self, reason: JsonRpcClientError) {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.clone()));
        }
    }

    /// Number of currently outstanding reservations. Exposed for tests and
    /// for an optional caller-driven GC sweep; not part of the contract.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
