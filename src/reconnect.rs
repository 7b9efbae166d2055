//! The reconnect controller: backoff/retry-forever policy, decoupled from
//! session-state bookkeeping.
//!
//! [`crate::session::JsonRpcClient`] supplies the single-attempt closure
//! (acquire the session lock, (re)connect the transport, run the resume
//! protocol); this module only owns the *loop* — delay-then-attempt,
//! zero delay on the first attempt, unbounded retry only when configured.
//! Because each attempt acquires and releases the session lock itself
//! (see `session.rs::try_reconnect_once`), at most one reconnect attempt is
//! ever in flight and the sleep between attempts never holds the lock.

use std::future::Future;
use tokio::time::Duration;

use crate::error::JsonRpcClientError;

/// An attempt's failure, distinguishing ordinary transient failures (subject
/// to `try_forever`) from failures that must end the loop immediately no
/// matter the retry policy — namely the user calling `close()` while a
/// reconnect is in flight, which turns it into a user-initiated close.
pub enum AttemptError {
    Transient(JsonRpcClientError),
    Abort(JsonRpcClientError),
}

/// Outcome of driving the reconnect loop to completion.
pub enum ReconnectDecision {
    /// A subsequent attempt succeeded.
    Reconnected { same_server: bool },
    /// `try_forever` was false and the first attempt failed, or the attempt
    /// reported an abort (e.g. a concurrent user-initiated close).
    GaveUp { last_error: JsonRpcClientError },
}

/// Drives the reconnect loop: retry with backoff, or give up.
pub struct ReconnectController;

impl ReconnectController {
    /// Run `attempt` (a single connect-and-resume try) until it succeeds,
    /// aborts, or — with `try_forever = false` — the first failure. On a
    /// transient failure with `try_forever = true`, sleeps `delay` and
    /// retries indefinitely.
    pub async fn run<F, Fut>(try_forever: bool, delay: Duration, mut attempt: F) -> ReconnectDecision
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, AttemptError>>,
    {
        // Zero delay on the first attempt.
        let mut wait = Duration::ZERO;
        loop {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            match attempt().await {
                Ok(same_server) => return ReconnectDecision::Reconnected { same_server },
                Err(AttemptError::Abort(last_error)) => {
                    return ReconnectDecision::GaveUp { last_error };
                }
                Err(AttemptError::Transient(last_error)) => {
                    tracing::debug!(error = %last_error, "reconnect attempt failed");
                    if !try_forever {
                        return ReconnectDecision::GaveUp { last_error };
                    }
                    wait = delay;
                }
            }
        }
    }
}
