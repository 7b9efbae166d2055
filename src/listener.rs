//! The connection-lifecycle listener notifier (C3).
//!
//! Wraps an optional [`ConnectionListener`] and posts every firing to a
//! freshly spawned `tokio` task so the caller — typically the transport
//! receive context or the session lock holder — never blocks on user code.
//! One dispatch function parameterized by an event keeps every call site
//! from having to write its own one-off spawned closure.

use std::sync::Arc;

/// The six connection-lifecycle events a [`ConnectionListener`] may observe.
///
/// `ConnectionFailed` and `Disconnected` are mutually exclusive for a given
/// lifecycle termination: which one fires is chosen by whether the client
/// was ever connected, or the user initiated the close, at the time of
/// termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Reconnecting,
    Reconnected { same_server: bool },
    ConnectionFailed,
    Disconnected,
}

/// User-supplied sink for connection-lifecycle events.
///
/// All methods have no-op default bodies so implementors only override the
/// events they care about. Implementations must tolerate reentrancy: an
/// event handler may call back into the client.
pub trait ConnectionListener: Send + Sync + 'static {
    fn on_connected(&self) {}
    fn on_reconnecting(&self) {}
    fn on_reconnected(&self, _same_server: bool) {}
    fn on_connection_failed(&self) {}
    fn on_disconnected(&self) {}
}

/// Posts [`ConnectionEvent`]s to an optional listener on a freshly spawned
/// task per event.
#[derive(Clone, Default)]
pub struct ListenerNotifier {
    listener: Option<Arc<dyn ConnectionListener>>,
}

impl ListenerNotifier {
    #[must_use]
    pub fn new(listener: Option<Arc<dyn ConnectionListener>>) -> Self {
        Self { listener }
    }

    /// Fire `event`. A no-op — no task is spawned — if no listener is
    /// registered.
    pub fn fire(&self, event: ConnectionEvent) {
        let Some(listener) = self.listener.clone() else {
            return;
        };
        tokio::spawn(async move {
            match event {
                ConnectionEvent::Connected => listener.on_connected(),
                ConnectionEvent::Reconnecting => listener.on_reconnecting(),
                ConnectionEvent::Reconnected { same_server } => {
                    listener.on_reconnected(same_server);
                }
                ConnectionEvent::ConnectionFailed => listener.on_connection_failed(),
                ConnectionEvent::Disconnected => listener.on_disconnected(),
            }
        });
    }
}
