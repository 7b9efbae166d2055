//! The session coordinator: the public [`JsonRpcClient`] type, its
//! connection-lifecycle state machine, and the receive-side dispatch that
//! classifies every inbound frame and routes it to the pending registry or
//! the server-request dispatcher.
//!
//! A small struct of shared, independently-lockable state behind an `Arc`,
//! cloned cheaply for every caller and every spawned task, with a single
//! `tokio::sync::Mutex` serializing the state transitions that must not
//! interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::dispatcher::{HandlerManager, NoopHandlerManager, ServerRequestDispatcher};
use crate::error::JsonRpcClientError;
use crate::heartbeat::HeartbeatHandle;
use crate::listener::{ConnectionEvent, ConnectionListener, ListenerNotifier};
use crate::pending::PendingRequests;
use crate::reconnect::{AttemptError, ReconnectController, ReconnectDecision};
use crate::responder::ResponseSender;
use crate::rpc::{IncomingKind, METHOD_CLOSE_SESSION, METHOD_CONNECT, METHOD_PING, RawIncoming, RequestId, RpcResponse};
use crate::transport::{Transport, TransportSink, WebSocketTransport};

/// The client's connection-lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// State guarded by the session lock: everything a connect, reconnect, or
/// close sequence reads or mutates as one unit.
struct Session {
    state: SessionState,
    session_id: Option<String>,
    closed_by_user: bool,
    /// Set once the client reaches `Connected` for the first time; used to
    /// choose between `connectionFailed` and `disconnected` on teardown.
    /// `Reconnecting` is only reachable from `Connected`, so this is always
    /// true by the time a reconnect gives up.
    ever_connected: bool,
    /// Whether an external heartbeat subsystem currently believes it should
    /// be sending pings.
    heartbeating: bool,
    heartbeat_handle: Option<Arc<dyn HeartbeatHandle>>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            closed_by_user: false,
            ever_connected: false,
            heartbeating: false,
            heartbeat_handle: None,
        }
    }

    /// Enable or disable heartbeating, invoking the registered
    /// [`HeartbeatHandle`] hook only on an actual state change: enabled on
    /// connect/reconnect success, disabled on reconnect-start and teardown.
    fn apply_heartbeat(&mut self, enabled: bool) {
        if self.heartbeating == enabled {
            return;
        }
        self.heartbeating = enabled;
        if let Some(handle) = &self.heartbeat_handle {
            if enabled {
                handle.enable();
            } else {
                handle.disable();
            }
        }
    }
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    pending: PendingRequests,
    listener: ListenerNotifier,
    dispatcher: ServerRequestDispatcher,
    handler: Arc<dyn HandlerManager>,
    session: Mutex<Session>,
    state_changed: Notify,
    next_id: AtomicU64,
    /// Ensures only one caller ever runs `close_client`'s teardown body.
    /// A swap rather than a second lock, since teardown must proceed even
    /// if the session lock is itself the reason a caller could not make
    /// progress.
    closing: AtomicBool,
}

/// Delivers `sink` callbacks to a cloned [`JsonRpcClient`] on a spawned
/// task, so the transport's own read loop never runs coordinator logic
/// directly.
struct SinkHandle(JsonRpcClient);

impl TransportSink for SinkHandle {
    fn on_text_message(&self, text: String) {
        let client = self.0.clone();
        tokio::spawn(async move { client.dispatch_text_message(text).await });
    }

    fn on_unsolicited_disconnect(&self, reason: String) {
        let client = self.0.clone();
        tokio::spawn(async move { client.handle_unsolicited_disconnect(reason).await });
    }
}

/// A reconnecting JSON-RPC 2.0 client (C6's public type). Cheap to clone —
/// every clone shares the same underlying connection and state.
#[derive(Clone)]
pub struct JsonRpcClient {
    inner: Arc<ClientInner>,
}

impl JsonRpcClient {
    /// Build a client that will connect to `url` over `tokio-tungstenite`
    /// when [`JsonRpcClient::connect`] is called.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        config: ClientConfig,
        listener: Option<Arc<dyn ConnectionListener>>,
        handler: Option<Arc<dyn HandlerManager>>,
    ) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(url, config.connection_timeout));
        Self::with_transport(transport, config, listener, handler)
    }

    /// Build a client over a caller-supplied [`Transport`] — the seam tests
    /// (and alternative native channels) use in place of the default
    /// WebSocket implementation.
    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        listener: Option<Arc<dyn ConnectionListener>>,
        handler: Option<Arc<dyn HandlerManager>>,
    ) -> Self {
        let handler = handler.unwrap_or_else(|| Arc::new(NoopHandlerManager));
        let dispatcher = ServerRequestDispatcher::new(Arc::clone(&handler), config.concurrent_server_request);
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                pending: PendingRequests::new(),
                listener: ListenerNotifier::new(listener),
                dispatcher,
                handler,
                session: Mutex::new(Session::new()),
                state_changed: Notify::new(),
                next_id: AtomicU64::new(1),
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// The session id currently in effect, if the server has assigned one.
    pub async fn session_id(&self) -> Option<String> {
        self.inner.session.lock().await.session_id.clone()
    }

    /// Whether the client currently believes itself connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.session.lock().await.state == SessionState::Connected
    }

    /// Register (or clear) the external heartbeat subsystem's hook. The
    /// session coordinator calls [`HeartbeatHandle::enable`] and
    /// [`HeartbeatHandle::disable`] on connect/reconnect and on
    /// disconnect/teardown; scheduling the actual `ping` traffic is the
    /// subsystem's job, not this crate's.
    pub async fn set_heartbeat_handle(&self, handle: Option<Arc<dyn HeartbeatHandle>>) {
        self.inner.session.lock().await.heartbeat_handle = handle;
    }

    /// Establish the initial connection, moving from `Disconnected` to
    /// `Connecting`. Runs the `connect` resume-protocol handshake and fires
    /// `connected` on success.
    ///
    /// # Errors
    ///
    /// Returns the transport or protocol error on failure. If
    /// `retry_if_timeout_on_connect` is set, a connect-timeout is retried
    /// rather than surfaced.
    pub async fn connect(&self) -> Result<(), JsonRpcClientError> {
        loop {
            match self.attempt_initial_connect().await {
                Ok(()) => return Ok(()),
                Err(JsonRpcClientError::TransportTimeout) if self.inner.config.retry_if_timeout_on_connect => {
                    tracing::debug!("initial connect timed out; retrying per retry_if_timeout_on_connect");
                    tokio::time::sleep(self.inner.config.reconnect_delay).await;
                }
                Err(e) => {
                    self.close_client(e.clone(), false).await;
                    return Err(e);
                }
            }
        }
    }

    async fn attempt_initial_connect(&self) -> Result<(), JsonRpcClientError> {
        {
            let mut guard = self.inner.session.lock().await;
            guard.state = SessionState::Connecting;
        }
        let sink: Arc<dyn TransportSink> = Arc::new(SinkHandle(self.clone()));
        self.inner.transport.connect(sink).await?;

        let mut guard = self.inner.session.lock().await;
        self.run_connect_handshake(&mut guard, None).await?;
        guard.state = SessionState::Connected;
        guard.ever_connected = true;
        guard.apply_heartbeat(true);
        let session_id = guard.session_id.clone();
        drop(guard);
        self.inner.state_changed.notify_waiters();

        self.inner.handler.after_connection_established(session_id).await;
        self.inner.listener.fire(ConnectionEvent::Connected);
        Ok(())
    }

    /// Send the `connect` method carrying `prior_session_id` (`None` for a
    /// brand-new session), adopting whatever session id the server returns.
    /// Called while the session lock is already held by the caller.
    async fn run_connect_handshake(
        &self,
        guard: &mut Session,
        prior_session_id: Option<String>,
    ) -> Result<(), JsonRpcClientError> {
        let response = self.send_and_await(Some(self.next_id()), METHOD_CONNECT.to_string(), None, prior_session_id).await?;
        if let Err(err) = response.result {
            return Err(JsonRpcClientError::JsonRpcError { code: err.code, message: err.message });
        }
        if let Some(sid) = response.session_id {
            guard.session_id = Some(sid);
        }
        Ok(())
    }

    /// Issue a request and wait for its response, returning the server's
    /// `result`.
    ///
    /// # Errors
    ///
    /// Returns [`JsonRpcClientError::ClientClosed`] if the client is not
    /// connected and cannot become so within `connection_lock_timeout`, a
    /// transport error if the write fails, [`JsonRpcClientError::RequestTimeout`]
    /// if no response arrives within `request_timeout`, or
    /// [`JsonRpcClientError::JsonRpcError`] if the server replies with an
    /// error payload.
    pub async fn call(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value, JsonRpcClientError> {
        let method = method.into();
        self.connect_if_necessary().await?;
        let session_id = self.session_id().await;
        let id = self.next_id();
        let response = self.send_and_await(Some(id), method, params, session_id).await?;
        self.adopt_session_id(response.session_id.clone()).await;
        response.result.map_err(|e| JsonRpcClientError::JsonRpcError { code: e.code, message: e.message })
    }

    /// Send a notification (no response expected).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`JsonRpcClient::call`], minus
    /// [`JsonRpcClientError::JsonRpcError`] — there is no response to carry one.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), JsonRpcClientError> {
        self.connect_if_necessary().await?;
        let session_id = self.session_id().await;
        self.send_and_await(None, method.into(), params, session_id).await.map(|_| ())
    }

    /// Continuation-style variant of [`JsonRpcClient::call`]: spawns the
    /// request and invokes `on_complete` with its outcome on a worker-pool
    /// task, never on the caller's context. Expressed in terms of the
    /// blocking `call` rather than duplicating its logic.
    pub fn call_with<F>(&self, method: impl Into<String>, params: Option<Value>, on_complete: F)
    where
        F: FnOnce(Result<Value, JsonRpcClientError>) + Send + 'static,
    {
        let client = self.clone();
        let method = method.into();
        tokio::spawn(async move {
            let result = client.call(method, params).await;
            on_complete(result);
        });
    }

    /// User-initiated close. Idempotent. Best-effort notifies the server
    /// with `closeSession` if `send_close_message` is set, marks the close
    /// as user-initiated so an in-flight reconnect gives up instead of
    /// retrying, then tears down.
    pub async fn close(&self) -> Result<(), JsonRpcClientError> {
        {
            let mut guard = self.inner.session.lock().await;
            guard.closed_by_user = true;
        }
        if self.inner.config.send_close_message {
            let session_id = self.session_id().await;
            if let Err(e) = self.send_and_await(None, METHOD_CLOSE_SESSION.to_string(), None, session_id).await {
                tracing::warn!(error = %e, "best-effort closeSession notice failed");
            }
        }
        self.close_client(JsonRpcClientError::ClientClosed, false).await;
        Ok(())
    }

    /// Close the native transport and drive the same reconnect path as an
    /// unsolicited disconnect — used by a heartbeat subsystem reacting to a
    /// ping timeout.
    pub async fn close_with_reconnection(&self, reason: impl Into<String>) {
        self.inner.transport.close().await;
        self.handle_unsolicited_disconnect(reason.into()).await;
    }

    // ---- C8: receive-side dispatch -----------------------------------

    async fn dispatch_text_message(&self, text: String) {
        let raw: RawIncoming = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse inbound frame");
                return;
            }
        };
        match raw.classify() {
            Some(IncomingKind::Response(response)) => {
                // Complete the pending slot before touching the session
                // lock: the connect/resume handshake holds that lock across
                // its own await on this very slot, so acquiring it here
                // first would deadlock against that in-flight handshake.
                let session_id = response.session_id.clone();
                self.inner.pending.complete(response);
                self.adopt_session_id(session_id).await;
            }
            Some(IncomingKind::Request(request)) => {
                let responder = ResponseSender::new(Arc::clone(&self.inner.transport));
                if request.method == METHOD_PING {
                    tracing::trace!("received ping");
                }
                self.inner.dispatcher.dispatch(request, responder).await;
            }
            None => {
                tracing::error!(text = %text, "unclassifiable JSON-RPC frame");
            }
        }
    }

    // ---- reconnection (C5 glue) ---------------------------------------

    async fn handle_unsolicited_disconnect(&self, reason: String) {
        {
            let mut guard = self.inner.session.lock().await;
            if guard.state == SessionState::Closed {
                return;
            }
            guard.state = SessionState::Reconnecting;
            guard.apply_heartbeat(false);
        }
        self.inner.state_changed.notify_waiters();
        self.inner.listener.fire(ConnectionEvent::Reconnecting);
        tracing::debug!(reason = %reason, "transport disconnected; reconnecting");

        let client = self.clone();
        let decision = ReconnectController::run(
            self.inner.config.try_reconnecting_forever,
            self.inner.config.reconnect_delay,
            || {
                let client = client.clone();
                async move {
                    match client.try_reconnect_once().await {
                        Ok(same_server) => Ok(same_server),
                        Err(e @ JsonRpcClientError::ClientClosed) => Err(AttemptError::Abort(e)),
                        Err(e) => Err(AttemptError::Transient(e)),
                    }
                }
            },
        )
        .await;

        match decision {
            ReconnectDecision::Reconnected { same_server } => {
                self.inner.state_changed.notify_waiters();
                self.inner.listener.fire(ConnectionEvent::Reconnected { same_server });
            }
            ReconnectDecision::GaveUp { last_error } => {
                if { self.inner.session.lock().await.closed_by_user } {
                    self.close_client(JsonRpcClientError::ClientClosed, false).await;
                } else {
                    self.inner.listener.fire(ConnectionEvent::Disconnected);
                    self.close_client(last_error, true).await;
                }
            }
        }
    }

    /// One reconnect attempt: reconnect the transport, then resume the
    /// session (same-session `connect`, falling back to a fresh session on
    /// `40007`). Returns `Ok(true)` if the prior session was resumed,
    /// `Ok(false)` if the server forced a new one.
    async fn try_reconnect_once(&self) -> Result<bool, JsonRpcClientError> {
        let mut guard = self.inner.session.lock().await;
        if guard.closed_by_user {
            return Err(JsonRpcClientError::ClientClosed);
        }
        let sink: Arc<dyn TransportSink> = Arc::new(SinkHandle(self.clone()));
        self.inner.transport.connect(sink).await?;

        let prior_session_id = guard.session_id.clone();
        match self.run_connect_handshake(&mut guard, prior_session_id.clone()).await {
            Ok(()) => {
                guard.state = SessionState::Connected;
                guard.apply_heartbeat(true);
                self.inner.handler.after_connection_established(guard.session_id.clone()).await;
                Ok(true)
            }
            Err(JsonRpcClientError::JsonRpcError { code, .. }) if code == crate::rpc::SESSION_INVALID_CODE => {
                tracing::debug!("session id rejected by server; negotiating a fresh session");
                self.inner.pending.close_all(JsonRpcClientError::ClientClosed);
                guard.session_id = None;
                self.run_connect_handshake(&mut guard, None).await?;
                guard.state = SessionState::Connected;
                guard.apply_heartbeat(true);
                self.inner.handler.after_connection_established(guard.session_id.clone()).await;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // ---- shared helpers -------------------------------------------------

    fn next_id(&self) -> RequestId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn adopt_session_id(&self, session_id: Option<String>) {
        let Some(sid) = session_id else { return };
        let mut guard = self.inner.session.lock().await;
        if guard.session_id.is_none() {
            guard.session_id = Some(sid);
        }
    }

    /// Serialize, reserve a pending slot (if `id` is present), send, and
    /// await the response bounded by `request_timeout`. Does not touch the
    /// session lock — callers that already hold it (the connect/resume
    /// handshake) call this directly; callers that don't (`call`/`notify`)
    /// acquire it separately, only to adopt a returned session id.
    async fn send_and_await(
        &self,
        id: Option<RequestId>,
        method: String,
        params: Option<Value>,
        session_id: Option<String>,
    ) -> Result<RpcResponse, JsonRpcClientError> {
        let request = crate::rpc::RpcRequest::new(id, method.clone(), params).with_session_id(session_id);
        let slot = match id {
            Some(id) => Some(self.inner.pending.reserve(id)?),
            None => None,
        };
        let text = serde_json::to_string(&request).map_err(|e| JsonRpcClientError::ProtocolFraming(e.to_string()))?;
        if method == METHOD_PING {
            tracing::trace!(method = %method, "sending request");
        } else {
            tracing::debug!(method = %method, "sending request");
        }
        self.inner.transport.send_text(text).await?;

        let Some(slot) = slot else {
            return Ok(RpcResponse { id: 0, result: Ok(Value::Null), session_id: None });
        };
        match tokio::time::timeout(self.inner.config.request_timeout, slot.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(JsonRpcClientError::RequestTimeout { method }),
        }
    }

    /// Wait until the client is connected, bounded by `connection_lock_timeout`.
    /// Returns immediately if already connected; fails fast if closed.
    async fn connect_if_necessary(&self) -> Result<(), JsonRpcClientError> {
        let deadline = Instant::now() + self.inner.config.connection_lock_timeout;
        loop {
            let notified = self.inner.state_changed.notified();
            {
                let guard = self.inner.session.lock().await;
                match guard.state {
                    SessionState::Connected => return Ok(()),
                    SessionState::Closed => return Err(JsonRpcClientError::ClientClosed),
                    _ => {}
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                self.close_client(JsonRpcClientError::LockTimeout, false).await;
                return Err(JsonRpcClientError::LockTimeout);
            }
        }
    }

    /// Tear down the client. `closing` ensures only one caller runs this
    /// body. `suppress_event` is set by the reconnect-give-up path, which
    /// already fired its own lifecycle event and only needs the teardown
    /// side effects here.
    async fn close_client(&self, reason: JsonRpcClientError, suppress_event: bool) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        let (fire_disconnected, session_id) = {
            let mut guard = self.inner.session.lock().await;
            let fire_disconnected = guard.closed_by_user || guard.ever_connected;
            let session_id = guard.session_id.clone();
            guard.state = SessionState::Closed;
            guard.apply_heartbeat(false);
            (fire_disconnected, session_id)
        };
        self.inner.state_changed.notify_waiters();

        if !suppress_event {
            if fire_disconnected {
                self.inner.listener.fire(ConnectionEvent::Disconnected);
            } else {
                self.inner.listener.fire(ConnectionEvent::ConnectionFailed);
            }
        }

        self.inner.handler.after_connection_closed(session_id, reason.to_string()).await;
        self.inner.transport.close().await;
        self.inner.pending.close_all(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ConnectionListener;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    /// An in-memory [`Transport`] double driving a scripted server side, for
    /// exercising the session coordinator without a real socket.
    struct ScriptedTransport {
        outbound: mpsc::UnboundedSender<String>,
        // Kept alive so `outbound.send` doesn't fail; the scripted tests
        // below don't need to inspect what was sent.
        _outbound_rx: mpsc::UnboundedReceiver<String>,
        connected: AtomicBool,
        fail_connect: AtomicBool,
    }

    impl ScriptedTransport {
        fn new() -> Arc<Self> {
            let (tx, rx) = mpsc::unbounded_channel();
            Arc::new(Self {
                outbound: tx,
                _outbound_rx: rx,
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
            })
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&self, _sink: Arc<dyn TransportSink>) -> Result<(), JsonRpcClientError> {
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(JsonRpcClientError::TransportTimeout);
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn send_text(&self, text: String) -> Result<(), JsonRpcClientError> {
            self.outbound.send(text).map_err(|_| JsonRpcClientError::Transport("closed".into()))
        }
        async fn close(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    struct RecordingListener {
        events: StdMutex<Vec<ConnectionEvent>>,
        notify: Notify,
    }

    impl RecordingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self { events: StdMutex::new(Vec::new()), notify: Notify::new() })
        }
    }

    impl ConnectionListener for RecordingListener {
        fn on_connected(&self) {
            self.events.lock().unwrap().push(ConnectionEvent::Connected);
            self.notify.notify_one();
        }
        fn on_disconnected(&self) {
            self.events.lock().unwrap().push(ConnectionEvent::Disconnected);
            self.notify.notify_one();
        }
        fn on_connection_failed(&self) {
            self.events.lock().unwrap().push(ConnectionEvent::ConnectionFailed);
            self.notify.notify_one();
        }
    }

    /// A real end-to-end transport pair, exercising the crate against a real
    /// `tokio-tungstenite` mock server.
    async fn spawn_mock_server() -> (String, tokio::task::JoinHandle<()>) {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::TcpListener;
        use tokio_tungstenite::tungstenite::Message;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let req: Value = serde_json::from_str(&text).unwrap();
                    let id = req["id"].as_u64().unwrap();
                    let reply = json!({"jsonrpc":"2.0","id":id,"result":{},"sessionId":"S1"});
                    if sink.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        });
        (format!("ws://{addr}"), handle)
    }

    fn config() -> ClientConfig {
        ClientConfig::default()
            .with_request_timeout(std::time::Duration::from_millis(500))
            .with_connection_lock_timeout(std::time::Duration::from_millis(500))
    }

    #[tokio::test]
    async fn happy_path_connect_and_call_over_real_socket() {
        let (url, _server) = spawn_mock_server().await;
        let client = JsonRpcClient::new(url, config(), None, None);
        client.connect().await.unwrap();
        assert!(client.is_connected().await);
        assert_eq!(client.session_id().await.as_deref(), Some("S1"));

        let result = client.call("Foo.bar", Some(json!({"x": 1}))).await.unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn call_before_connect_times_out_with_lock_timeout() {
        let transport = ScriptedTransport::new();
        let cfg = ClientConfig::default().with_connection_lock_timeout(std::time::Duration::from_millis(50));
        let client = JsonRpcClient::with_transport(transport, cfg, None, None);

        let err = client.call("Foo.bar", None).await.unwrap_err();
        assert!(matches!(err, JsonRpcClientError::LockTimeout));
    }

    #[tokio::test]
    async fn request_times_out_when_no_response_arrives() {
        let transport = ScriptedTransport::new();
        transport.connected.store(true, Ordering::SeqCst);
        let cfg = config().with_request_timeout(std::time::Duration::from_millis(50));
        let client = JsonRpcClient::with_transport(transport, cfg, None, None);
        // Manually mark connected without running the handshake, to isolate
        // the request-timeout behavior from the connect handshake.
        {
            let guard_client = client.clone();
            let mut guard = guard_client.inner.session.lock().await;
            guard.state = SessionState::Connected;
            guard.ever_connected = true;
        }

        let err = client.call("Foo.bar", None).await.unwrap_err();
        assert!(matches!(err, JsonRpcClientError::RequestTimeout { .. }));
    }

    #[tokio::test]
    async fn connect_failure_fires_connection_failed_not_disconnected() {
        let transport = ScriptedTransport::new();
        transport.fail_connect.store(true, Ordering::SeqCst);
        let listener = RecordingListener::new();
        let client = JsonRpcClient::with_transport(
            transport,
            config(),
            Some(listener.clone() as Arc<dyn ConnectionListener>),
            None,
        );

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, JsonRpcClientError::TransportTimeout));
        listener.notify.notified().await;
        assert_eq!(listener.events.lock().unwrap().as_slice(), [ConnectionEvent::ConnectionFailed]);
    }

    #[tokio::test]
    async fn user_close_after_connecting_fires_disconnected() {
        let (url, _server) = spawn_mock_server().await;
        let listener = RecordingListener::new();
        let client = JsonRpcClient::new(url, config(), Some(listener.clone() as Arc<dyn ConnectionListener>), None);
        client.connect().await.unwrap();

        client.close().await.unwrap();
        listener.notify.notified().await;
        assert_eq!(listener.events.lock().unwrap().as_slice(), [ConnectionEvent::Connected, ConnectionEvent::Disconnected]);

        let err = client.call("Foo.bar", None).await.unwrap_err();
        assert!(matches!(err, JsonRpcClientError::ClientClosed));
    }

    #[tokio::test]
    async fn close_resolves_pending_requests_with_client_closed() {
        let transport = ScriptedTransport::new();
        transport.connected.store(true, Ordering::SeqCst);
        let client = JsonRpcClient::with_transport(transport, config(), None, None);
        {
            let mut guard = client.inner.session.lock().await;
            guard.state = SessionState::Connected;
            guard.ever_connected = true;
        }

        let client_for_call = client.clone();
        let call_task = tokio::spawn(async move { client_for_call.call("Foo.bar", None).await });
        // Give the call a moment to reserve its pending slot before closing.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.close().await.unwrap();

        let result = call_task.await.unwrap();
        assert!(matches!(result, Err(JsonRpcClientError::ClientClosed)));
    }

    #[tokio::test]
    async fn call_with_invokes_callback_off_the_caller_context() {
        let (url, _server) = spawn_mock_server().await;
        let client = JsonRpcClient::new(url, config(), None, None);
        client.connect().await.unwrap();

        let done = Arc::new(Notify::new());
        let outcome = Arc::new(StdMutex::new(None));
        let done2 = done.clone();
        let outcome2 = outcome.clone();
        client.call_with("Foo.bar", None, move |result| {
            *outcome2.lock().unwrap() = Some(result);
            done2.notify_one();
        });
        done.notified().await;
        assert!(outcome.lock().unwrap().take().unwrap().is_ok());
    }

    struct RecordingHeartbeat {
        calls: StdMutex<Vec<bool>>,
        notify: Notify,
    }

    impl crate::heartbeat::HeartbeatHandle for RecordingHeartbeat {
        fn enable(&self) {
            self.calls.lock().unwrap().push(true);
            self.notify.notify_one();
        }
        fn disable(&self) {
            self.calls.lock().unwrap().push(false);
            self.notify.notify_one();
        }
    }

    #[tokio::test]
    async fn heartbeat_enabled_on_connect_and_disabled_on_close() {
        let (url, _server) = spawn_mock_server().await;
        let client = JsonRpcClient::new(url, config(), None, None);
        let heartbeat = Arc::new(RecordingHeartbeat { calls: StdMutex::new(Vec::new()), notify: Notify::new() });
        client.set_heartbeat_handle(Some(heartbeat.clone() as Arc<dyn crate::heartbeat::HeartbeatHandle>)).await;

        client.connect().await.unwrap();
        heartbeat.notify.notified().await;
        assert_eq!(heartbeat.calls.lock().unwrap().as_slice(), [true]);

        client.close().await.unwrap();
        heartbeat.notify.notified().await;
        assert_eq!(heartbeat.calls.lock().unwrap().as_slice(), [true, false]);
    }
}
