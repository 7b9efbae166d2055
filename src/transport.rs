//! The transport interface and its shipped WebSocket implementation.
//!
//! `Transport` is the abstract boundary the session coordinator drives;
//! `WebSocketTransport` is the default implementation: a background task
//! owns the socket and is reached through a cloneable handle, trimmed to
//! just the four raw obligations below. Correlation, reconnection policy,
//! and message classification are the session coordinator's job, not the
//! transport's.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::JsonRpcClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callbacks the transport drives on whoever embeds it — in this crate,
/// [`crate::session::JsonRpcClient`]. Kept as a trait rather than a pair of
/// closures so a test double can record calls without allocating.
pub trait TransportSink: Send + Sync + 'static {
    /// Called for every inbound text frame.
    fn on_text_message(&self, text: String);
    /// Called when the native channel closes without the embedder having
    /// initiated the close.
    fn on_unsolicited_disconnect(&self, reason: String);
}

/// The abstract boundary to a native text-message channel.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// (Re)establish the channel and start forwarding inbound frames and
    /// unsolicited-disconnect notices to `sink`. Block up to the
    /// transport's configured connect timeout; return on success, or a
    /// timeout-distinguished error so `retry_if_timeout_on_connect` can be
    /// honored specifically. Called again, with the same sink, on every
    /// reconnect attempt.
    async fn connect(&self, sink: Arc<dyn TransportSink>) -> Result<(), JsonRpcClientError>;

    /// Deliver one JSON message frame.
    async fn send_text(&self, text: String) -> Result<(), JsonRpcClientError>;

    /// Idempotent; must not fail.
    async fn close(&self);

    /// Non-blocking boolean snapshot.
    fn is_connected(&self) -> bool;
}

/// Default [`Transport`] implementation over `tokio-tungstenite`.
///
/// Mirrors `cdp::transport::TransportTask`'s single-task-owns-the-socket
/// shape, but only implements the four `Transport` obligations — there is
/// no pending-request map or subscriber table here, since those live in
/// `pending.rs`/`dispatcher.rs` on the session coordinator side.
pub struct WebSocketTransport {
    url: String,
    connect_timeout: Duration,
    connected: Arc<AtomicBool>,
    outbound_tx: tokio::sync::Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            connected: Arc::new(AtomicBool::new(false)),
            outbound_tx: tokio::sync::Mutex::new(None),
        }
    }

    async fn connect_and_spawn(
        &self,
        sink: Arc<dyn TransportSink>,
    ) -> Result<(), JsonRpcClientError> {
        let ws_stream = connect_ws(&self.url, self.connect_timeout).await?;
        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        self.connected.store(true, Ordering::Relaxed);
        *self.outbound_tx.lock().await = Some(outbound_tx);

        let connected = Arc::clone(&self.connected);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                sink.on_text_message(text.to_string());
                            }
                            Some(Ok(Message::Close(frame))) => {
                                connected.store(false, Ordering::Relaxed);
                                let reason = frame
                                    .map(|f| f.reason.to_string())
                                    .unwrap_or_else(|| "peer closed".to_string());
                                sink.on_unsolicited_disconnect(reason);
                                break;
                            }
                            Some(Err(e)) => {
                                connected.store(false, Ordering::Relaxed);
                                sink.on_unsolicited_disconnect(e.to_string());
                                break;
                            }
                            None => {
                                connected.store(false, Ordering::Relaxed);
                                sink.on_unsolicited_disconnect("stream ended".to_string());
                                break;
                            }
                            Some(Ok(_)) => {
                                // Binary, Ping, Pong, Frame — ignore.
                            }
                        }
                    }
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(msg) => {
                                if let Err(e) = write.send(msg).await {
                                    tracing::warn!(error = %e, "websocket write failed");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        Ok(())
    }
}

async fn connect_ws(url: &str, timeout: Duration) -> Result<WsStream, JsonRpcClientError> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(JsonRpcClientError::Transport(e.to_string())),
        Err(_) => Err(JsonRpcClientError::TransportTimeout),
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, sink: Arc<dyn TransportSink>) -> Result<(), JsonRpcClientError> {
        self.connect_and_spawn(sink).await
    }

    async fn send_text(&self, text: String) -> Result<(), JsonRpcClientError> {
        let guard = self.outbound_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(Message::Text(text.into()))
                .map_err(|_| JsonRpcClientError::Transport("write loop has exited".into())),
            None => Err(JsonRpcClientError::Transport("not connected".into())),
        }
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        *self.outbound_tx.lock().await = None;
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
