//! A reconnecting JSON-RPC 2.0 client over a persistent, text-message
//! native transport (WebSocket by default).
//!
//! The public surface is [`JsonRpcClient`]: construct one with
//! [`JsonRpcClient::new`], call [`JsonRpcClient::connect`], then
//! [`JsonRpcClient::call`]/[`JsonRpcClient::notify`]/[`JsonRpcClient::call_with`].
//! Reconnection, session resumption, and server-initiated request dispatch
//! all happen underneath without further caller involvement; register a
//! [`ConnectionListener`] and/or [`HandlerManager`] at construction time to
//! observe lifecycle events and answer server-initiated requests.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod heartbeat;
pub mod listener;
pub mod pending;
pub mod reconnect;
pub mod responder;
pub mod rpc;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use dispatcher::{HandlerManager, NoopHandlerManager};
pub use error::JsonRpcClientError;
pub use heartbeat::HeartbeatHandle;
pub use listener::{ConnectionEvent, ConnectionListener};
pub use responder::ResponseSender;
pub use rpc::{IncomingRequest, RequestId};
pub use session::JsonRpcClient;
pub use transport::{Transport, TransportSink, WebSocketTransport};
