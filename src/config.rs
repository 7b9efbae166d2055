use std::time::Duration;

/// Environment variable carrying the process-wide default request timeout.
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "JSONRPC_CLIENT_WEBSOCKET_TIMEOUT_MS";

/// Fixed, enumerated set of options governing a [`crate::session::JsonRpcClient`].
///
/// All fields have defaults (see [`ClientConfig::default`]); construct via
/// `ClientConfig::default()` and the builder-style `with_*` methods, or via
/// [`ClientConfig::from_env`] to pick up the process-wide timeout override.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request max wait between send and response.
    pub request_timeout: Duration,
    /// Max wait for the transport connect.
    pub connection_timeout: Duration,
    /// Max wait to acquire the session-wide serialization lock.
    pub connection_lock_timeout: Duration,
    /// Delay between retry attempts when retrying forever.
    pub reconnect_delay: Duration,
    /// Send a JSON-RPC `closeSession` before tearing down.
    pub send_close_message: bool,
    /// On reconnect failure, retry indefinitely instead of surfacing failure.
    pub try_reconnecting_forever: bool,
    /// On connect-timeout specifically, retry the connect rather than failing.
    pub retry_if_timeout_on_connect: bool,
    /// Dispatch inbound server requests on a worker pool vs. inline.
    pub concurrent_server_request: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(60_000),
            connection_timeout: Duration::from_millis(10_000),
            connection_lock_timeout: Duration::from_millis(25_000),
            reconnect_delay: Duration::from_millis(5_000),
            send_close_message: false,
            try_reconnecting_forever: false,
            retry_if_timeout_on_connect: false,
            concurrent_server_request: true,
        }
    }
}

impl ClientConfig {
    /// Build a config, applying the process-wide `request_timeout_ms`
    /// default from [`REQUEST_TIMEOUT_ENV_VAR`] if it is set and parses as a
    /// `u64`. Explicit `with_request_timeout` calls made after this still
    /// take precedence: the environment overrides the built-in default, and
    /// the caller's explicit choice overrides everything.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(REQUEST_TIMEOUT_ENV_VAR)
            && let Ok(ms) = raw.parse::<u64>()
        {
            config.request_timeout = Duration::from_millis(ms);
        }
        config
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connection_lock_timeout(mut self, timeout: Duration) -> Self {
        self.connection_lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_send_close_message(mut self, send: bool) -> Self {
        self.send_close_message = send;
        self
    }

    #[must_use]
    pub fn with_try_reconnecting_forever(mut self, forever: bool) -> Self {
        self.try_reconnecting_forever = forever;
        self
    }

    #[must_use]
    pub fn with_retry_if_timeout_on_connect(mut self, retry: bool) -> Self {
        self.retry_if_timeout_on_connect = retry;
        self
    }

    #[must_use]
    pub fn with_concurrent_server_request(mut self, concurrent: bool) -> Self {
        self.concurrent_server_request = concurrent;
        self
    }
}
