use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, instrument, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Liveness and reconnect timings for a stream session
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Silence tolerated before an application-level ping is sent
    pub reply_timeout: Duration,
    /// How long to wait for the pong after that ping
    pub ping_timeout: Duration,
    /// Sleep between reconnect attempts
    pub reconnect_delay: Duration,
    /// Bound on one connect attempt, handshake included
    pub connect_timeout: Duration,
    /// Exchange name for logging/tracing
    pub exchange_name: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reply_timeout: crate::core::config::DEFAULT_REPLY_TIMEOUT,
            ping_timeout: crate::core::config::DEFAULT_PING_TIMEOUT,
            reconnect_delay: crate::core::config::DEFAULT_WS_RECONNECT_DELAY,
            connect_timeout: crate::core::config::DEFAULT_WS_CONNECT_TIMEOUT,
            exchange_name: "binance_perp".to_string(),
        }
    }
}

impl WsConfig {
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// What a session subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPath {
    /// One named stream, e.g. `btcusdt@aggTrade`
    Single(String),
    /// Several streams multiplexed on one connection
    Combined(Vec<String>),
    /// The private user-data stream addressed by the listen key itself
    UserData,
}

impl From<&str> for StreamPath {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for StreamPath {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for StreamPath {
    fn from(value: Vec<String>) -> Self {
        Self::Combined(value)
    }
}

impl From<&[&str]> for StreamPath {
    fn from(value: &[&str]) -> Self {
        Self::Combined(value.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StreamPath {
    fn from(value: [&str; N]) -> Self {
        Self::from(&value[..])
    }
}

/// Public and listen-key stream hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHosts {
    pub public: String,
    pub auth: String,
}

impl StreamHosts {
    pub fn new(public: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            public: public.into(),
            auth: auth.into(),
        }
    }

    /// Compose the connection URL. A listen key always routes to the
    /// authenticated host.
    pub fn build_url(
        &self,
        path: &StreamPath,
        listen_key: Option<&str>,
    ) -> Result<String, ExchangeError> {
        match (listen_key, path) {
            (None, StreamPath::Single(stream)) => Ok(format!("{}/ws/{}", self.public, stream)),
            (None, StreamPath::Combined(streams)) => Ok(format!(
                "{}/stream?streams={}",
                self.public,
                streams.join("/")
            )),
            (None, StreamPath::UserData) => Err(ExchangeError::ConfigurationError(
                "User data stream requires a listen key".to_string(),
            )),
            (Some(key), StreamPath::UserData) => Ok(format!("{}/ws/{}", self.auth, key)),
            (Some(key), StreamPath::Combined(streams)) => Ok(format!(
                "{}/stream?streams={}&listenKey={}",
                self.auth,
                streams.join("/"),
                key
            )),
            (Some(key), StreamPath::Single(stream)) => Ok(format!(
                "{}/ws/{}?listenKey={}",
                self.auth, stream, key
            )),
        }
    }
}

/// Receives every decoded text payload of a session.
///
/// An error returned here ends `listen_forever` with that error.
#[async_trait]
pub trait StreamHandler: Send {
    async fn on_message(&mut self, payload: Value) -> Result<(), ExchangeError>;
}

#[async_trait]
impl<F> StreamHandler for F
where
    F: FnMut(Value) -> Result<(), ExchangeError> + Send,
{
    async fn on_message(&mut self, payload: Value) -> Result<(), ExchangeError> {
        self(payload)
    }
}

/// Cloneable flag that stops a session at its next loop boundary.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle(Arc<AtomicBool>);

impl QuitHandle {
    pub fn quit(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_quit(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a single connection ended.
#[derive(Debug)]
enum Disconnect {
    Quit,
    Closed,
    Socket(String),
    LivenessFailed,
}

/// WebSocket Session: one stream URL, reconnected without limit until quit.
///
/// The connection handle lives only inside one connect cycle and is
/// replaced wholesale on reconnect.
#[derive(Debug)]
pub struct WsSession {
    url: String,
    listen_key: Option<String>,
    config: WsConfig,
    quit: QuitHandle,
}

impl WsSession {
    pub fn new(url: String, config: WsConfig) -> Self {
        Self {
            url,
            listen_key: None,
            config,
            quit: QuitHandle::default(),
        }
    }

    /// Build the URL for `path` and bind the session to `listen_key`.
    pub fn for_stream(
        hosts: &StreamHosts,
        path: &StreamPath,
        listen_key: Option<String>,
        config: WsConfig,
    ) -> Result<Self, ExchangeError> {
        let url = hosts.build_url(path, listen_key.as_deref())?;
        Ok(Self {
            listen_key,
            ..Self::new(url, config)
        })
    }

    /// Mark this as a listen-key session: a failed liveness check then ends it.
    #[must_use]
    pub fn with_listen_key(mut self, listen_key: String) -> Self {
        self.listen_key = Some(listen_key);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn listen_key(&self) -> Option<&str> {
        self.listen_key.as_deref()
    }

    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Connect, dispatch and reconnect until the quit flag is set or the
    /// handler fails.
    #[instrument(skip_all, fields(exchange = %self.config.exchange_name, url = %self.url))]
    pub async fn listen_forever<H>(&self, handler: &mut H) -> Result<(), ExchangeError>
    where
        H: StreamHandler + ?Sized,
    {
        while !self.quit.is_quit() {
            let attempt = connect_async(self.url.as_str());
            let stream = match timeout(self.config.connect_timeout, attempt).await {
                Ok(Ok((stream, _))) => stream,
                Ok(Err(e)) => {
                    warn!(
                        error = %e,
                        retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
                        "Connection failed, retrying"
                    );
                    sleep(self.config.reconnect_delay).await;
                    continue;
                }
                Err(_) => {
                    warn!(
                        connect_timeout_ms = self.config.connect_timeout.as_millis() as u64,
                        retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
                        "Connection timed out, retrying"
                    );
                    sleep(self.config.reconnect_delay).await;
                    continue;
                }
            };
            info!("Creating new connection");

            match self.dispatch(stream, handler).await? {
                Disconnect::Quit => break,
                Disconnect::LivenessFailed => {
                    warn!(
                        retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
                        "Ping error, retrying connection"
                    );
                    sleep(self.config.reconnect_delay).await;
                    if self.listen_key.is_some() {
                        self.quit.quit();
                    }
                }
                Disconnect::Closed => {
                    warn!("Connection closed by peer, reconnecting");
                    sleep(self.config.reconnect_delay).await;
                }
                Disconnect::Socket(error) => {
                    warn!(error = %error, "Socket error, reconnecting");
                    sleep(self.config.reconnect_delay).await;
                }
            }
        }

        info!("Session stopped");
        Ok(())
    }

    async fn dispatch<H>(&self, stream: WsStream, handler: &mut H) -> Result<Disconnect, ExchangeError>
    where
        H: StreamHandler + ?Sized,
    {
        let (mut write, mut read) = stream.split();

        loop {
            if self.quit.is_quit() {
                let _ = write.close().await;
                return Ok(Disconnect::Quit);
            }

            let frame = match timeout(self.config.reply_timeout, read.next()).await {
                Ok(frame) => frame,
                Err(_) => match self.check_liveness(&mut write, &mut read).await {
                    Some(frame) => frame,
                    None => return Ok(Disconnect::LivenessFailed),
                },
            };

            let message = match frame {
                None => return Ok(Disconnect::Closed),
                Some(Err(e)) => return Ok(Disconnect::Socket(e.to_string())),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(payload) => {
                        if let Err(e) = handler.on_message(payload).await {
                            let _ = write.close().await;
                            return Err(e);
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping non-JSON text frame"),
                },
                Message::Ping(_) => {
                    // tungstenite queues the pong itself; push it out now
                    trace!("Ping received");
                    if let Err(e) = write.flush().await {
                        return Ok(Disconnect::Socket(e.to_string()));
                    }
                }
                Message::Pong(_) => debug!("Pong received"),
                Message::Close(frame) => {
                    debug!(?frame, "Close frame received");
                    return Ok(Disconnect::Closed);
                }
                Message::Binary(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Send one ping and wait for the next frame. `None` means the peer is gone.
    async fn check_liveness(
        &self,
        write: &mut WsWrite,
        read: &mut WsRead,
    ) -> Option<Option<Result<Message, tokio_tungstenite::tungstenite::Error>>> {
        debug!(
            reply_timeout_s = self.config.reply_timeout.as_secs(),
            "No message within reply timeout, sending ping"
        );
        if let Err(e) = write.send(Message::Ping(Vec::new())).await {
            warn!(error = %e, "Failed to send ping");
            return None;
        }
        match timeout(self.config.ping_timeout, read.next()).await {
            Ok(Some(Ok(message))) => Some(Some(Ok(message))),
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Liveness check failed");
                None
            }
            Ok(None) => None,
            Err(_) => {
                warn!(
                    ping_timeout_s = self.config.ping_timeout.as_secs(),
                    "No pong within ping timeout"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> StreamHosts {
        StreamHosts::new("wss://public.example", "wss://auth.example")
    }

    #[test]
    fn test_public_single_stream() {
        let url = hosts()
            .build_url(&StreamPath::from("btcusdt@aggTrade"), None)
            .unwrap();
        assert_eq!(url, "wss://public.example/ws/btcusdt@aggTrade");
    }

    #[test]
    fn test_public_combined_stream() {
        let url = hosts().build_url(&StreamPath::from(["a", "b"]), None).unwrap();
        assert_eq!(url, "wss://public.example/stream?streams=a/b");
    }

    #[test]
    fn test_listen_key_uses_auth_host() {
        let hosts = hosts();
        assert_eq!(
            hosts.build_url(&StreamPath::UserData, Some("KEY")).unwrap(),
            "wss://auth.example/ws/KEY"
        );
        assert_eq!(
            hosts
                .build_url(&StreamPath::from(["a", "b"]), Some("KEY"))
                .unwrap(),
            "wss://auth.example/stream?streams=a/b&listenKey=KEY"
        );
        assert_eq!(
            hosts
                .build_url(&StreamPath::from("btcusdt@depth"), Some("KEY"))
                .unwrap(),
            "wss://auth.example/ws/btcusdt@depth?listenKey=KEY"
        );
    }

    #[test]
    fn test_user_data_without_key_is_rejected() {
        assert!(matches!(
            hosts().build_url(&StreamPath::UserData, None),
            Err(ExchangeError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_for_stream_binds_listen_key() {
        let session = WsSession::for_stream(
            &hosts(),
            &StreamPath::UserData,
            Some("KEY".to_string()),
            WsConfig::default(),
        )
        .unwrap();
        assert_eq!(session.listen_key(), Some("KEY"));
        assert_eq!(session.url(), "wss://auth.example/ws/KEY");
    }

    #[test]
    fn test_quit_handle_is_shared() {
        let session = WsSession::new("wss://x".to_string(), WsConfig::default());
        let handle = session.quit_handle();
        assert!(!session.quit.is_quit());
        handle.quit();
        assert!(session.quit.is_quit());
    }

    #[tokio::test]
    async fn test_quit_before_start_returns_immediately() {
        let session = WsSession::new("ws://127.0.0.1:1".to_string(), WsConfig::default());
        session.quit_handle().quit();
        let mut handler = |_: Value| -> Result<(), ExchangeError> { Ok(()) };
        session.listen_forever(&mut handler).await.unwrap();
    }
}
