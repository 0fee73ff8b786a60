use crate::core::errors::ExchangeError;
use crate::core::kernel::{StreamHandler, StreamHosts, StreamPath, WsConfig, WsSession};
use crate::core::websocket::{StreamSubscription, WebSocketManager};
use serde_json::Value;
use tracing::instrument;

/// Public market streams
pub struct MarketStreams {
    manager: WebSocketManager,
    config: WsConfig,
}

impl MarketStreams {
    pub fn new(hosts: StreamHosts, config: WsConfig) -> Self {
        Self {
            manager: WebSocketManager::new(hosts, config.clone()),
            config,
        }
    }

    pub fn hosts(&self) -> &StreamHosts {
        self.manager.hosts()
    }

    /// Session for `path`, not yet connected
    pub fn session(&self, path: impl Into<StreamPath>) -> Result<WsSession, ExchangeError> {
        WsSession::for_stream(self.hosts(), &path.into(), None, self.config.clone())
    }

    /// Run `handler` on the current task until it fails or the session quits
    #[instrument(skip_all, fields(exchange = "binance_perp"))]
    pub async fn listen<H>(&self, path: impl Into<StreamPath>, handler: &mut H) -> Result<(), ExchangeError>
    where
        H: StreamHandler + ?Sized,
    {
        self.session(path)?.listen_forever(handler).await
    }

    /// Spawn the stream and receive raw payloads through a channel
    pub fn subscribe(
        &self,
        path: impl Into<StreamPath>,
    ) -> Result<StreamSubscription<Value>, ExchangeError> {
        self.manager.start_raw_stream(&path.into(), None)
    }

    /// Spawn the stream, keeping only what `parser` maps to `Some`
    pub fn subscribe_with<F, T>(
        &self,
        path: impl Into<StreamPath>,
        parser: F,
    ) -> Result<StreamSubscription<T>, ExchangeError>
    where
        F: Fn(Value) -> Option<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.manager.start_stream(&path.into(), None, parser)
    }
}
