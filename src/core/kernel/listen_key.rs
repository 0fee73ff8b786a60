//! Listen-key lifecycle for the private user-data stream.
//!
//! A [`UserDataSession`] creates a key, runs the stream and a renewal timer
//! side by side, and releases the key once either of them finishes.

use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{StreamHandler, StreamHosts, StreamPath, WsConfig, WsSession};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

/// REST operations backing a listen key.
#[async_trait]
pub trait ListenKeyApi: Send + Sync {
    /// Obtain a key valid for 60 minutes.
    async fn create_listen_key(&self) -> Result<String, ExchangeError>;

    /// Extend the key's validity by another 60 minutes.
    async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError>;

    async fn close_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError>;
}

/// Releases the key exactly once: awaited on the normal path, spawned onto
/// the runtime when the owning future is dropped mid-flight.
struct ListenKeyGuard<A: ListenKeyApi + 'static> {
    api: Arc<A>,
    listen_key: Option<String>,
}

impl<A: ListenKeyApi + 'static> ListenKeyGuard<A> {
    async fn release(mut self) {
        if let Some(key) = self.listen_key.take() {
            close_key(self.api.as_ref(), &key).await;
        }
    }
}

impl<A: ListenKeyApi + 'static> Drop for ListenKeyGuard<A> {
    fn drop(&mut self) {
        let Some(key) = self.listen_key.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let api = Arc::clone(&self.api);
                handle.spawn(async move { close_key(api.as_ref(), &key).await });
            }
            Err(_) => warn!("No runtime available, listen key left to expire"),
        }
    }
}

async fn close_key<A: ListenKeyApi + ?Sized>(api: &A, listen_key: &str) {
    match api.close_listen_key(listen_key).await {
        Ok(()) => info!("User session closed, listen key released"),
        Err(e) => error!(error = %e, "Failed to close listen key"),
    }
}

/// Listen-Key Lifecycle Manager bound to one user-data stream.
pub struct UserDataSession<A: ListenKeyApi + 'static> {
    api: Arc<A>,
    hosts: StreamHosts,
    ws_config: WsConfig,
    keepalive_interval: Duration,
}

impl<A: ListenKeyApi + 'static> UserDataSession<A> {
    pub fn new(api: Arc<A>, hosts: StreamHosts, ws_config: WsConfig) -> Self {
        Self {
            api,
            hosts,
            ws_config,
            keepalive_interval: crate::core::config::DEFAULT_LISTEN_KEY_KEEPALIVE,
        }
    }

    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    /// Stream user-data events into `handler` until the stream or the
    /// renewal loop stops. The key is closed on every exit path.
    #[instrument(skip_all, fields(exchange = %self.ws_config.exchange_name))]
    pub async fn run<H>(&self, handler: &mut H) -> Result<(), ExchangeError>
    where
        H: StreamHandler + ?Sized,
    {
        let hosts = self.hosts.clone();
        let ws_config = self.ws_config.clone();
        self.run_with(|listen_key| async move {
            let session =
                WsSession::for_stream(&hosts, &StreamPath::UserData, Some(listen_key), ws_config)?;
            session.listen_forever(handler).await
        })
        .await
    }

    /// Same lifecycle around an arbitrary stream future built from the key.
    pub async fn run_with<F, Fut>(&self, stream: F) -> Result<(), ExchangeError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), ExchangeError>>,
    {
        let listen_key = self.api.create_listen_key().await?;
        info!("Listen key created, user session connected");

        let guard = ListenKeyGuard {
            api: Arc::clone(&self.api),
            listen_key: Some(listen_key.clone()),
        };

        let result = tokio::select! {
            result = stream(listen_key.clone()) => {
                info!("User data stream finished");
                result
            }
            result = self.keepalive_loop(&listen_key) => {
                warn!("Listen key renewal stopped");
                result
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "User session ended with error");
        }
        guard.release().await;
        result
    }

    async fn keepalive_loop(&self, listen_key: &str) -> Result<(), ExchangeError> {
        loop {
            tokio::time::sleep(self.keepalive_interval).await;
            if let Err(e) = self.api.keepalive_listen_key(listen_key).await {
                error!(error = %e, "Failed to renew listen key");
                return Err(e);
            }
            info!(
                next_in_s = self.keepalive_interval.as_secs(),
                "Listen key renewed"
            );
        }
    }
}
