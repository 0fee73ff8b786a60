use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, StreamHandler, StreamHosts, UserDataSession, WsConfig};
use crate::exchanges::binance_perp::rest::BinancePerpRestClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Private user-data stream with its listen key kept alive
pub struct UserData<R: RestClient + 'static> {
    session: UserDataSession<BinancePerpRestClient<R>>,
}

impl<R: RestClient + 'static> UserData<R> {
    pub fn new(
        rest: BinancePerpRestClient<R>,
        hosts: StreamHosts,
        config: WsConfig,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            session: UserDataSession::new(Arc::new(rest), hosts, config)
                .with_keepalive_interval(keepalive_interval),
        }
    }

    /// Account, order and margin events into `handler` until the stream or
    /// the key renewal stops
    pub async fn run<H>(&self, handler: &mut H) -> Result<(), ExchangeError>
    where
        H: StreamHandler + ?Sized,
    {
        self.session.run(handler).await
    }

    /// Listen-key lifecycle around a caller-provided stream future
    pub async fn run_with<F, Fut>(&self, stream: F) -> Result<(), ExchangeError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), ExchangeError>>,
    {
        self.session.run_with(stream).await
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.session.keepalive_interval()
    }
}
