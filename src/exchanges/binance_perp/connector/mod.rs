use crate::core::config::ExchangeConfig;
use crate::core::kernel::RestClient;
use crate::exchanges::binance_perp::builder::ws_config;
use crate::exchanges::binance_perp::rest::BinancePerpRestClient;
use crate::exchanges::binance_perp::streams::stream_hosts;

pub mod market_streams;
pub mod user_data;

pub use market_streams::MarketStreams;
pub use user_data::UserData;

/// USD-M futures connector composed of the REST endpoint surface, public
/// market streams and, with credentials, the user-data stream
pub struct BinancePerpConnector<R: RestClient + 'static> {
    pub rest: BinancePerpRestClient<R>,
    pub streams: MarketStreams,
    pub user_data: Option<UserData<R>>,
}

impl<R: RestClient + Clone + 'static> BinancePerpConnector<R> {
    pub fn new(rest: R, config: &ExchangeConfig) -> Self {
        let hosts = stream_hosts(config.testnet);
        let ws = ws_config(config);
        let rest = BinancePerpRestClient::new(rest);

        let user_data = config.has_credentials().then(|| {
            UserData::new(
                rest.clone(),
                hosts.clone(),
                ws.clone(),
                config.listen_key_keepalive,
            )
        });

        Self {
            streams: MarketStreams::new(hosts, ws),
            user_data,
            rest,
        }
    }
}
