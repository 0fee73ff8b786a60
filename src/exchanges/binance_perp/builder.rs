use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig, WsConfig};
use crate::exchanges::binance_perp::{
    connector::BinancePerpConnector, signer::BinancePerpSigner,
};
use std::sync::Arc;

pub const MAINNET_REST_URL: &str = "https://fapi.binance.com";
pub const TESTNET_REST_URL: &str = "https://testnet.binancefuture.com";

const EXCHANGE_NAME: &str = "binance_perp";

/// REST host: explicit override, else testnet or production
pub fn rest_base_url(config: &ExchangeConfig) -> String {
    config.base_url.clone().unwrap_or_else(|| {
        if config.testnet {
            TESTNET_REST_URL.to_string()
        } else {
            MAINNET_REST_URL.to_string()
        }
    })
}

pub fn rest_config(config: &ExchangeConfig) -> RestClientConfig {
    RestClientConfig::new(rest_base_url(config), EXCHANGE_NAME.to_string())
        .with_timeout(config.timeout)
        .with_reconnect_backoff(config.reconnect_delay, std::time::Duration::from_secs(1))
        .with_limit_usage(config.show_limit_usage)
        .with_header(config.show_header)
        .with_user_agent(config.user_agent.clone())
}

pub fn ws_config(config: &ExchangeConfig) -> WsConfig {
    WsConfig {
        exchange_name: EXCHANGE_NAME.to_string(),
        ..WsConfig::default()
    }
    .with_reply_timeout(config.reply_timeout)
    .with_ping_timeout(config.ping_timeout)
    .with_reconnect_delay(config.ws_reconnect_delay)
    .with_connect_timeout(config.ws_connect_timeout)
}

/// Request Executor for `config`, signing when credentials are present
pub fn build_rest_client(config: &ExchangeConfig) -> Result<ReqwestRest, ExchangeError> {
    let mut rest_builder = RestClientBuilder::new(rest_config(config));

    // Add authentication if credentials are provided
    if config.has_credentials() {
        let signer = Arc::new(BinancePerpSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    rest_builder.build()
}

/// Create a USD-M futures connector
pub fn build_connector(
    config: ExchangeConfig,
) -> Result<BinancePerpConnector<ReqwestRest>, ExchangeError> {
    let rest = build_rest_client(&config)?;
    Ok(BinancePerpConnector::new(rest, &config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_base_url_selection() {
        let config = ExchangeConfig::read_only();
        assert_eq!(rest_base_url(&config), MAINNET_REST_URL);

        let config = ExchangeConfig::read_only().testnet(true);
        assert_eq!(rest_base_url(&config), TESTNET_REST_URL);

        let config = ExchangeConfig::read_only().base_url("http://127.0.0.1:9000".to_string());
        assert_eq!(rest_base_url(&config), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_configs_follow_exchange_config() {
        let config = ExchangeConfig::read_only()
            .timeout(Duration::from_secs(9))
            .show_limit_usage(true)
            .reply_timeout(Duration::from_secs(30))
            .ws_reconnect_delay(Duration::from_millis(500))
            .ws_connect_timeout(Duration::from_secs(4));

        let rest = rest_config(&config);
        assert_eq!(rest.timeout, Duration::from_secs(9));
        assert!(rest.show_limit_usage);
        assert!(!rest.show_header);
        assert_eq!(rest.max_reconnect_attempts, 10);

        let ws = ws_config(&config);
        assert_eq!(ws.reply_timeout, Duration::from_secs(30));
        assert_eq!(ws.ping_timeout, Duration::from_secs(300));
        assert_eq!(ws.reconnect_delay, Duration::from_millis(500));
        assert_eq!(ws.connect_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_read_only_connector_has_no_user_data() {
        let connector = build_connector(ExchangeConfig::read_only()).unwrap();
        assert!(connector.user_data.is_none());
    }
}
