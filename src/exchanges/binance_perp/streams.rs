use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{StreamHosts, StreamPath};

pub const PUBLIC_STREAM_HOST: &str = "wss://fstream.binance.com";
pub const AUTH_STREAM_HOST: &str = "wss://fstream-auth.binance.com";
pub const TESTNET_STREAM_HOST: &str = "wss://stream.binancefuture.com";

/// Stream hosts for production or testnet. Testnet serves both kinds from one host.
pub fn stream_hosts(testnet: bool) -> StreamHosts {
    if testnet {
        StreamHosts::new(TESTNET_STREAM_HOST, TESTNET_STREAM_HOST)
    } else {
        StreamHosts::new(PUBLIC_STREAM_HOST, AUTH_STREAM_HOST)
    }
}

/// URL for `path`, routed to the authenticated host when a listen key is given.
pub fn build_stream_url(
    path: impl Into<StreamPath>,
    listen_key: Option<&str>,
    testnet: bool,
) -> Result<String, ExchangeError> {
    stream_hosts(testnet).build_url(&path.into(), listen_key)
}

/// `<symbol>@aggTrade`, pushed every 100ms
pub fn agg_trade(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

/// `<symbol>@markPrice@1s`
pub fn mark_price(symbol: &str) -> String {
    format!("{}@markPrice@1s", symbol.to_lowercase())
}

pub fn kline(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval)
}

/// `<pair>_<contractType>@continuousKline_<interval>`, e.g. `btcusdt_perpetual@continuousKline_1m`
pub fn continuous_kline(pair: &str, contract_type: &str, interval: &str) -> String {
    format!(
        "{}_{}@continuousKline_{}",
        pair.to_lowercase(),
        contract_type.to_lowercase(),
        interval
    )
}

fn single_or_all(symbol: Option<&str>, suffix: &str, all: &str) -> String {
    symbol.map_or_else(
        || all.to_string(),
        |s| format!("{}@{}", s.to_lowercase(), suffix),
    )
}

/// Mini ticker for one symbol, or `!miniTicker@arr` for all
pub fn mini_ticker(symbol: Option<&str>) -> String {
    single_or_all(symbol, "miniTicker", "!miniTicker@arr")
}

pub fn ticker(symbol: Option<&str>) -> String {
    single_or_all(symbol, "ticker", "!ticker@arr")
}

pub fn book_ticker(symbol: Option<&str>) -> String {
    single_or_all(symbol, "bookTicker", "!bookTicker")
}

/// Liquidation orders
pub fn force_order(symbol: Option<&str>) -> String {
    single_or_all(symbol, "forceOrder", "!forceOrder@arr")
}

/// Top `levels` (5, 10 or 20) bids and asks at `speed_ms` (100, 250 or 500)
pub fn partial_depth(symbol: &str, levels: u32, speed_ms: u32) -> String {
    format!("{}@depth{}@{}ms", symbol.to_lowercase(), levels, speed_ms)
}

pub fn diff_depth(symbol: &str, speed_ms: u32) -> String {
    format!("{}@depth@{}ms", symbol.to_lowercase(), speed_ms)
}

/// BLVT net asset value; token names are upper-case
pub fn blvt_nav(token: &str) -> String {
    format!("{}@tokenNav", token.to_uppercase())
}

pub fn blvt_kline(token: &str, interval: &str) -> String {
    format!("{}@nav_Kline_{}", token.to_uppercase(), interval)
}

pub fn composite_index(symbol: &str) -> String {
    format!("{}@compositeIndex", symbol.to_lowercase())
}

/// Private user-data stream; the listen key is the path
pub fn user_data() -> StreamPath {
    StreamPath::UserData
}

/// Several streams multiplexed on one connection
pub fn combined<S: AsRef<str>>(streams: &[S]) -> StreamPath {
    StreamPath::Combined(streams.iter().map(|s| s.as_ref().to_string()).collect())
}
