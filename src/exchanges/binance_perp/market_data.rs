use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{ApiResponse, Params};
use crate::exchanges::binance_perp::rest::BinancePerpRestClient;
use tracing::instrument;

/// Public market data endpoints
impl<R: RestClient> BinancePerpRestClient<R> {
    /// Test connectivity
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn ping(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_public_ping", "/fapi/v1/ping", Params::new(), false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn server_time(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_public_time", "/fapi/v1/time", Params::new(), false)
            .await
    }

    /// Get exchange information
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn exchange_info(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get(
                "get_public_exchange_info",
                "/fapi/v1/exchangeInfo",
                Params::new(),
                false,
            )
            .await
    }

    /// Get order book for a specific symbol
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn depth(&self, symbol: &str, limit: Option<u32>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).with_opt("limit", limit);
        self.rest
            .get("get_public_depth", "/fapi/v1/depth", params, false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn recent_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).with_opt("limit", limit);
        self.rest
            .get("get_public_trades", "/fapi/v1/trades", params, false)
            .await
    }

    /// Older market trades; needs the API key header
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn historical_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
        from_id: Option<u64>,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with_opt("limit", limit)
            .with_opt("fromId", from_id);
        self.rest
            .get(
                "get_public_historical_trades",
                "/fapi/v1/historicalTrades",
                params,
                false,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn agg_trades(&self, symbol: &str, extra: Params) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).merge(extra);
        self.rest
            .get("get_public_agg_trades", "/fapi/v1/aggTrades", params, false)
            .await
    }

    /// Get klines for a specific symbol
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("interval", interval)
            .merge(extra);
        self.rest
            .get("get_public_klines", "/fapi/v1/klines", params, false)
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn continuous_klines(
        &self,
        pair: &str,
        contract_type: &str,
        interval: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("pair", pair)
            .with("contractType", contract_type)
            .with("interval", interval)
            .merge(extra);
        self.rest
            .get(
                "get_public_continuous_klines",
                "/fapi/v1/continuousKlines",
                params,
                false,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn index_price_klines(
        &self,
        pair: &str,
        interval: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("pair", pair)
            .with("interval", interval)
            .merge(extra);
        self.rest
            .get(
                "get_public_index_price_klines",
                "/fapi/v1/indexPriceKlines",
                params,
                false,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn mark_price_klines(
        &self,
        symbol: &str,
        interval: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("interval", interval)
            .merge(extra);
        self.rest
            .get(
                "get_public_mark_price_klines",
                "/fapi/v1/markPriceKlines",
                params,
                false,
            )
            .await
    }

    /// Mark price and funding rate (premium index); all symbols when `symbol` is `None`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn mark_price(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get("get_public_mark_price", "/fapi/v1/premiumIndex", params, false)
            .await
    }

    /// Get historical funding rates
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn funding_rate(
        &self,
        symbol: Option<&str>,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol).merge(extra);
        self.rest
            .get("get_public_funding_rate", "/fapi/v1/fundingRate", params, false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn ticker_24hr(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_public_ticker_24hr_price_change",
                "/fapi/v1/ticker/24hr",
                params,
                false,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn ticker_price(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get("get_public_ticker_price", "/fapi/v1/ticker/price", params, false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn book_ticker(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_public_book_ticker",
                "/fapi/v1/ticker/bookTicker",
                params,
                false,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn open_interest(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol);
        self.rest
            .get("get_public_open_interest", "/fapi/v1/openInterest", params, false)
            .await
    }

}
