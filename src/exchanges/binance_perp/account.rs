use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{ApiResponse, Params};
use crate::exchanges::binance_perp::rest::{BinancePerpRestClient, LISTEN_KEY_PATH};
use tracing::instrument;

/// Account configuration, balances, positions and listen keys (signed)
impl<R: RestClient> BinancePerpRestClient<R> {
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn position_mode(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get(
                "get_private_position_mode",
                "/fapi/v1/positionSide/dual",
                Params::new(),
                true,
            )
            .await
    }

    /// `true` switches to hedge mode, `false` to one-way mode
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_position_mode(&self, dual_side: bool) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("dualSidePosition", dual_side);
        self.rest
            .post(
                "change_private_position_mode",
                "/fapi/v1/positionSide/dual",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn multi_assets_mode(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get(
                "get_private_multi_asset_mode",
                "/fapi/v1/multiAssetsMargin",
                Params::new(),
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_multi_assets_mode(
        &self,
        multi_assets: bool,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("multiAssetsMargin", multi_assets);
        self.rest
            .post(
                "change_private_multi_asset_mode",
                "/fapi/v1/multiAssetsMargin",
                params,
                true,
            )
            .await
    }

    /// Get account balance (authenticated)
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn balance(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_private_balance", "/fapi/v2/balance", Params::new(), true)
            .await
    }

    /// Get account information (authenticated)
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn account_info(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_private_account_info", "/fapi/v2/account", Params::new(), true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_leverage(
        &self,
        symbol: &str,
        leverage: u32,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("leverage", leverage);
        self.rest
            .post("change_private_leverage", "/fapi/v1/leverage", params, true)
            .await
    }

    /// `ISOLATED` or `CROSSED`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_margin_type(
        &self,
        symbol: &str,
        margin_type: &str,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("marginType", margin_type);
        self.rest
            .post("change_private_margin_type", "/fapi/v1/marginType", params, true)
            .await
    }

    /// `direction` 1 adds margin, 2 reduces it
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn modify_isolated_margin(
        &self,
        symbol: &str,
        amount: &str,
        direction: u8,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("amount", amount)
            .with("type", u32::from(direction))
            .merge(extra);
        self.rest
            .post(
                "change_private_isolated_position_margin",
                "/fapi/v1/positionMargin",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn position_margin_history(
        &self,
        symbol: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).merge(extra);
        self.rest
            .get(
                "get_private_position_margin_history",
                "/fapi/v1/positionMargin/history",
                params,
                true,
            )
            .await
    }

    /// Get account positions (authenticated)
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn position_risk(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_private_position_risk",
                "/fapi/v2/positionRisk",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn account_trades(
        &self,
        symbol: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).merge(extra);
        self.rest
            .get("get_private_account_trades", "/fapi/v1/userTrades", params, true)
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn income_history(&self, extra: Params) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_private_income_history", "/fapi/v1/income", extra, true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn leverage_brackets(
        &self,
        symbol: Option<&str>,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_private_leverage_brackets",
                "/fapi/v1/leverageBracket",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn adl_quantile(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get("get_private_adl_quantile", "/fapi/v1/adlQuantile", params, true)
            .await
    }

    /// User's liquidation and ADL orders
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn force_orders(&self, extra: Params) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .get("get_private_force_orders", "/fapi/v1/forceOrders", extra, true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn api_trading_status(
        &self,
        symbol: Option<&str>,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_private_api_trading_status",
                "/fapi/v1/apiTradingStatus",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn commission_rate(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol);
        self.rest
            .get(
                "get_private_commission_rate",
                "/fapi/v1/commissionRate",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn new_listen_key(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .post(
                "create_private_listen_key",
                LISTEN_KEY_PATH,
                Params::new(),
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn renew_listen_key(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .put(
                "update_private_listen_key",
                LISTEN_KEY_PATH,
                Params::new(),
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn delete_listen_key(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest
            .delete(
                "delete_private_listen_key",
                LISTEN_KEY_PATH,
                Params::new(),
                true,
            )
            .await
    }
}
