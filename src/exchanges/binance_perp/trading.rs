use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{ApiResponse, Params};
use crate::exchanges::binance_perp::rest::{
    encode_batch_orders, BinancePerpRestClient, OrderRef, OrderRefs,
};
use tracing::instrument;

/// Order placement, cancellation and queries (signed)
impl<R: RestClient> BinancePerpRestClient<R> {
    /// Place a new order (authenticated)
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn new_order(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("side", side)
            .with("type", order_type)
            .merge(extra);
        self.rest
            .post("create_private_order", "/fapi/v1/order", params, true)
            .await
    }

    /// Validate an order without sending it to the matching engine
    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn test_order(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        extra: Params,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("side", side)
            .with("type", order_type)
            .merge(extra);
        self.rest
            .post("create_private_order_test", "/fapi/v1/order/test", params, true)
            .await
    }

    /// Up to five orders in one call; per-order failures come back inside the array
    #[instrument(skip_all, fields(exchange = "binance_perp", count = orders.len()))]
    pub async fn batch_orders(&self, orders: &[Params]) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("batchOrders", encode_batch_orders(orders)?);
        self.rest
            .post("create_private_batch_order", "/fapi/v1/batchOrders", params, true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn query_order(
        &self,
        symbol: &str,
        order: OrderRef,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = order.apply(Params::new().with("symbol", symbol));
        self.rest
            .get("get_private_order", "/fapi/v1/order", params, true)
            .await
    }

    /// Cancel an order (authenticated)
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order: OrderRef,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = order.apply(Params::new().with("symbol", symbol));
        self.rest
            .delete("delete_private_order", "/fapi/v1/order", params, true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn cancel_all_open_orders(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol);
        self.rest
            .delete(
                "delete_private_all_open_orders",
                "/fapi/v1/allOpenOrders",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn cancel_batch_orders(
        &self,
        symbol: &str,
        orders: OrderRefs,
    ) -> Result<ApiResponse, ExchangeError> {
        let (key, list) = match &orders {
            OrderRefs::Ids(ids) => ("orderIdList", serde_json::to_string(ids)?),
            OrderRefs::ClientIds(ids) => ("origClientOrderIdList", serde_json::to_string(ids)?),
        };
        let params = Params::new().with("symbol", symbol).with(key, list);
        self.rest
            .delete(
                "delete_private_batch_order",
                "/fapi/v1/batchOrders",
                params,
                true,
            )
            .await
    }

    /// Cancel all open orders of `symbol` after `countdown_ms`; zero disarms the timer
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn countdown_cancel_all(
        &self,
        symbol: &str,
        countdown_ms: u64,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new()
            .with("symbol", symbol)
            .with("countdownTime", countdown_ms);
        self.rest
            .post(
                "delete_private_order_countdown",
                "/fapi/v1/countdownCancelAll",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn open_order(
        &self,
        symbol: &str,
        order: OrderRef,
    ) -> Result<ApiResponse, ExchangeError> {
        let params = order.apply(Params::new().with("symbol", symbol));
        self.rest
            .get("get_private_open_order", "/fapi/v1/openOrder", params, true)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn open_orders(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with_opt("symbol", symbol);
        self.rest
            .get(
                "get_private_all_open_orders",
                "/fapi/v1/openOrders",
                params,
                true,
            )
            .await
    }

    #[instrument(skip(self, extra), fields(exchange = "binance_perp"))]
    pub async fn all_orders(&self, symbol: &str, extra: Params) -> Result<ApiResponse, ExchangeError> {
        let params = Params::new().with("symbol", symbol).merge(extra);
        self.rest
            .get("get_private_all_orders", "/fapi/v1/allOrders", params, true)
            .await
    }
}
