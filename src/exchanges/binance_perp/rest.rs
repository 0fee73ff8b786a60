use crate::core::errors::ExchangeError;
use crate::core::kernel::{ListenKeyApi, RestClient};
use crate::core::types::Params;
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;

pub const LISTEN_KEY_PATH: &str = "/fapi/v1/listenKey";

/// Order addressed either by exchange id or by client order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    Id(u64),
    ClientId(String),
}

impl From<u64> for OrderRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for OrderRef {
    fn from(id: &str) -> Self {
        Self::ClientId(id.to_string())
    }
}

impl From<String> for OrderRef {
    fn from(id: String) -> Self {
        Self::ClientId(id)
    }
}

impl OrderRef {
    pub(super) fn apply(&self, params: Params) -> Params {
        match self {
            Self::Id(id) => params.with("orderId", *id),
            Self::ClientId(id) => params.with("origClientOrderId", id.as_str()),
        }
    }
}

/// Several orders of one symbol, all by id or all by client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRefs {
    Ids(Vec<u64>),
    ClientIds(Vec<String>),
}

/// `newClientOrderId` from `new_client_order_id`; keys already in camel case pass through.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

struct CamelCaseOrder<'a>(&'a Params);

impl Serialize for CamelCaseOrder<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(k, v)| (to_camel_case(k), v.to_string())),
        )
    }
}

/// JSON list for `batchOrders`: camel-cased keys in insertion order, string values.
pub fn encode_batch_orders(orders: &[Params]) -> Result<String, ExchangeError> {
    let list: Vec<CamelCaseOrder<'_>> = orders.iter().map(CamelCaseOrder).collect();
    serde_json::to_string(&list).map_err(|e| ExchangeError::SerializationError(e.to_string()))
}

/// Thin endpoint wrappers over the Request Executor.
///
/// `extra` parameters are appended verbatim after the required ones and
/// must already use the exchange's camel-case names.
pub struct BinancePerpRestClient<R: RestClient> {
    pub(super) rest: R,
}

impl<R: RestClient + Clone> Clone for BinancePerpRestClient<R> {
    fn clone(&self) -> Self {
        Self {
            rest: self.rest.clone(),
        }
    }
}

impl<R: RestClient> BinancePerpRestClient<R> {
    /// Create a new REST client wrapper
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    pub fn inner(&self) -> &R {
        &self.rest
    }
}

/// The futures API keeps one key per account, so renew and close address it
/// implicitly.
#[async_trait]
impl<R: RestClient> ListenKeyApi for BinancePerpRestClient<R> {
    async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let response = self.new_listen_key().await?;
        response
            .data
            .get("listenKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExchangeError::DecodeError {
                body: response.data.to_string(),
            })
    }

    async fn keepalive_listen_key(&self, _listen_key: &str) -> Result<(), ExchangeError> {
        self.renew_listen_key().await.map(|_| ())
    }

    async fn close_listen_key(&self, _listen_key: &str) -> Result<(), ExchangeError> {
        self.delete_listen_key().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("new_client_order_id", "newClientOrderId")]
    #[case("time_in_force", "timeInForce")]
    #[case("quantity", "quantity")]
    #[case("reduceOnly", "reduceOnly")]
    fn test_to_camel_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_camel_case(input), expected);
    }

    #[test]
    fn test_batch_orders_encoding() {
        let orders = vec![
            Params::new()
                .with("symbol", "BTCUSDT")
                .with("side", "BUY")
                .with("type", "LIMIT")
                .with("time_in_force", "GTC")
                .with("quantity", "0.001")
                .with("price", "20000"),
            Params::new()
                .with("symbol", "BTCUSDT")
                .with("side", "SELL")
                .with("type", "MARKET")
                .with("quantity", 1_u32)
                .with("reduce_only", true),
        ];
        let encoded = encode_batch_orders(&orders).unwrap();
        assert_eq!(
            encoded,
            r#"[{"symbol":"BTCUSDT","side":"BUY","type":"LIMIT","timeInForce":"GTC","quantity":"0.001","price":"20000"},{"symbol":"BTCUSDT","side":"SELL","type":"MARKET","quantity":"1","reduceOnly":"true"}]"#
        );
    }

    #[test]
    fn test_order_ref_selects_key() {
        let by_id = OrderRef::from(42_u64).apply(Params::new());
        assert!(by_id.contains_key("orderId"));
        let by_client = OrderRef::from("my-order").apply(Params::new());
        assert!(by_client.contains_key("origClientOrderId"));
    }
}
