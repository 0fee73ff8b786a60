/// Kernel - resilient transport core
///
/// Everything here is exchange-agnostic plumbing; the endpoint surface in
/// `exchanges::binance_perp` only builds parameters and paths.
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient` / `ReqwestRest`: Request Executor with bounded reconnects
/// - `WsSession`: stream session with liveness pings and unbounded reconnects
/// - `UserDataSession`: listen-key creation, renewal and release
///
/// ## Authentication
/// - `Signer`: pluggable request signing
///
/// ## Recovery
/// - `classifier`: maps response envelopes to typed errors, corrects clock
///   skew and sleeps out IP bans
/// - `SharedContext`: clock shift and rate-limit weight shared across clients
///
/// # Usage
///
/// ## Public and signed REST calls
/// ```rust,no_run
/// use fapi_connector::core::kernel::*;
/// use fapi_connector::core::types::Params;
/// use fapi_connector::exchanges::binance_perp::BinancePerpSigner;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest_config = RestClientConfig::new(
///     "https://fapi.binance.com".to_string(),
///     "binance_perp".to_string(),
/// );
/// let signer = Arc::new(BinancePerpSigner::new("key".to_string(), "secret".to_string()));
/// let rest = RestClientBuilder::new(rest_config).with_signer(signer).build()?;
///
/// let time = rest.get("time", "/fapi/v1/time", Params::new(), false).await?;
/// let balance = rest.get("balance", "/fapi/v2/balance", Params::new(), true).await?;
/// # let _ = (time, balance);
/// # Ok(())
/// # }
/// ```
///
/// ## Streaming
/// ```rust,no_run
/// use fapi_connector::core::kernel::*;
/// use fapi_connector::core::errors::ExchangeError;
/// use serde_json::Value;
///
/// # async fn stream() -> Result<(), ExchangeError> {
/// let hosts = StreamHosts::new("wss://fstream.binance.com", "wss://fstream-auth.binance.com");
/// let session = WsSession::for_stream(
///     &hosts,
///     &StreamPath::from("btcusdt@aggTrade"),
///     None,
///     WsConfig::default(),
/// )?;
/// let mut handler = |event: Value| -> Result<(), ExchangeError> {
///     println!("{event}");
///     Ok(())
/// };
/// session.listen_forever(&mut handler).await
/// # }
/// ```
pub mod classifier;
pub mod context;
pub mod listen_key;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use classifier::{check_response, classify, Classification};
pub use context::SharedContext;
pub use listen_key::{ListenKeyApi, UserDataSession};
pub use rest::{ReconnectState, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{hmac_sha256_hex, shifted_timestamp, SignatureResult, Signer};
pub use ws::{QuitHandle, StreamHandler, StreamHosts, StreamPath, WsConfig, WsSession};
