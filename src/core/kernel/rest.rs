use crate::core::errors::ExchangeError;
use crate::core::kernel::classifier::check_response;
use crate::core::kernel::context::SharedContext;
use crate::core::kernel::signer::{shifted_timestamp, Signer};
use crate::core::types::{ApiResponse, Params, RequestDescriptor};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, trace, warn};

pub const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";
pub const ORDER_COUNT_HEADER: &str = "X-MBX-ORDER-COUNT-1M";

/// REST client trait for making HTTP requests
///
/// `execute` is the only required method; the verb helpers build a
/// [`RequestDescriptor`] and delegate to it.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Issue one logical request, signing it when `request.private` is set.
    ///
    /// Public requests survive transient transport failures through the
    /// reconnect loop; private requests never do.
    async fn execute(&self, request: RequestDescriptor) -> Result<ApiResponse, ExchangeError>;

    /// Make a GET request
    async fn get(
        &self,
        operation: &str,
        path: &str,
        params: Params,
        private: bool,
    ) -> Result<ApiResponse, ExchangeError> {
        self.execute(describe(Method::GET, operation, path, params, private))
            .await
    }

    /// Make a POST request
    async fn post(
        &self,
        operation: &str,
        path: &str,
        params: Params,
        private: bool,
    ) -> Result<ApiResponse, ExchangeError> {
        self.execute(describe(Method::POST, operation, path, params, private))
            .await
    }

    /// Make a PUT request
    async fn put(
        &self,
        operation: &str,
        path: &str,
        params: Params,
        private: bool,
    ) -> Result<ApiResponse, ExchangeError> {
        self.execute(describe(Method::PUT, operation, path, params, private))
            .await
    }

    /// Make a DELETE request
    async fn delete(
        &self,
        operation: &str,
        path: &str,
        params: Params,
        private: bool,
    ) -> Result<ApiResponse, ExchangeError> {
        self.execute(describe(Method::DELETE, operation, path, params, private))
            .await
    }

    /// Execute and deserialize the payload into `T`
    async fn execute_json<T: DeserializeOwned + Send>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, ExchangeError> {
        self.execute(request).await?.into_typed()
    }
}

fn describe(
    method: Method,
    operation: &str,
    path: &str,
    params: Params,
    private: bool,
) -> RequestDescriptor {
    let request = RequestDescriptor::new(method, operation, path).params(params);
    if private {
        request.private()
    } else {
        request
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Baseline request timeout
    pub timeout: Duration,
    /// Added to the timeout on every consecutive transport failure
    pub timeout_step: Duration,
    /// Base sleep before a reconnect attempt
    pub reconnect_delay: Duration,
    /// Added to the sleep per consecutive failure
    pub reconnect_step: Duration,
    /// Consecutive transport failures tolerated on public requests
    pub max_reconnect_attempts: u32,
    /// Attach rate-limit usage to responses
    pub show_limit_usage: bool,
    /// Attach raw headers to responses
    pub show_header: bool,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout: Duration::from_secs(5),
            timeout_step: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(5),
            reconnect_step: Duration::from_secs(1),
            max_reconnect_attempts: 10,
            show_limit_usage: false,
            show_header: false,
            user_agent: crate::core::config::DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_step(mut self, step: Duration) -> Self {
        self.timeout_step = step;
        self
    }

    /// Set the reconnect backoff: `delay + failures * step`
    pub fn with_reconnect_backoff(mut self, delay: Duration, step: Duration) -> Self {
        self.reconnect_delay = delay;
        self.reconnect_step = step;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_limit_usage(mut self, show: bool) -> Self {
        self.show_limit_usage = show;
        self
    }

    pub fn with_header(mut self, show: bool) -> Self {
        self.show_header = show;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Consecutive transport failures of one client and the timeout the next
/// attempt will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    pub failures: u32,
    pub timeout: Duration,
}

impl ReconnectState {
    pub fn new(baseline: Duration) -> Self {
        Self {
            failures: 0,
            timeout: baseline,
        }
    }

    /// Record a transport failure.
    ///
    /// Returns the sleep before the next attempt, or `None` once `max` is exceeded.
    pub fn register_failure(&mut self, config: &RestClientConfig) -> Option<Duration> {
        if self.failures >= config.max_reconnect_attempts {
            self.failures += 1;
            return None;
        }
        self.failures += 1;
        self.timeout += config.timeout_step;
        Some(config.reconnect_delay + config.reconnect_step * self.failures)
    }

    pub fn reset(&mut self, baseline: Duration) {
        self.failures = 0;
        self.timeout = baseline;
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    context: Option<Arc<SharedContext>>,
}

impl RestClientBuilder {
    /// Create a new builder with the given configuration
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
            context: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Use a private clock-shift / rate-limit context instead of the global one
    pub fn with_context(mut self, context: Arc<SharedContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the REST client
    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        if self.config.base_url.is_empty() {
            return Err(ExchangeError::ConfigurationError(
                "Base URL must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        let reconnect = ReconnectState::new(self.config.timeout);
        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
            context: self.context.unwrap_or_else(SharedContext::global),
            reconnect: Arc::new(Mutex::new(reconnect)),
        })
    }
}

/// Request Executor on top of reqwest
///
/// Clones share the reconnect counters; all clients built from the same
/// context share clock shift and rate-limit weight.
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    context: Arc<SharedContext>,
    reconnect: Arc<Mutex<ReconnectState>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .field("reconnect", &self.reconnect_state())
            .finish_non_exhaustive()
    }
}

/// Raw outcome of one HTTP exchange.
struct RawResponse {
    headers: HeaderMap,
    body: String,
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<SharedContext> {
        &self.context
    }

    /// Snapshot of the reconnect counters
    pub fn reconnect_state(&self) -> ReconnectState {
        *self
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Last rate-limit weight reported by the exchange
    pub fn used_weight(&self) -> u64 {
        self.context.used_weight()
    }

    fn with_reconnect<T>(&self, f: impl FnOnce(&mut ReconnectState) -> T) -> T {
        let mut state = self
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Build the full URL for an endpoint
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Prefer the used-weight header; fall back to order count when it is zero or absent
    fn extract_weight(headers: &HeaderMap) -> Option<u64> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        read(USED_WEIGHT_HEADER)
            .filter(|w| *w > 0)
            .or_else(|| read(ORDER_COUNT_HEADER))
    }

    fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect()
    }

    /// Sign (if private) and send one attempt. Errors are transport-level only.
    async fn send_once(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<RawResponse, ExchangeError> {
        let url = self.build_url(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .timeout(timeout);

        let params = if request.private {
            let signer = self.signer.as_ref().ok_or_else(|| {
                ExchangeError::ConfigurationError(format!(
                    "{} requires an API key and secret",
                    request.operation
                ))
            })?;
            let timestamp = shifted_timestamp(self.context.clock_shift());
            let (headers, signed) = signer.sign_request(&request.params, timestamp)?;
            for (key, value) in headers {
                builder = builder.header(key, value);
            }
            signed
        } else {
            if let Some(signer) = &self.signer {
                for (key, value) in signer.auth_headers() {
                    builder = builder.header(key, value);
                }
            }
            request.params.clone()
        };

        let pairs = params.to_pairs();
        builder = if request.method == Method::GET {
            let builder = builder.header(CONTENT_TYPE, "application/json");
            if pairs.is_empty() {
                builder
            } else {
                builder.query(&pairs)
            }
        } else if pairs.is_empty() {
            builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        } else {
            builder.form(&pairs)
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(format!("Request failed: {}", e)))?;
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        Ok(RawResponse { headers, body })
    }

    async fn handle_response(
        &self,
        request: &RequestDescriptor,
        raw: RawResponse,
        started: Instant,
    ) -> Result<ApiResponse, ExchangeError> {
        if let Some(weight) = Self::extract_weight(&raw.headers) {
            self.context.record_used_weight(weight);
        }
        self.with_reconnect(|state| state.reset(self.config.timeout));

        debug!(
            operation = %request.operation,
            latency_ms = started.elapsed().as_millis() as u64,
            used_weight = self.context.used_weight(),
            "Request completed"
        );
        trace!("Response body: {}", raw.body);

        let data: Value = serde_json::from_str(&raw.body)
            .map_err(|_| ExchangeError::DecodeError { body: raw.body })?;

        check_response(&data, &self.context).await?;

        let mut response = ApiResponse::new(data);
        if self.config.show_limit_usage {
            response.limit_usage = Some(self.context.used_weight());
        }
        if self.config.show_header {
            response.header = Some(Self::header_map(&raw.headers));
        }
        Ok(response)
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(
        skip(self, request),
        fields(
            exchange = %self.config.exchange_name,
            method = %request.method,
            operation = %request.operation,
            endpoint = %request.path,
            private = request.private
        )
    )]
    async fn execute(&self, request: RequestDescriptor) -> Result<ApiResponse, ExchangeError> {
        if request.private && self.signer.is_none() {
            return Err(ExchangeError::ConfigurationError(format!(
                "{} requires an API key and secret",
                request.operation
            )));
        }

        loop {
            let timeout = self.with_reconnect(|state| state.timeout);
            let started = Instant::now();

            match self.send_once(&request, timeout).await {
                Ok(raw) => return self.handle_response(&request, raw, started).await,
                Err(e @ (ExchangeError::ConfigurationError(_) | ExchangeError::AuthError(_))) => {
                    return Err(e);
                }
                Err(e) if request.private => {
                    warn!(error = %e, "Transport failure on signed request, not retrying");
                    return Err(ExchangeError::ConnectorError(e.to_string()));
                }
                Err(e) => {
                    let next = self.with_reconnect(|state| {
                        state
                            .register_failure(&self.config)
                            .map(|sleep| (sleep, state.failures))
                    });
                    match next {
                        Some((sleep, attempt)) => {
                            warn!(
                                host = %self.config.base_url,
                                attempt,
                                sleep_ms = sleep.as_millis() as u64,
                                error = %e,
                                "Unable to connect, retrying"
                            );
                            tokio::time::sleep(sleep).await;
                        }
                        None => {
                            let attempts = self.with_reconnect(|state| {
                                let attempts = state.failures;
                                state.reset(self.config.timeout);
                                attempts
                            });
                            error!(attempts, error = %e, "Reconnect attempts exhausted");
                            return Err(ExchangeError::RetriesExhausted {
                                attempts,
                                last_error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RestClientConfig {
        RestClientConfig::new("https://fapi.binance.com".to_string(), "binance_perp".to_string())
    }

    #[test]
    fn test_reconnect_backoff_grows() {
        let config = config();
        let mut state = ReconnectState::new(config.timeout);

        let first_sleep = state.register_failure(&config).unwrap();
        let first_timeout = state.timeout;
        assert_eq!(first_sleep, Duration::from_secs(6));
        assert_eq!(first_timeout, Duration::from_secs(7));

        for _ in 1..9 {
            state.register_failure(&config).unwrap();
        }
        assert_eq!(state.failures, 9);
        assert!(state.timeout > first_timeout);

        let tenth = state.register_failure(&config).unwrap();
        assert_eq!(tenth, Duration::from_secs(15));
        assert_eq!(state.timeout, Duration::from_secs(25));

        // 11th consecutive failure is fatal
        assert!(state.register_failure(&config).is_none());
    }

    #[test]
    fn test_reset_restores_baseline() {
        let config = config();
        let mut state = ReconnectState::new(config.timeout);
        state.register_failure(&config);
        state.register_failure(&config);
        state.reset(config.timeout);
        assert_eq!(state, ReconnectState::new(Duration::from_secs(5)));
    }

    #[test]
    fn test_extract_weight_prefers_used_weight() {
        let mut headers = HeaderMap::new();
        headers.insert(USED_WEIGHT_HEADER, "17".parse().unwrap());
        headers.insert(ORDER_COUNT_HEADER, "3".parse().unwrap());
        assert_eq!(ReqwestRest::extract_weight(&headers), Some(17));

        headers.insert(USED_WEIGHT_HEADER, "0".parse().unwrap());
        assert_eq!(ReqwestRest::extract_weight(&headers), Some(3));

        assert_eq!(ReqwestRest::extract_weight(&HeaderMap::new()), None);
    }

    #[test]
    fn test_build_rejects_empty_base_url() {
        let config = RestClientConfig::new(String::new(), "binance_perp".to_string());
        assert!(matches!(
            RestClientBuilder::new(config).build(),
            Err(ExchangeError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_private_without_signer_is_configuration_error() {
        let rest = RestClientBuilder::new(config())
            .with_context(Arc::new(SharedContext::new()))
            .build()
            .unwrap();
        let err = rest
            .get("get_private_balance", "/fapi/v2/balance", Params::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ConfigurationError(_)));
        assert_eq!(rest.reconnect_state().failures, 0);
    }
}
