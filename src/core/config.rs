use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_WS_RECONNECT_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LISTEN_KEY_KEEPALIVE: Duration = Duration::from_secs(55 * 60);
pub const DEFAULT_USER_AGENT: &str = "fapi-connector/0.1";

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub testnet: bool,
    pub base_url: Option<String>,
    /// Per-request HTTP timeout before any reconnect widening.
    pub timeout: Duration,
    /// Base sleep of the REST reconnect backoff.
    pub reconnect_delay: Duration,
    /// Attach the last reported rate-limit weight to every response.
    pub show_limit_usage: bool,
    /// Attach the raw response headers to every response.
    pub show_header: bool,
    pub reply_timeout: Duration,
    pub ping_timeout: Duration,
    pub ws_reconnect_delay: Duration,
    /// Bound on the TCP + TLS + WebSocket handshake of one connect attempt.
    pub ws_connect_timeout: Duration,
    pub listen_key_keepalive: Duration,
    pub user_agent: String,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 6)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("show_limit_usage", &self.show_limit_usage)?;
        state.serialize_field("show_header", &self.show_header)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            api_key: String,
            secret_key: String,
            #[serde(default)]
            testnet: bool,
            base_url: Option<String>,
            timeout_secs: Option<u64>,
            #[serde(default)]
            show_limit_usage: bool,
            #[serde(default)]
            show_header: bool,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        let mut config = Self::new(helper.api_key, helper.secret_key).testnet(helper.testnet);
        config.base_url = helper.base_url;
        config.show_limit_usage = helper.show_limit_usage;
        config.show_header = helper.show_header;
        if let Some(secs) = helper.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

impl ExchangeConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            testnet: false,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            show_limit_usage: false,
            show_header: false,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            ws_reconnect_delay: DEFAULT_WS_RECONNECT_DELAY,
            ws_connect_timeout: DEFAULT_WS_CONNECT_TIMEOUT,
            listen_key_keepalive: DEFAULT_LISTEN_KEY_KEEPALIVE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `BINANCE_API_KEY`)
    /// - `{PREFIX}_SECRET_KEY` (e.g., `BINANCE_SECRET_KEY`)
    /// - `{PREFIX}_TESTNET` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL` (optional)
    pub fn from_env(exchange_prefix: &str) -> Result<Self, ConfigError> {
        let prefix = exchange_prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let secret_key_var = format!("{}_SECRET_KEY", prefix);
        let testnet_var = format!("{}_TESTNET", prefix);
        let base_url_var = format!("{}_BASE_URL", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;

        let secret_key = env::var(&secret_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(secret_key_var))?;

        let testnet = env::var(&testnet_var)
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let mut config = Self::new(api_key, secret_key).testnet(testnet);
        config.base_url = env::var(&base_url_var).ok();
        Ok(config)
    }

    /// Load `.env` first (if present), then read the prefixed variables.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(exchange_prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(exchange_prefix, ".env")
    }

    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(
        exchange_prefix: &str,
        env_file_path: &str,
    ) -> Result<Self, ConfigError> {
        load_env_file(env_file_path)?;
        Self::from_env(exchange_prefix)
    }

    /// First of `.env.local`, `.env.{ENVIRONMENT}`, `.env` that exists, then
    /// the process environment.
    #[cfg(feature = "env-file")]
    pub fn from_env_auto(exchange_prefix: &str) -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let candidates = [
            ".env.local".to_string(),
            format!(".env.{}", environment),
            ".env".to_string(),
        ];
        for path in &candidates {
            if load_env_file(path)? {
                break;
            }
        }
        Self::from_env(exchange_prefix)
    }

    /// Configuration for public endpoints and market streams only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Check if this configuration has valid credentials for authenticated operations
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub const fn show_limit_usage(mut self, show: bool) -> Self {
        self.show_limit_usage = show;
        self
    }

    #[must_use]
    pub const fn show_header(mut self, show: bool) -> Self {
        self.show_header = show;
        self
    }

    #[must_use]
    pub const fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn ws_reconnect_delay(mut self, delay: Duration) -> Self {
        self.ws_reconnect_delay = delay;
        self
    }

    #[must_use]
    pub const fn ws_connect_timeout(mut self, timeout: Duration) -> Self {
        self.ws_connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn listen_key_keepalive(mut self, interval: Duration) -> Self {
        self.listen_key_keepalive = interval;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

/// `Ok(false)` when the file does not exist.
#[cfg(feature = "env-file")]
fn load_env_file(path: &str) -> Result<bool, ConfigError> {
    match dotenv::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::InvalidConfiguration(format!(
            "Failed to load env file '{}': {}",
            path, e
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
