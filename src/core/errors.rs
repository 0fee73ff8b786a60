use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared by the REST core, the WebSocket session and the
/// listen-key manager.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i64, message: String },

    /// Code -1021. The shared clock shift has already been corrected by one
    /// second; the request must be signed again before it is resent.
    #[error("Timestamp outside recvWindow (-1021): {message}")]
    TimestampOutsideRecvWindow { message: String },

    /// Code -1003. The ban wait has already been slept when this is returned.
    #[error("IP banned (-1003), waited {wait:?}: {message}")]
    IpBanned { wait: Duration, message: String },

    /// Response body could not be decoded as JSON.
    #[error("Failed to decode response body: {body}")]
    DecodeError { body: String },

    /// Transport failure on a signed request. Never retried.
    #[error("Connector error: {0}")]
    ConnectorError(String),

    #[error("Giving up after {attempts} consecutive connection failures: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// Exchange error code, when the error came from a decoded envelope.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::TimestampOutsideRecvWindow { .. } => Some(-1021),
            Self::IpBanned { .. } => Some(-1003),
            _ => None,
        }
    }

    /// Whether resending the same operation can succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TimestampOutsideRecvWindow { .. } | Self::IpBanned { .. } | Self::NetworkError(_)
        )
    }
}
