use crate::core::errors::ExchangeError;
use crate::core::types::Params;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Result type for signing operations: (headers, signed parameters)
pub type SignatureResult = Result<(HashMap<String, String>, Params), ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations are pure: the same parameters and timestamp always produce
/// the same headers and signed parameters. The caller owns the clock and the
/// clock-shift correction.
pub trait Signer: Send + Sync {
    /// Sign a parameter mapping
    ///
    /// # Arguments
    /// * `params` - Unsigned parameters in wire order
    /// * `timestamp` - Request timestamp in milliseconds, already shift-corrected
    ///
    /// # Returns
    /// Tuple of (headers, signed_params) to send with the request
    fn sign_request(&self, params: &Params, timestamp: u64) -> SignatureResult;

    /// Headers identifying the caller, sent on unsigned requests as well
    fn auth_headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Lowercase hex HMAC-SHA256 of `message` keyed by `secret`.
pub fn hmac_sha256_hex(secret: &[u8], message: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Current epoch milliseconds corrected by `clock_shift` seconds.
///
/// One extra second is subtracted so a local clock running slightly ahead of
/// the server does not produce timestamps from the future.
pub fn shifted_timestamp(clock_shift: i64) -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    (now_ms + (clock_shift - 1) * 1000).max(0) as u64
}
