use crate::core::kernel::signer::{hmac_sha256_hex, SignatureResult, Signer};
use crate::core::types::Params;
use std::collections::HashMap;
use std::fmt;
use zeroize::ZeroizeOnDrop;

/// Receive window sent with every signed request, in milliseconds.
pub const RECV_WINDOW_MS: u64 = 60_000;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// HMAC-SHA256 signer for USD-M futures `USER_DATA`/`TRADE` endpoints.
///
/// Appends `recvWindow`, `timestamp` and finally `signature`, where the
/// signature covers the url-encoded parameters in insertion order.
#[derive(Clone, ZeroizeOnDrop)]
pub struct BinancePerpSigner {
    #[zeroize(skip)]
    api_key: String,
    secret_key: String,
    #[zeroize(skip)]
    recv_window: u64,
}

impl fmt::Debug for BinancePerpSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinancePerpSigner")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl BinancePerpSigner {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key,
            recv_window: RECV_WINDOW_MS,
        }
    }

    #[must_use]
    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Signer for BinancePerpSigner {
    fn sign_request(&self, params: &Params, timestamp: u64) -> SignatureResult {
        let mut signed = params.clone();
        signed.insert("recvWindow", self.recv_window);
        signed.insert("timestamp", timestamp);

        let signature = hmac_sha256_hex(self.secret_key.as_bytes(), &signed.to_query_string())?;
        signed.insert("signature", signature);

        Ok((self.auth_headers(), signed))
    }

    fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(API_KEY_HEADER.to_string(), self.api_key.clone());
        headers
    }
}
