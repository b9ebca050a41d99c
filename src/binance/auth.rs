//! Request signing for the Binance REST API

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::common::errors::{Result, TradeError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on every signed request
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Sign a query string with HMAC-SHA256
///
/// Binance expects the lowercase hex digest of the exact query string sent,
/// keyed by the raw API secret.
pub fn sign_query(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TradeError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Current time in epoch milliseconds, as sent in the `timestamp` parameter
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
