//! `SIGNED` endpoint authentication.
//!
//! The query string gets a millisecond `timestamp` and a `recvWindow`, then
//! an HMAC-SHA256 hex `signature` over the whole string. The key travels in
//! the `X-MBX-APIKEY` header.

use chrono::Utc;

use super::dto::ApiError;
use crate::error::{Error, Result};
use crate::infrastructure::request::{hmac_sha256_hex, RequestSigner, SignContext};

const RECV_WINDOW_MS: u64 = 5000;

/// Binance error codes that mean the key or signature was refused.
const AUTH_CODES: [i64; 4] = [-1022, -2014, -2015, -1002];

#[derive(Debug, Clone)]
pub struct BinanceSigner {
    venue: String,
    recv_window_ms: u64,
}

impl BinanceSigner {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            recv_window_ms: RECV_WINDOW_MS,
        }
    }
}

impl RequestSigner for BinanceSigner {
    fn sign(&self, ctx: SignContext<'_>) -> Result<()> {
        let timestamp = ctx.nonce.unwrap_or_else(|| Utc::now().timestamp_millis());
        if !ctx.query.is_empty() {
            ctx.query.push('&');
        }
        ctx.query.push_str(&format!(
            "recvWindow={}&timestamp={timestamp}",
            self.recv_window_ms
        ));
        let signature = hmac_sha256_hex(ctx.credentials.secret.as_bytes(), ctx.query.as_bytes())?;
        ctx.query.push_str("&signature=");
        ctx.query.push_str(&signature);
        ctx.headers
            .insert("X-MBX-APIKEY".into(), ctx.credentials.key.clone());
        Ok(())
    }

    fn venue_error(&self, _status: u16, body: &[u8]) -> Option<Error> {
        let err: ApiError = serde_json::from_slice(body).ok()?;
        if AUTH_CODES.contains(&err.code) {
            return Some(Error::AuthRejected {
                venue: self.venue.clone(),
                reason: err.msg,
            });
        }
        Some(Error::Venue {
            venue: self.venue.clone(),
            code: err.code.to_string(),
            message: err.msg,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::Credentials;
    use crate::error::ErrorKind;
    use crate::port::Method;

    #[test]
    fn appends_timestamp_and_signature() {
        let signer = BinanceSigner::new("binance");
        let creds = Credentials::new("api-key", "secret");
        let mut query = "symbol=BTCUSDT".to_string();
        let mut headers = BTreeMap::new();
        signer
            .sign(SignContext {
                method: Method::Get,
                path: "/api/v3/account",
                query: &mut query,
                headers: &mut headers,
                body: None,
                nonce: Some(1_499_827_319_559),
                credentials: &creds,
            })
            .unwrap();

        let (signed, signature) = query.split_once("&signature=").unwrap();
        assert_eq!(
            signed,
            "symbol=BTCUSDT&recvWindow=5000&timestamp=1499827319559"
        );
        assert_eq!(
            signature,
            hmac_sha256_hex(b"secret", signed.as_bytes()).unwrap()
        );
        assert_eq!(headers["X-MBX-APIKEY"], "api-key");
    }

    #[test]
    fn maps_error_bodies() {
        let signer = BinanceSigner::new("binance");
        let err = signer
            .venue_error(401, br#"{"code":-2015,"msg":"Invalid API-key"}"#)
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::AuthRejected);

        let err = signer
            .venue_error(400, br#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .unwrap();
        assert!(matches!(err, Error::Venue { ref code, .. } if code == "-1121"));

        assert!(signer.venue_error(502, b"<html>").is_none());
    }
}
