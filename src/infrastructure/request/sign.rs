//! Authentication hooks and HMAC helpers for venue signing schemes.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};
use crate::infrastructure::config::Credentials;
use crate::port::outbound::transport::Method;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Everything a venue needs to compute its authentication headers.
#[derive(Debug)]
pub struct SignContext<'a> {
    pub method: Method,
    pub path: &'a str,
    /// Encoded query string without the leading `?`.
    pub query: &'a mut String,
    pub headers: &'a mut BTreeMap<String, String>,
    pub body: Option<&'a [u8]>,
    pub nonce: Option<i64>,
    pub credentials: &'a Credentials,
}

/// Venue-supplied request hooks.
pub trait RequestSigner: Send + Sync {
    /// Add authentication to the request in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature cannot be produced.
    fn sign(&self, ctx: SignContext<'_>) -> Result<()>;

    /// Translate a non-2xx body into a structured venue error.
    fn venue_error(&self, _status: u16, _body: &[u8]) -> Option<Error> {
        None
    }
}

fn mac_error(_: hmac::digest::InvalidLength) -> Error {
    Error::InvalidInput("invalid HMAC key length".into())
}

fn sha256(secret: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(mac_error)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha512(secret: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha512::new_from_slice(secret).map_err(mac_error)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// # Errors
///
/// Returns `InvalidInput` if the key is rejected.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> Result<String> {
    Ok(hex::encode(sha256(secret, message)?))
}

/// # Errors
///
/// Returns `InvalidInput` if the key is rejected.
pub fn hmac_sha512_hex(secret: &[u8], message: &[u8]) -> Result<String> {
    Ok(hex::encode(sha512(secret, message)?))
}

/// # Errors
///
/// Returns `InvalidInput` if the key is rejected.
pub fn hmac_sha256_base64(secret: &[u8], message: &[u8]) -> Result<String> {
    Ok(BASE64.encode(sha256(secret, message)?))
}

/// # Errors
///
/// Returns `InvalidInput` if the key is rejected.
pub fn hmac_sha512_base64(secret: &[u8], message: &[u8]) -> Result<String> {
    Ok(BASE64.encode(sha512(secret, message)?))
}

/// Decode a base64 secret, as some venues issue them.
///
/// # Errors
///
/// Returns `InvalidInput` when the secret is not base64.
pub fn decode_base64_secret(secret: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(secret.trim())
        .map_err(|e| Error::InvalidInput(format!("secret is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_rfc4231_case_2() {
        let mac = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn sha512_matches_rfc4231_case_2() {
        let mac = hmac_sha512_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert!(
            mac.starts_with("164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554")
        );
    }

    #[test]
    fn base64_round_trips_secret() {
        let encoded = hmac_sha256_base64(b"k", b"m").unwrap();
        assert_eq!(decode_base64_secret(&encoded).unwrap().len(), 32);
        assert!(decode_base64_secret("not base64!").is_err());
    }
}
