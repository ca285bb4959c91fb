//! API key material for authenticated venue access.

use std::fmt;

use serde::{Deserialize, Serialize};

/// API key material. `Debug` never prints secrets.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "PEMKey")]
    pub pem_key: String,
    #[serde(rename = "otpSecret")]
    pub otp_secret: String,
    #[serde(rename = "tradePassword")]
    pub trade_password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// True when both key and secret are set.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }

    #[must_use]
    pub fn requires_otp(&self) -> bool {
        !self.otp_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &str| if s.is_empty() { "" } else { "***" };
        f.debug_struct("Credentials")
            .field("key", &mask(&self.key))
            .field("secret", &mask(&self.secret))
            .field("client_id", &self.client_id)
            .field("pem_key", &mask(&self.pem_key))
            .field("otp_secret", &mask(&self.otp_secret))
            .finish_non_exhaustive()
    }
}
