//! Time-based one-time passwords for withdrawal confirmation.

use totp_rs::{Algorithm, Secret, TOTP};
use tracing::debug;

use crate::error::{Error, Result};

/// RFC 6238 generator: SHA1, 6 digits, 30 second step.
pub struct Otp {
    venue: String,
    totp: TOTP,
}

impl Otp {
    /// Build from a base32 secret. Spaces and case are ignored.
    ///
    /// # Errors
    ///
    /// Returns `OtpRejected` if the secret is not valid base32 or too short.
    pub fn from_secret(venue: &str, secret: &str) -> Result<Self> {
        let normalised = secret.trim().replace(' ', "").to_uppercase();
        let rejected = |reason: String| Error::OtpRejected {
            venue: venue.to_string(),
            reason,
        };
        let bytes = Secret::Encoded(normalised)
            .to_bytes()
            .map_err(|e| rejected(format!("invalid secret: {e:?}")))?;
        let totp = TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes)
            .map_err(|e| rejected(format!("invalid secret: {e}")))?;
        Ok(Self {
            venue: venue.to_string(),
            totp,
        })
    }

    /// Code for the current time step.
    ///
    /// # Errors
    ///
    /// Returns `OtpRejected` if the system clock is before the Unix epoch.
    pub fn current(&self) -> Result<String> {
        let code = self.totp.generate_current().map_err(|e| Error::OtpRejected {
            venue: self.venue.clone(),
            reason: format!("system clock: {e}"),
        })?;
        debug!(venue = %self.venue, "Generated one-time password");
        Ok(code)
    }

    #[must_use]
    pub fn at(&self, unix_secs: u64) -> String {
        self.totp.generate(unix_secs)
    }
}

impl std::fmt::Debug for Otp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Otp").field("venue", &self.venue).finish_non_exhaustive()
    }
}
