//! Field access for JSON stream frames.
//!
//! Venues send numbers either as JSON numbers or as strings. Every accessor
//! here fails with `Decode` instead of defaulting, so a malformed field is
//! never mistaken for a zero price.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{Error, Result};

/// Longest raw payload quoted in a decode error.
pub const MAX_QUOTED: usize = 256;

/// Cut `raw` to at most `max` bytes on a char boundary.
#[must_use]
pub fn truncate(raw: &str, max: usize) -> &str {
    if raw.len() <= max {
        return raw;
    }
    let mut end = max;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

/// A parsed frame.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    value: &'a Value,
}

impl<'a> Frame<'a> {
    #[must_use]
    pub const fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Parse text into an owned value.
    ///
    /// # Errors
    ///
    /// Returns `Decode` quoting at most [`MAX_QUOTED`] bytes of the input.
    pub fn parse(raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|e| {
            Error::Decode(format!("{e}: {}", truncate(raw, MAX_QUOTED)))
        })
    }

    #[must_use]
    pub fn value(&self) -> &'a Value {
        self.value
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Frame<'a>> {
        self.value.get(key).filter(|v| !v.is_null()).map(Frame::new)
    }

    /// # Errors
    ///
    /// Returns `Decode` if the field is absent.
    pub fn field(&self, key: &str) -> Result<Frame<'a>> {
        self.get(key)
            .ok_or_else(|| Error::Decode(format!("missing field {key}")))
    }

    /// # Errors
    ///
    /// Returns `Decode` if the value is not a string.
    pub fn as_str(&self) -> Result<&'a str> {
        self.value
            .as_str()
            .ok_or_else(|| Error::Decode(format!("expected string, got {}", self.value)))
    }

    /// # Errors
    ///
    /// Returns `Decode` if the value is not an integer or integer string.
    pub fn as_i64(&self) -> Result<i64> {
        match self.value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::Decode(format!("expected integer, got {}", self.value)))
    }

    /// Decimal from a JSON number or numeric string.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for any other shape.
    pub fn as_decimal(&self) -> Result<Decimal> {
        let parsed = match self.value {
            Value::Number(n) => {
                let text = n.to_string();
                Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text))
            }
            Value::String(s) => Decimal::from_str(s.trim()),
            _ => return Err(Error::Decode(format!("expected decimal, got {}", self.value))),
        };
        parsed.map_err(|e| Error::Decode(format!("bad decimal {}: {e}", self.value)))
    }

    /// Milliseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for non-integers and out-of-range timestamps.
    pub fn as_millis(&self) -> Result<DateTime<Utc>> {
        let ms = self.as_i64()?;
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| Error::Decode(format!("timestamp {ms} out of range")))
    }

    pub fn decimal(&self, key: &str) -> Result<Decimal> {
        self.field(key)?.as_decimal()
    }

    pub fn string(&self, key: &str) -> Result<&'a str> {
        self.field(key)?.as_str()
    }

    /// Array elements.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the value is not an array.
    pub fn items(&self) -> Result<Vec<Frame<'a>>> {
        self.value
            .as_array()
            .map(|a| a.iter().map(Frame::new).collect())
            .ok_or_else(|| Error::Decode(format!("expected array, got {}", self.value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn decimals_from_numbers_and_strings() {
        let v = json!({ "a": 1.25, "b": "0.0001", "c": true, "d": null });
        let f = Frame::new(&v);
        assert_eq!(f.decimal("a").unwrap(), dec!(1.25));
        assert_eq!(f.decimal("b").unwrap(), dec!(0.0001));
        assert!(f.decimal("c").is_err());
        assert!(f.decimal("d").is_err());
        assert!(f.decimal("missing").is_err());
    }

    #[test]
    fn garbage_string_is_an_error_not_zero() {
        let v = json!({ "p": "abc" });
        assert!(Frame::new(&v).decimal("p").is_err());
    }

    #[test]
    fn parse_error_quotes_truncated_payload() {
        let raw = format!("{{{}", "x".repeat(1000));
        let err = Frame::parse(&raw).unwrap_err().to_string();
        assert!(err.len() < 400);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
