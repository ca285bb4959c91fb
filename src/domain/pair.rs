//! Currency codes and trading pairs.
//!
//! A [`Pair`]'s identity is its base and quote [`Currency`]; the delimiter it
//! was parsed with is kept only to reproduce the original formatting.
//! Venue-specific spelling goes through [`PairFormat`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Delimiters tried, in order, when parsing a pair without an explicit format.
pub const KNOWN_DELIMITERS: [&str; 5] = ["-", "_", "/", ":", "."];

/// Default delimiter when a pair is rendered for configuration.
pub const DEFAULT_DELIMITER: &str = "-";

/// Uppercase currency code, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Currency(String);

impl Currency {
    /// Create a code, normalising to uppercase and trimming whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// Formatting rules for rendering and parsing pairs on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairFormat {
    #[serde(default)]
    pub uppercase: bool,
    #[serde(default)]
    pub delimiter: String,
    /// List separator used when several pairs are joined into one string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub separator: String,
    /// Quote currency that groups a market, e.g. `USDT` in `BTCUSDT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

impl PairFormat {
    #[must_use]
    pub fn new(delimiter: impl Into<String>, uppercase: bool) -> Self {
        Self {
            uppercase,
            delimiter: delimiter.into(),
            separator: String::new(),
            index: None,
        }
    }

    #[must_use]
    pub fn with_index(index: impl Into<String>, uppercase: bool) -> Self {
        Self {
            uppercase,
            delimiter: String::new(),
            separator: String::new(),
            index: Some(index.into()),
        }
    }

    /// Render a pair. Index formats omit the delimiter.
    #[must_use]
    pub fn format(&self, pair: &Pair) -> String {
        let delimiter = if self.index.is_some() {
            ""
        } else {
            self.delimiter.as_str()
        };
        let raw = format!("{}{}{}", pair.base, delimiter, pair.quote);
        if self.uppercase {
            raw.to_ascii_uppercase()
        } else {
            raw.to_ascii_lowercase()
        }
    }

    /// Parse a string produced by [`format`](Self::format).
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` when neither an index nor a delimiter is set, or
    /// when the string cannot be split by them.
    pub fn parse(&self, raw: &str) -> Result<Pair> {
        if let Some(index) = &self.index {
            return Pair::from_index(raw, index);
        }
        if self.delimiter.is_empty() {
            return Err(Error::InvalidPair(format!(
                "cannot parse {raw:?} without a delimiter or index"
            )));
        }
        Pair::from_delimited(raw, &self.delimiter)
    }
}

/// A base/quote currency pair.
#[derive(Debug, Clone, Default)]
pub struct Pair {
    pub base: Currency,
    pub quote: Currency,
    pub delimiter: Option<String>,
}

impl Pair {
    /// Create a pair from two codes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` if either side is empty or both sides are equal.
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Result<Self> {
        let base = base.into();
        let quote = quote.into();
        if base.is_empty() || quote.is_empty() {
            return Err(Error::InvalidPair(format!(
                "base {base:?} and quote {quote:?} must both be set"
            )));
        }
        if base == quote {
            return Err(Error::InvalidPair(format!("base and quote are both {base}")));
        }
        Ok(Self {
            base,
            quote,
            delimiter: None,
        })
    }

    /// Create a pair that remembers the delimiter it should render with.
    ///
    /// # Errors
    ///
    /// Same as [`Pair::new`].
    pub fn with_delimiter(
        base: impl Into<Currency>,
        quote: impl Into<Currency>,
        delimiter: impl Into<String>,
    ) -> Result<Self> {
        let mut pair = Self::new(base, quote)?;
        pair.delimiter = Some(delimiter.into());
        Ok(pair)
    }

    /// Parse `BASE<delimiter>QUOTE`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` when the split yields fewer than two tokens.
    pub fn from_delimited(raw: &str, delimiter: &str) -> Result<Self> {
        if delimiter.is_empty() {
            return Err(Error::InvalidPair("delimiter is empty".into()));
        }
        let mut parts = raw.splitn(2, delimiter);
        match (parts.next(), parts.next()) {
            (Some(base), Some(quote)) if !base.is_empty() && !quote.is_empty() => {
                Self::with_delimiter(base, quote, delimiter)
            }
            _ => Err(Error::InvalidPair(format!(
                "{raw:?} does not split into two tokens on {delimiter:?}"
            ))),
        }
    }

    /// Parse an undelimited symbol grouped by `index`, e.g. `BTCUSDT` with `USDT`.
    ///
    /// A trailing index is the quote, so `WBTCBTC` with `BTC` is `WBTC/BTC`.
    /// Otherwise a leading index is the base.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` when `index` does not occur in `raw`.
    pub fn from_index(raw: &str, index: &str) -> Result<Self> {
        let upper = raw.to_ascii_uppercase();
        let index = index.to_ascii_uppercase();
        if index.is_empty() {
            return Err(Error::InvalidPair("index is empty".into()));
        }
        if upper.len() > index.len() && upper.ends_with(&index) {
            let at = upper.len() - index.len();
            return Self::new(&upper[..at], &upper[at..]);
        }
        if upper.starts_with(&index) {
            return Self::new(&upper[..index.len()], &upper[index.len()..]);
        }
        match upper.find(&index) {
            Some(at) => Self::new(&upper[..at], &upper[at..]),
            None => Err(Error::InvalidPair(format!(
                "index {index} not found in {raw:?}"
            ))),
        }
    }

    /// True when neither side is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.quote.is_empty()
    }

    /// Render using the target format.
    #[must_use]
    pub fn format(&self, format: &PairFormat) -> String {
        format.format(self)
    }

    /// The same pair with base and quote swapped.
    #[must_use]
    pub fn swap(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
            delimiter: self.delimiter.clone(),
        }
    }

    /// Compare with another pair, optionally allowing the swapped orientation.
    #[must_use]
    pub fn equal_including_reciprocal(&self, other: &Self) -> bool {
        self == other || (self.base == other.quote && self.quote == other.base)
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.quote == other.quote
    }
}

impl Eq for Pair {}

impl Hash for Pair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.quote.hash(state);
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delimiter = self.delimiter.as_deref().unwrap_or("");
        write!(f, "{}{}{}", self.base, delimiter, self.quote)
    }
}

impl FromStr for Pair {
    type Err = Error;

    /// Parse with the first known delimiter present, falling back to a
    /// three-letter base for undelimited symbols.
    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some(delimiter) = KNOWN_DELIMITERS.iter().find(|d| raw.contains(**d)) {
            return Self::from_delimited(raw, delimiter);
        }
        if raw.len() < 6 || !raw.is_ascii() {
            return Err(Error::InvalidPair(format!(
                "{raw:?} has no delimiter and is too short to split"
            )));
        }
        Self::new(&raw[..3], &raw[3..])
    }
}

impl Serialize for Pair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let delimiter = self.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
        serializer.serialize_str(&format!("{}{}{}", self.base, delimiter, self.quote))
    }
}

impl<'de> Deserialize<'de> for Pair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Ordered list of pairs without duplicates.
///
/// Serialised as a comma-joined string, the legacy config representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairs(Vec<Pair>);

impl Pairs {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a separator-joined list of pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` if any entry fails to parse.
    pub fn parse_list(raw: &str, separator: &str) -> Result<Self> {
        let separator = if separator.is_empty() { "," } else { separator };
        let mut pairs = Self::new();
        for item in raw.split(separator).map(str::trim).filter(|s| !s.is_empty()) {
            pairs.add(item.parse()?);
        }
        Ok(pairs)
    }

    /// Add a pair; returns false if it was already present.
    pub fn add(&mut self, pair: Pair) -> bool {
        if self.contains(&pair) {
            return false;
        }
        self.0.push(pair);
        true
    }

    /// Remove a pair; returns false if it was absent.
    pub fn remove(&mut self, pair: &Pair) -> bool {
        let before = self.0.len();
        self.0.retain(|p| p != pair);
        before != self.0.len()
    }

    #[must_use]
    pub fn contains(&self, pair: &Pair) -> bool {
        self.0.iter().any(|p| p == pair)
    }

    /// True when every pair in `other` is present in `self`.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.iter().all(|p| self.contains(p))
    }

    /// Pairs in `self` that are missing from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.iter().filter(|p| !other.contains(p)).cloned().collect())
    }

    /// Find the pair whose formatted symbol matches `symbol`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` when no pair matches.
    pub fn derive_from(&self, symbol: &str, format: &PairFormat) -> Result<Pair> {
        self.0
            .iter()
            .find(|p| format.format(p).eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| Error::InvalidPair(format!("{symbol} does not match any known pair")))
    }

    /// Render the list with one format and its separator.
    #[must_use]
    pub fn join(&self, format: &PairFormat) -> String {
        let separator = if format.separator.is_empty() {
            ","
        } else {
            format.separator.as_str()
        };
        self.0
            .iter()
            .map(|p| format.format(p))
            .collect::<Vec<_>>()
            .join(separator)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pair> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Pair] {
        &self.0
    }
}

impl FromIterator<Pair> for Pairs {
    fn from_iter<I: IntoIterator<Item = Pair>>(iter: I) -> Self {
        let mut pairs = Self::new();
        for pair in iter {
            pairs.add(pair);
        }
        pairs
    }
}

impl IntoIterator for Pairs {
    type Item = Pair;
    type IntoIter = std::vec::IntoIter<Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Pairs {
    type Item = &'a Pair;
    type IntoIter = std::slice::Iter<'a, Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Pairs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let joined = self
            .0
            .iter()
            .map(|p| {
                let delimiter = p.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
                format!("{}{}{}", p.base, delimiter, p.quote)
            })
            .collect::<Vec<_>>()
            .join(",");
        serializer.serialize_str(&joined)
    }
}

impl<'de> Deserialize<'de> for Pairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_list(&raw, ",").map_err(D::Error::custom)
    }
}
