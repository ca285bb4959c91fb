//! Asset classes and the per-venue pair stores.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pair::{Pair, PairFormat, Pairs};
use crate::error::{Error, Result};

/// Instrument category within a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Spot,
    Margin,
    Futures,
    #[serde(rename = "perpetualswap")]
    PerpetualSwap,
    Index,
    Binary,
}

impl AssetClass {
    pub const ALL: [AssetClass; 6] = [
        AssetClass::Spot,
        AssetClass::Margin,
        AssetClass::Futures,
        AssetClass::PerpetualSwap,
        AssetClass::Index,
        AssetClass::Binary,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Margin => "margin",
            Self::Futures => "futures",
            Self::PerpetualSwap => "perpetualswap",
            Self::Index => "index",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| Error::InvalidAsset(s.to_string()))
    }
}

/// Enabled and available pairs for one asset class on one venue.
///
/// `enabled` is always a subset of `available`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStore {
    /// `None` means the operator has not decided; only `Some(false)` blocks use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_enabled: Option<bool>,
    #[serde(default)]
    pub enabled: Pairs,
    #[serde(default)]
    pub available: Pairs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_format: Option<PairFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_format: Option<PairFormat>,
}

impl PairStore {
    #[must_use]
    pub fn is_asset_enabled(&self) -> bool {
        self.asset_enabled != Some(false)
    }

    /// Drop enabled pairs that are no longer available.
    ///
    /// Returns the pairs that were removed.
    pub fn ensure_enabled_subset(&mut self) -> Pairs {
        let removed = self.enabled.difference(&self.available);
        for pair in &removed {
            self.enabled.remove(pair);
        }
        removed
    }
}

/// All pair stores for a venue, keyed by asset class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairManager {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_format: Option<PairFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_format: Option<PairFormat>,
    #[serde(default)]
    pub use_global_format: bool,
    #[serde(default)]
    pub pairs: BTreeMap<AssetClass, PairStore>,
}

impl PairManager {
    /// Asset classes with a store, in declaration order.
    #[must_use]
    pub fn assets(&self) -> Vec<AssetClass> {
        self.pairs.keys().copied().collect()
    }

    /// Asset classes whose store is not disabled.
    #[must_use]
    pub fn enabled_assets(&self) -> Vec<AssetClass> {
        self.pairs
            .iter()
            .filter(|(_, store)| store.is_asset_enabled())
            .map(|(asset, _)| *asset)
            .collect()
    }

    fn store(&self, asset: AssetClass) -> Result<&PairStore> {
        let store = self
            .pairs
            .get(&asset)
            .ok_or_else(|| Error::InvalidAsset(format!("{asset} has no pair store")))?;
        if !store.is_asset_enabled() {
            return Err(Error::InvalidAsset(format!("{asset} is disabled")));
        }
        Ok(store)
    }

    /// Pairs for an asset class; `enabled` selects the enabled subset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAsset` if the class has no store or is disabled.
    pub fn get_pairs(&self, asset: AssetClass, enabled: bool) -> Result<Pairs> {
        let store = self.store(asset)?;
        Ok(if enabled {
            store.enabled.clone()
        } else {
            store.available.clone()
        })
    }

    /// Replace the available or enabled pairs for an asset class.
    ///
    /// Storing available pairs prunes enabled pairs that disappeared; storing
    /// enabled pairs rejects any pair that is not available.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` when enabled pairs are not a subset of available.
    pub fn store_pairs(&mut self, asset: AssetClass, pairs: Pairs, enabled: bool) -> Result<()> {
        let store = self.pairs.entry(asset).or_default();
        if enabled {
            let missing = pairs.difference(&store.available);
            if !missing.is_empty() {
                return Err(Error::InvalidPair(format!(
                    "{} not available for {asset}",
                    missing.join(&PairFormat::new("-", true))
                )));
            }
            store.enabled = pairs;
        } else {
            store.available = pairs;
            let removed = store.ensure_enabled_subset();
            if !removed.is_empty() {
                warn!(
                    asset = %asset,
                    removed = %removed.join(&PairFormat::new("-", true)),
                    "Enabled pairs no longer available, disabling"
                );
            }
        }
        Ok(())
    }

    /// Enable a single available pair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPair` if the pair is not available.
    pub fn enable_pair(&mut self, asset: AssetClass, pair: Pair) -> Result<()> {
        let store = self.pairs.entry(asset).or_default();
        if !store.available.contains(&pair) {
            return Err(Error::InvalidPair(format!("{pair} not available for {asset}")));
        }
        store.enabled.add(pair);
        Ok(())
    }

    pub fn disable_pair(&mut self, asset: AssetClass, pair: &Pair) -> bool {
        self.pairs
            .get_mut(&asset)
            .is_some_and(|store| store.enabled.remove(pair))
    }

    #[must_use]
    pub fn is_asset_enabled(&self, asset: AssetClass) -> bool {
        self.pairs.get(&asset).is_some_and(PairStore::is_asset_enabled)
    }

    /// # Errors
    ///
    /// Returns `InvalidAsset` if the class has no store.
    pub fn set_asset_enabled(&mut self, asset: AssetClass, enabled: bool) -> Result<()> {
        let store = self
            .pairs
            .get_mut(&asset)
            .ok_or_else(|| Error::InvalidAsset(format!("{asset} has no pair store")))?;
        store.asset_enabled = Some(enabled);
        Ok(())
    }

    #[must_use]
    pub fn is_pair_enabled(&self, pair: &Pair, asset: AssetClass) -> bool {
        self.store(asset).is_ok_and(|s| s.enabled.contains(pair))
    }

    /// Request (wire) or config format for an asset, falling back to the
    /// venue-wide format.
    #[must_use]
    pub fn format(&self, asset: AssetClass, request: bool) -> PairFormat {
        let global = if request {
            &self.request_format
        } else {
            &self.config_format
        };
        if self.use_global_format {
            return global.clone().unwrap_or_default();
        }
        let per_asset = self.pairs.get(&asset).and_then(|s| {
            if request {
                s.request_format.clone()
            } else {
                s.config_format.clone()
            }
        });
        per_asset.or_else(|| global.clone()).unwrap_or_default()
    }

    /// Restore Enabled ⊆ Available for every store.
    pub fn ensure_enabled_subsets(&mut self) {
        for (asset, store) in &mut self.pairs {
            let removed = store.ensure_enabled_subset();
            if !removed.is_empty() {
                warn!(asset = %asset, count = removed.len(), "Pruned unavailable enabled pairs");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &str) -> Pairs {
        Pairs::parse_list(raw, ",").unwrap()
    }

    #[test]
    fn asset_class_parses_case_insensitively() {
        assert_eq!("SPOT".parse::<AssetClass>().unwrap(), AssetClass::Spot);
        assert_eq!(
            "perpetualswap".parse::<AssetClass>().unwrap(),
            AssetClass::PerpetualSwap
        );
        assert!(matches!(
            "options".parse::<AssetClass>(),
            Err(Error::InvalidAsset(_))
        ));
    }

    #[test]
    fn storing_available_prunes_enabled() {
        let mut manager = PairManager::default();
        manager
            .store_pairs(AssetClass::Spot, pairs("BTC-USD,ETH-USD"), false)
            .unwrap();
        manager
            .store_pairs(AssetClass::Spot, pairs("BTC-USD,ETH-USD"), true)
            .unwrap();
        manager
            .store_pairs(AssetClass::Spot, pairs("BTC-USD"), false)
            .unwrap();

        let enabled = manager.get_pairs(AssetClass::Spot, true).unwrap();
        assert_eq!(enabled, pairs("BTC-USD"));
    }

    #[test]
    fn enabled_must_be_available() {
        let mut manager = PairManager::default();
        manager
            .store_pairs(AssetClass::Spot, pairs("BTC-USD"), false)
            .unwrap();
        let result = manager.store_pairs(AssetClass::Spot, pairs("LTC-USD"), true);
        assert!(matches!(result, Err(Error::InvalidPair(_))));
    }

    #[test]
    fn disabled_asset_forbids_access() {
        let mut manager = PairManager::default();
        manager
            .store_pairs(AssetClass::Futures, pairs("BTC-USD"), false)
            .unwrap();
        manager.set_asset_enabled(AssetClass::Futures, false).unwrap();

        assert!(matches!(
            manager.get_pairs(AssetClass::Futures, false),
            Err(Error::InvalidAsset(_))
        ));
        assert!(!manager.is_pair_enabled(&"BTC-USD".parse().unwrap(), AssetClass::Futures));
        assert!(manager.enabled_assets().is_empty());
    }

    #[test]
    fn per_asset_format_overrides_global() {
        let mut manager = PairManager {
            request_format: Some(PairFormat::new("-", true)),
            ..Default::default()
        };
        manager.pairs.insert(
            AssetClass::Margin,
            PairStore {
                request_format: Some(PairFormat::new("_", false)),
                ..Default::default()
            },
        );
        assert_eq!(manager.format(AssetClass::Margin, true).delimiter, "_");
        assert_eq!(manager.format(AssetClass::Spot, true).delimiter, "-");

        manager.use_global_format = true;
        assert_eq!(manager.format(AssetClass::Margin, true).delimiter, "-");
    }
}
