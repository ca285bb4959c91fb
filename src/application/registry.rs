//! Venue registry and lifecycle.
//!
//! Venues are built from configuration through named factories, configured,
//! then started concurrently. A venue that fails to start is disabled and
//! the rest come up regardless.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::infrastructure::config::{Config, VenueConfig};
use crate::port::{MarketStore, Venue};

/// Builds one venue from its configuration entry.
pub type VenueFactory =
    Arc<dyn Fn(&VenueConfig, Arc<dyn MarketStore>) -> Result<Arc<dyn Venue>> + Send + Sync>;

/// Named venue constructors, looked up case-insensitively.
#[derive(Default, Clone)]
pub struct VenueFactories {
    factories: HashMap<String, VenueFactory>,
}

impl VenueFactories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&VenueConfig, Arc<dyn MarketStore>) -> Result<Arc<dyn Venue>> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
    }

    /// Register an already shared constructor.
    pub fn insert(&mut self, name: &str, factory: VenueFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VenueFactory> {
        self.factories.get(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for VenueFactories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("VenueFactories").field("names", &names).finish()
    }
}

/// Venues loaded for this engine, in configuration order.
#[derive(Default)]
pub struct Registry {
    venues: Vec<Arc<dyn Venue>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct and configure every enabled venue in `config`.
    ///
    /// Disabled entries are skipped. An entry that cannot be built or
    /// configured is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` when venues were enabled but none loaded.
    pub async fn bootstrap(
        config: &Config,
        factories: &VenueFactories,
        store: Arc<dyn MarketStore>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        let mut wanted = 0usize;
        for entry in &config.exchanges {
            if !entry.enabled {
                debug!(venue = %entry.name, "Venue disabled in config, skipping");
                continue;
            }
            wanted += 1;
            match Self::load(config, entry, factories, Arc::clone(&store)).await {
                Ok(venue) => {
                    info!(venue = %venue.name(), capabilities = %venue.capabilities(), "Venue loaded");
                    if let Err(e) = registry.register(venue) {
                        warn!(venue = %entry.name, error = %e, "Venue not registered");
                    }
                }
                Err(e) => warn!(venue = %entry.name, error = %e, "Venue failed to load"),
            }
        }
        if wanted > 0 && registry.is_empty() {
            return Err(Error::InvalidExchange("no venues loaded".into()));
        }
        Ok(registry)
    }

    async fn load(
        config: &Config,
        entry: &VenueConfig,
        factories: &VenueFactories,
        store: Arc<dyn MarketStore>,
    ) -> Result<Arc<dyn Venue>> {
        let factory = factories.get(&entry.name).ok_or_else(|| {
            Error::InvalidExchange(format!("no implementation registered for {}", entry.name))
        })?;
        let mut entry = entry.clone();
        if entry.http_timeout.is_zero() {
            entry.http_timeout = config.global_http_timeout;
        }
        let venue = factory(&entry, store)?;
        venue.apply_config(&entry).await?;
        Ok(venue)
    }

    /// Add an already configured venue.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` if a venue with the same name exists.
    pub fn register(&mut self, venue: Arc<dyn Venue>) -> Result<()> {
        if self.get(venue.name()).is_some() {
            return Err(Error::InvalidExchange(format!(
                "venue {} already loaded",
                venue.name()
            )));
        }
        self.venues.push(venue);
        Ok(())
    }

    /// Start every enabled venue concurrently and wait for all of them.
    ///
    /// Returns the names of venues that failed and were disabled.
    pub async fn start_all(&self) -> Vec<String> {
        let starting: Vec<&Arc<dyn Venue>> =
            self.venues.iter().filter(|v| v.is_enabled()).collect();
        let results = join_all(starting.iter().map(|v| v.start())).await;

        let mut failed = Vec::new();
        for (venue, result) in starting.into_iter().zip(results) {
            match result {
                Ok(()) => info!(venue = %venue.name(), "Venue started"),
                Err(e) => {
                    warn!(venue = %venue.name(), error = %e, "Venue failed to start, disabling");
                    venue.set_enabled(false);
                    failed.push(venue.name().to_string());
                }
            }
        }
        failed
    }

    /// Shut every venue down, giving each at most `grace`.
    pub async fn shutdown_all(&self, grace: Duration) {
        let shutdowns = self.venues.iter().map(|venue| async move {
            match tokio::time::timeout(grace, venue.shutdown()).await {
                Ok(Ok(())) => debug!(venue = %venue.name(), "Venue shut down"),
                Ok(Err(e)) => warn!(venue = %venue.name(), error = %e, "Venue shutdown failed"),
                Err(_) => warn!(venue = %venue.name(), "Venue shutdown timed out"),
            }
        });
        join_all(shutdowns).await;
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Venue>> {
        self.venues
            .iter()
            .find(|v| v.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Lookup that fails for unknown or disabled venues.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` naming the venue.
    pub fn enabled(&self, name: &str) -> Result<Arc<dyn Venue>> {
        let venue = self
            .get(name)
            .ok_or_else(|| Error::InvalidExchange(format!("{name} is not loaded")))?;
        if !venue.is_enabled() {
            return Err(Error::InvalidExchange(format!("{name} is not enabled")));
        }
        Ok(venue)
    }

    /// Venue names in configuration order.
    #[must_use]
    pub fn names(&self, enabled_only: bool) -> Vec<String> {
        self.venues
            .iter()
            .filter(|v| !enabled_only || v.is_enabled())
            .map(|v| v.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn venues(&self) -> &[Arc<dyn Venue>] {
        &self.venues
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.venues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("venues", &self.names(false))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Caches;
    use crate::infrastructure::config::OrderbookConfig;
    use crate::testkit::venue::MockVenue;

    fn factories() -> VenueFactories {
        let mut factories = VenueFactories::new();
        factories.register("alpha", |cfg, store| {
            Ok(Arc::new(MockVenue::new(&cfg.name, store)) as Arc<dyn Venue>)
        });
        factories.register("beta", |cfg, store| {
            let venue = MockVenue::new(&cfg.name, store);
            venue.fail_start("exchange maintenance");
            Ok(Arc::new(venue) as Arc<dyn Venue>)
        });
        factories
    }

    fn config(names: &[(&str, bool)]) -> Config {
        let mut config = Config::default();
        for (name, enabled) in names {
            let mut venue = VenueConfig::named(*name);
            venue.enabled = *enabled;
            config.exchanges.push(venue);
        }
        config
    }

    fn store() -> Arc<dyn MarketStore> {
        Arc::new(Caches::new(OrderbookConfig::default()))
    }

    #[tokio::test]
    async fn bootstrap_skips_disabled_entries() {
        let cfg = config(&[("alpha", true), ("beta", false)]);
        let registry = Registry::bootstrap(&cfg, &factories(), store()).await.unwrap();
        assert_eq!(registry.names(false), vec!["alpha".to_string()]);
        assert!(registry.get("ALPHA").is_some());
    }

    #[tokio::test]
    async fn unknown_venue_is_skipped() {
        let cfg = config(&[("gamma", true), ("alpha", true)]);
        let registry = Registry::bootstrap(&cfg, &factories(), store()).await.unwrap();
        assert_eq!(registry.names(false), vec!["alpha".to_string()]);

        let cfg = config(&[("gamma", true)]);
        let err = Registry::bootstrap(&cfg, &factories(), store()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidExchange(_)));
    }

    #[tokio::test]
    async fn empty_config_loads_nothing() {
        let registry = Registry::bootstrap(&Config::default(), &factories(), store())
            .await
            .unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_start_disables_only_that_venue() {
        let cfg = config(&[("alpha", true), ("beta", true)]);
        let registry = Registry::bootstrap(&cfg, &factories(), store()).await.unwrap();

        let failed = registry.start_all().await;
        assert_eq!(failed, vec!["beta".to_string()]);
        assert_eq!(registry.names(true), vec!["alpha".to_string()]);
        assert!(registry.enabled("beta").is_err());
        assert!(registry.enabled("Alpha").is_ok());
    }

    #[tokio::test]
    async fn duplicate_register_rejected() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(MockVenue::new("alpha", store())))
            .unwrap();
        assert!(registry
            .register(Arc::new(MockVenue::new("Alpha", store())))
            .is_err());
    }
}
