use std::sync::Arc;

use parking_lot::Mutex;

use tradeplex::adapter::outbound::MemoryWithdrawStore;
use tradeplex::application::{Engine, VenueFactories};
use tradeplex::infrastructure::config::Config;
use tradeplex::port::Venue;
use tradeplex::testkit::fixtures;
use tradeplex::testkit::venue::MockVenue;

/// Mock venues built by [`mock_factories`], in construction order.
pub type Built = Arc<Mutex<Vec<Arc<MockVenue>>>>;

/// Factories building [`MockVenue`]s for any of `names`, keeping a handle to
/// each one so tests can inspect call counts.
pub fn mock_factories(names: &[&str]) -> (VenueFactories, Built) {
    let built: Built = Arc::default();
    let mut factories = VenueFactories::new();
    for name in names {
        let built = built.clone();
        factories.register(name, move |cfg, store| {
            let venue = Arc::new(MockVenue::new(&cfg.name, store));
            built.lock().push(venue.clone());
            Ok(venue as Arc<dyn Venue>)
        });
    }
    (factories, built)
}

pub struct MockEngine {
    pub engine: Engine,
    built: Built,
}

impl MockEngine {
    pub fn venue(&self, name: &str) -> Arc<MockVenue> {
        self.built
            .lock()
            .iter()
            .find(|v| v.name().eq_ignore_ascii_case(name))
            .cloned()
            .expect("mock venue built")
    }
}

/// A started engine with one configured mock venue per name.
pub async fn mock_engine(names: &[&str]) -> MockEngine {
    let mut config = Config::default();
    config.name = "integration".into();
    for name in names {
        config.exchanges.push(fixtures::venue_config(name));
    }
    config
        .bank_accounts
        .push(fixtures::bank_account("acct-1", "USD,EUR"));

    let (factories, built) = mock_factories(names);
    let engine = Engine::bootstrap(config, &factories, Arc::new(MemoryWithdrawStore::new()))
        .await
        .expect("bootstrap");
    assert!(engine.start().await.is_empty(), "every mock venue starts");
    MockEngine { engine, built }
}
