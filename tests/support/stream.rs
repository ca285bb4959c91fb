use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use tradeplex::application::Caches;
use tradeplex::domain::{channel, AssetClass, Pair, Subscription};
use tradeplex::infrastructure::config::{OrderbookConfig, ReconnectionConfig};
use tradeplex::infrastructure::websocket::{ConnectionState, WebsocketManager, WsSettings};
use tradeplex::port::Correlation;
use tradeplex::testkit::stream::{ChannelDialer, MockProtocol};

pub fn fast_settings() -> WsSettings {
    let mut settings = WsSettings::new("ws://integration");
    settings.response_timeout = Duration::from_millis(250);
    settings.response_check_interval = Duration::from_millis(10);
    settings.ping_interval = Duration::from_secs(60);
    settings.shutdown_grace = Duration::from_millis(500);
    settings.reconnection = ReconnectionConfig {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
        max_consecutive_failures: 10,
        circuit_breaker_cooldown_ms: 10,
    };
    settings
}

pub struct StreamRig {
    pub manager: WebsocketManager,
    pub dialer: Arc<ChannelDialer>,
    pub caches: Arc<Caches>,
}

pub fn rig(correlation: Correlation, orderbook: OrderbookConfig) -> StreamRig {
    rig_with(correlation, orderbook, fast_settings())
}

pub fn rig_with(
    correlation: Correlation,
    orderbook: OrderbookConfig,
    settings: WsSettings,
) -> StreamRig {
    let dialer = Arc::new(ChannelDialer::new());
    let caches = Arc::new(Caches::new(orderbook));
    let manager = WebsocketManager::new(
        "mock",
        settings,
        Arc::new(MockProtocol::new("mock", correlation)),
        dialer.clone(),
        caches.clone(),
    );
    StreamRig {
        manager,
        dialer,
        caches,
    }
}

pub fn sub(channel_name: &str, base: &str) -> Subscription {
    Subscription::for_pair(
        channel_name,
        Pair::new(base, "USD").expect("valid pair"),
        AssetClass::Spot,
    )
}

pub fn ticker(base: &str) -> Subscription {
    sub(channel::TICKER, base)
}

/// Poll `check` until it yields a value or a second passes.
pub async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> Option<T> {
    for _ in 0..200 {
        if let Some(value) = check() {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

/// Collect state changes after this call until `until` is observed.
pub fn record_states(
    manager: &WebsocketManager,
    until: ConnectionState,
) -> JoinHandle<Vec<ConnectionState>> {
    let mut states = manager.watch_state();
    states.borrow_and_update();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while seen.last() != Some(&until) {
            if states.changed().await.is_err() {
                break;
            }
            seen.push(*states.borrow_and_update());
        }
        seen
    })
}
