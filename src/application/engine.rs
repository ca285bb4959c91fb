//! Engine context and scripting facade.
//!
//! One [`Engine`] owns the caches, the venue registry and the order and
//! withdraw managers. Every entry point goes through it, so several engines
//! can live in one process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::cache::Caches;
use super::order::{OrderManager, PlacedOrder};
use super::registry::{Registry, VenueFactories};
use super::withdraw::{BankStore, WithdrawManager};
use crate::domain::{
    AssetClass, Cancel, Currency, DepositAddress, Holdings, Interval, KlineSeries, OrderDetail,
    Orderbook, Pair, Pairs, Submit, Ticker, WithdrawEvent, WithdrawRequest,
};
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::{MarketStore, Venue, WithdrawStore};

pub struct Engine {
    config: Config,
    caches: Arc<Caches>,
    registry: Arc<Registry>,
    orders: OrderManager,
    withdrawals: WithdrawManager,
}

impl Engine {
    /// Build caches, load venues and wire the managers.
    ///
    /// Bank accounts from the top level and from each venue entry are
    /// merged; venue entries win on id clashes.
    ///
    /// # Errors
    ///
    /// Returns the registry's bootstrap error.
    pub async fn bootstrap(
        config: Config,
        factories: &VenueFactories,
        withdraw_store: Arc<dyn WithdrawStore>,
    ) -> Result<Self> {
        let caches = Arc::new(Caches::default());
        for venue in &config.exchanges {
            caches.configure_venue(&venue.name, venue.orderbook.clone());
        }

        let store: Arc<dyn MarketStore> = caches.clone();
        let registry = Arc::new(Registry::bootstrap(&config, factories, store).await?);

        let banks = BankStore::new(
            config
                .bank_accounts
                .iter()
                .chain(config.exchanges.iter().flat_map(|v| v.bank_accounts.iter()))
                .cloned(),
        );
        let orders = OrderManager::new(registry.clone(), caches.orders.clone());
        let withdrawals = WithdrawManager::new(registry.clone(), banks, withdraw_store);

        info!(
            name = %config.name,
            venues = registry.len(),
            "Engine bootstrapped"
        );
        Ok(Self {
            config,
            caches,
            registry,
            orders,
            withdrawals,
        })
    }

    /// Start every venue and wait for all of them. Returns the venues that
    /// failed and were disabled.
    pub async fn start(&self) -> Vec<String> {
        let failed = self.registry.start_all().await;
        info!(
            enabled = self.registry.names(true).len(),
            failed = failed.len(),
            "Engine started"
        );
        failed
    }

    pub async fn shutdown(&self) {
        let grace = self.config.websocket.shutdown_grace();
        info!(grace_ms = grace.as_millis() as u64, "Engine shutting down");
        self.registry.shutdown_all(grace).await;
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn caches(&self) -> &Arc<Caches> {
        &self.caches
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    #[must_use]
    pub fn withdrawals(&self) -> &WithdrawManager {
        &self.withdrawals
    }

    fn venue(&self, name: &str) -> Result<Arc<dyn Venue>> {
        self.registry.enabled(name)
    }

    // Scripting facade

    #[must_use]
    pub fn exchanges(&self, enabled_only: bool) -> Vec<String> {
        self.registry.names(enabled_only)
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.registry.get(name).is_some_and(|v| v.is_enabled())
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` or the venue's fetch error.
    pub async fn ticker(&self, exchange: &str, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        self.venue(exchange)?.fetch_ticker(pair, asset).await
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` or the venue's fetch error.
    pub async fn orderbook(
        &self,
        exchange: &str,
        pair: &Pair,
        asset: AssetClass,
    ) -> Result<Orderbook> {
        self.venue(exchange)?.fetch_orderbook(pair, asset).await
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` or `InvalidAsset`.
    pub fn pairs(&self, exchange: &str, enabled_only: bool, asset: AssetClass) -> Result<Pairs> {
        self.venue(exchange)?.base().get_pairs(asset, enabled_only)
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` or the venue's account error.
    pub async fn account_information(&self, exchange: &str) -> Result<Holdings> {
        self.venue(exchange)?.fetch_account().await
    }

    /// Fetch one order. Pair and asset come from the ledger when the order
    /// is known, since venues like Binance key lookups by symbol.
    ///
    /// # Errors
    ///
    /// Returns the order manager's error.
    pub async fn query_order(&self, exchange: &str, order_id: &str) -> Result<OrderDetail> {
        let known = self.orders.ledger().get(exchange, order_id);
        let (pair, asset) = known.map_or((None, AssetClass::Spot), |o| (Some(o.pair), o.asset));
        self.orders
            .order_info(exchange, order_id, pair.as_ref(), asset)
            .await
    }

    /// # Errors
    ///
    /// Returns the order manager's error.
    pub async fn submit_order(&self, exchange: &str, submit: &Submit) -> Result<PlacedOrder> {
        self.orders.submit(exchange, submit).await
    }

    /// # Errors
    ///
    /// Returns the order manager's error.
    pub async fn cancel_order(&self, exchange: &str, order_id: &str) -> Result<()> {
        let mut cancel = Cancel::new(order_id, AssetClass::Spot);
        if let Some(order) = self.orders.ledger().get(exchange, order_id) {
            cancel.asset = order.asset;
            cancel.pair = Some(order.pair);
            cancel.side = Some(order.side);
            cancel.client_order_id = order.client_order_id;
        }
        self.orders.cancel(exchange, &cancel).await
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` or the venue's error.
    pub async fn deposit_address(
        &self,
        exchange: &str,
        currency: &Currency,
    ) -> Result<DepositAddress> {
        self.venue(exchange)?.get_deposit_address(currency, None).await
    }

    /// # Errors
    ///
    /// Returns the withdraw manager's error.
    pub async fn withdrawal_crypto(
        &self,
        exchange: &str,
        request: &WithdrawRequest,
    ) -> Result<WithdrawEvent> {
        self.withdrawals.submit(exchange, request).await
    }

    /// # Errors
    ///
    /// Returns the withdraw manager's error.
    pub async fn withdrawal_fiat(
        &self,
        exchange: &str,
        bank_id: &str,
        request: &WithdrawRequest,
    ) -> Result<WithdrawEvent> {
        self.withdrawals.submit_fiat(exchange, bank_id, request).await
    }

    /// Candles over `[start, end)`, split into as many venue requests as the
    /// venue's result limit needs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange`, `Unsupported` for unsupported intervals, or
    /// the venue's error.
    pub async fn ohlcv(
        &self,
        exchange: &str,
        pair: &Pair,
        asset: AssetClass,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<KlineSeries> {
        let mut series = self
            .venue(exchange)?
            .historic_candles_extended(pair, asset, start, end, interval)
            .await?;
        series.sort_candles(true);
        Ok(series)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.config.name)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
