//! The venue contract every exchange integration implements.
//!
//! An integration is a value implementing [`Venue`] that embeds a
//! [`VenueBase`] holding the state every venue shares: name, enable flag,
//! capability set, pair stores, credentials and the cache facade. Default
//! methods implement the shared protocols on top of that state:
//!
//! - `fetch_*` methods are cache-through: return the cached value, or call
//!   the matching `update_*` which hits the venue, writes the cache and
//!   returns the written value.
//! - Operations whose capability is absent fail with `Unsupported`; present
//!   but unimplemented ones fail with `NotYetImplemented`.
//! - Credential-bearing operations pass through
//!   [`VenueBase::allow_authenticated_request`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::market::MarketStore;
use crate::domain::kline::split_date_range;
use crate::domain::{
    channel, AssetClass, Cancel, CancelAllResponse, Capabilities, Capability, Credentials,
    Currency, DepositAddress, FeeRequest, FundingRecord, Holdings, Interval, KlineCapabilities,
    KlineSeries, Modify, ModifyResponse, OrderDetail, Orderbook, OrdersRequest, Pair,
    PairManager, Pairs, Submit, SubmitResponse, Subscription, Ticker, WithdrawRequest,
    WithdrawResponse,
};
use crate::error::{Error, ErrorKind, Result};
use crate::infrastructure::config::{OrderbookConfig, VenueConfig};

/// State shared by every venue implementation.
pub struct VenueBase {
    name: String,
    enabled: AtomicBool,
    capabilities: Capabilities,
    klines: KlineCapabilities,
    config: RwLock<VenueConfig>,
    pairs: RwLock<PairManager>,
    credentials: RwLock<Credentials>,
    auth_failure: RwLock<Option<String>>,
    store: Arc<dyn MarketStore>,
}

impl VenueBase {
    /// A disabled venue with default config until [`apply_config`](Self::apply_config).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        capabilities: Capabilities,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        let name = name.into();
        Self {
            config: RwLock::new(VenueConfig::named(&name)),
            name,
            enabled: AtomicBool::new(false),
            capabilities,
            klines: KlineCapabilities::default(),
            pairs: RwLock::new(PairManager::default()),
            credentials: RwLock::new(Credentials::default()),
            auth_failure: RwLock::new(None),
            store,
        }
    }

    #[must_use]
    pub fn with_klines(mut self, klines: KlineCapabilities) -> Self {
        self.klines = klines;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }

    /// # Errors
    ///
    /// Returns `Unsupported` when the capability is absent.
    pub fn require(&self, capability: Capability) -> Result<()> {
        self.capabilities.require(&self.name, capability)
    }

    pub fn klines(&self) -> &KlineCapabilities {
        &self.klines
    }

    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    // Configuration

    /// Apply a config entry: enable flag, credentials and pair stores.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` if the entry names another venue, or a
    /// config error if the entry is invalid.
    pub fn apply_config(&self, config: &VenueConfig) -> Result<()> {
        if !config.name.eq_ignore_ascii_case(&self.name) {
            return Err(Error::InvalidExchange(format!(
                "config for {} applied to {}",
                config.name, self.name
            )));
        }
        config.validate()?;

        let mut pairs = config.currency_pairs.clone();
        pairs.ensure_enabled_subsets();
        *self.pairs.write() = pairs;
        *self.credentials.write() = config.api.credentials.clone();
        *self.auth_failure.write() = None;
        *self.config.write() = config.clone();
        self.set_enabled(config.enabled);

        info!(
            venue = %self.name,
            enabled = config.enabled,
            assets = self.pairs.read().enabled_assets().len(),
            "Venue configured"
        );
        Ok(())
    }

    pub fn config(&self) -> VenueConfig {
        self.config.read().clone()
    }

    pub fn http_timeout(&self) -> Duration {
        self.config.read().http_timeout
    }

    pub fn orderbook_config(&self) -> OrderbookConfig {
        self.config.read().orderbook.clone()
    }

    pub fn websocket_enabled(&self) -> bool {
        self.config.read().features.enabled.websocket_api
    }

    pub fn auto_pair_updates(&self) -> bool {
        self.config.read().features.enabled.auto_pair_updates
    }

    // Pairs

    pub fn pair_manager(&self) -> PairManager {
        self.pairs.read().clone()
    }

    pub fn enabled_assets(&self) -> Vec<AssetClass> {
        self.pairs.read().enabled_assets()
    }

    /// # Errors
    ///
    /// Returns `InvalidAsset` if the class has no store or is disabled.
    pub fn get_pairs(&self, asset: AssetClass, enabled: bool) -> Result<Pairs> {
        self.pairs.read().get_pairs(asset, enabled)
    }

    /// # Errors
    ///
    /// Returns `InvalidAsset` if operations on the class are forbidden.
    pub fn require_asset(&self, asset: AssetClass) -> Result<()> {
        if self.pairs.read().is_asset_enabled(asset) {
            Ok(())
        } else {
            Err(Error::InvalidAsset(format!(
                "{asset} is not enabled on {}",
                self.name
            )))
        }
    }

    /// Render a pair in the venue's request format.
    pub fn format_pair(&self, pair: &Pair, asset: AssetClass) -> String {
        self.pairs.read().format(asset, true).format(pair)
    }

    /// Replace the available pairs, pruning enabled pairs that disappeared.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAsset` if the class has no store.
    pub fn store_available_pairs(&self, asset: AssetClass, pairs: Pairs) -> Result<()> {
        let mut manager = self.pairs.write();
        manager.store_pairs(asset, pairs, false)?;
        manager.ensure_enabled_subsets();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidPair` if the pair is not available.
    pub fn enable_pair(&self, asset: AssetClass, pair: Pair) -> Result<()> {
        self.pairs.write().enable_pair(asset, pair)
    }

    // Credentials

    pub fn credentials(&self) -> Credentials {
        self.credentials.read().clone()
    }

    /// Rotate key material. Clears any recorded authentication failure.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write() = credentials;
        *self.auth_failure.write() = None;
    }

    pub fn authenticated_support(&self) -> bool {
        self.config.read().api.authenticated_support
    }

    /// True when authenticated stream channels may be used.
    pub fn websocket_authenticated(&self) -> bool {
        self.config.read().api.authenticated_websocket_support
            && self.allow_authenticated_request().is_ok()
    }

    /// Gate for every credential-bearing operation.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` when authenticated support is off or key material is missing
    /// - `AuthRejected` when a previous attempt failed and nothing was revalidated
    pub fn allow_authenticated_request(&self) -> Result<()> {
        if !self.authenticated_support() || !self.credentials.read().is_present() {
            return Err(Error::AuthRequired {
                venue: self.name.clone(),
            });
        }
        if let Some(reason) = self.auth_failure.read().as_ref() {
            return Err(Error::AuthRejected {
                venue: self.name.clone(),
                reason: format!("previous authentication failed: {reason}"),
            });
        }
        Ok(())
    }

    /// [`require`](Self::require) then
    /// [`allow_authenticated_request`](Self::allow_authenticated_request).
    ///
    /// # Errors
    ///
    /// Returns the first failing gate.
    pub fn gate(&self, capability: Capability) -> Result<()> {
        self.require(capability)?;
        self.allow_authenticated_request()
    }

    pub fn record_auth_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(venue = %self.name, reason = %reason, "Authentication failed, disabling authenticated requests");
        *self.auth_failure.write() = Some(reason);
    }

    pub fn clear_auth_failure(&self) {
        *self.auth_failure.write() = None;
    }

    pub fn auth_failure(&self) -> Option<String> {
        self.auth_failure.read().clone()
    }

    /// Record an auth failure if `result` is a venue rejection.
    ///
    /// # Errors
    ///
    /// Returns `result` unchanged.
    pub fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::AuthRejected { reason, .. }) = &result {
            self.record_auth_failure(reason.clone());
        }
        result
    }

    // Cache writes

    /// Write a fresh ticker and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for incomplete snapshots.
    pub fn publish_ticker(&self, ticker: Ticker) -> Result<Ticker> {
        let (pair, asset) = (ticker.pair.clone(), ticker.asset);
        self.store.put_ticker(ticker)?;
        self.store.ticker(&self.name, &pair, asset)
    }

    /// # Errors
    ///
    /// Returns a validation error for malformed books.
    pub fn publish_orderbook(&self, book: Orderbook) -> Result<Orderbook> {
        let (pair, asset) = (book.pair.clone(), book.asset);
        self.store.put_orderbook(book)?;
        self.store.orderbook(&self.name, &pair, asset)
    }

    /// # Errors
    ///
    /// Returns `InvalidExchange` when the holdings carry no venue name.
    pub fn publish_holdings(&self, holdings: Holdings) -> Result<Holdings> {
        self.store.put_holdings(holdings)?;
        self.store.holdings(&self.name)
    }
}

impl std::fmt::Debug for VenueBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueBase")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn cache_miss(err: &Error) -> bool {
    err.kind() == ErrorKind::NotFound
}

/// Exchange integration contract.
#[async_trait]
pub trait Venue: Send + Sync {
    fn base(&self) -> &VenueBase;

    // Identification

    fn name(&self) -> &str {
        self.base().name()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base().set_enabled(enabled);
    }

    fn capabilities(&self) -> Capabilities {
        self.base().capabilities()
    }

    // Configuration

    fn default_config(&self) -> VenueConfig {
        VenueConfig::named(self.name())
    }

    async fn apply_config(&self, config: &VenueConfig) -> Result<()> {
        self.base().apply_config(config)
    }

    // Lifecycle

    /// Initial setup only; long-running work must be spawned.
    async fn start(&self) -> Result<()> {
        let base = self.base();
        if base.auto_pair_updates() && base.supports(Capability::AutoPairUpdates) {
            if let Err(e) = self.update_tradable_pairs(false).await {
                warn!(venue = %self.name(), error = %e, "Tradable pair update failed");
            }
        }
        if base.websocket_enabled() && base.supports(Capability::Websocket) {
            self.ws_connect().await?;
            if base.websocket_authenticated() {
                self.authenticate_websocket().await?;
            }
            let subscriptions = self.generate_default_subscriptions()?;
            self.ws_subscribe(&subscriptions).await?;
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    // Discovery

    async fn fetch_tradable_pairs(&self, _asset: AssetClass) -> Result<Pairs> {
        Err(Error::not_yet_implemented(self.name(), "fetch tradable pairs"))
    }

    /// Refresh available pairs for every enabled asset class.
    ///
    /// Without `force`, stores whose available list is unchanged are left alone.
    async fn update_tradable_pairs(&self, force: bool) -> Result<()> {
        for asset in self.base().enabled_assets() {
            let fetched = self.fetch_tradable_pairs(asset).await?;
            let current = self.base().get_pairs(asset, false)?;
            if !force && current == fetched {
                continue;
            }
            self.base().store_available_pairs(asset, fetched)?;
        }
        Ok(())
    }

    // Market data

    async fn fetch_ticker(&self, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        self.base().require_asset(asset)?;
        match self.base().store().ticker(self.name(), pair, asset) {
            Err(e) if cache_miss(&e) => self.update_ticker(pair, asset).await,
            other => other,
        }
    }

    async fn update_ticker(&self, _pair: &Pair, _asset: AssetClass) -> Result<Ticker> {
        self.base().require(Capability::TickerFetching)?;
        Err(Error::not_yet_implemented(self.name(), "update ticker"))
    }

    /// Refresh every enabled pair's ticker in one request.
    async fn update_tickers(&self, _asset: AssetClass) -> Result<()> {
        self.base().require(Capability::TickerBatching)?;
        Err(Error::not_yet_implemented(self.name(), "update tickers"))
    }

    async fn fetch_orderbook(&self, pair: &Pair, asset: AssetClass) -> Result<Orderbook> {
        self.base().require_asset(asset)?;
        match self.base().store().orderbook(self.name(), pair, asset) {
            Err(e) if cache_miss(&e) => self.update_orderbook(pair, asset).await,
            other => other,
        }
    }

    async fn update_orderbook(&self, _pair: &Pair, _asset: AssetClass) -> Result<Orderbook> {
        self.base().require(Capability::OrderbookFetching)?;
        Err(Error::not_yet_implemented(self.name(), "update orderbook"))
    }

    async fn historic_candles(
        &self,
        _pair: &Pair,
        _asset: AssetClass,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<KlineSeries> {
        self.base().require(Capability::KlineFetching)?;
        self.base().klines().format(self.name(), interval)?;
        Err(Error::not_yet_implemented(self.name(), "historic candles"))
    }

    /// Fetch a span larger than one request allows by splitting it under
    /// the venue's result limit and merging the pieces.
    async fn historic_candles_extended(
        &self,
        pair: &Pair,
        asset: AssetClass,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<KlineSeries> {
        self.base().require(Capability::KlineFetching)?;
        self.base().require_asset(asset)?;
        self.base().klines().format(self.name(), interval)?;

        let ranges = split_date_range(start, end, interval, self.base().klines().result_limit)?;
        let mut series = KlineSeries::new(self.name(), pair.clone(), asset, interval);
        for range in ranges {
            let part = self
                .historic_candles(pair, asset, range.start, range.end, interval)
                .await?;
            series.candles.extend(part.candles);
        }
        series.dedupe();
        Ok(series)
    }

    // Account

    async fn fetch_account(&self) -> Result<Holdings> {
        match self.base().store().holdings(self.name()) {
            Err(e) if cache_miss(&e) => self.update_account().await,
            other => other,
        }
    }

    async fn update_account(&self) -> Result<Holdings> {
        self.base().gate(Capability::AccountInfo)?;
        Err(Error::not_yet_implemented(self.name(), "update account"))
    }

    /// Check key material against the venue, clearing or recording the
    /// authentication failure flag.
    async fn validate_credentials(&self) -> Result<()> {
        self.base().clear_auth_failure();
        match self.update_account().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(e.kind(), ErrorKind::AuthRejected) {
                    self.base().record_auth_failure(e.to_string());
                }
                Err(e)
            }
        }
    }

    // Trading

    async fn submit_order(&self, _submit: &Submit) -> Result<SubmitResponse> {
        self.base().gate(Capability::SubmitOrder)?;
        Err(Error::not_yet_implemented(self.name(), "submit order"))
    }

    async fn modify_order(&self, _modify: &Modify) -> Result<ModifyResponse> {
        self.base().gate(Capability::ModifyOrder)?;
        Err(Error::not_yet_implemented(self.name(), "modify order"))
    }

    async fn cancel_order(&self, _cancel: &Cancel) -> Result<()> {
        self.base().gate(Capability::CancelOrder)?;
        Err(Error::not_yet_implemented(self.name(), "cancel order"))
    }

    /// Cancel every open order matching `cancel`; one status entry per order.
    async fn cancel_all_orders(&self, _cancel: &Cancel) -> Result<CancelAllResponse> {
        self.base().gate(Capability::CancelOrders)?;
        Err(Error::not_yet_implemented(self.name(), "cancel all orders"))
    }

    async fn get_order_info(
        &self,
        _order_id: &str,
        _pair: Option<&Pair>,
        _asset: AssetClass,
    ) -> Result<OrderDetail> {
        self.base().gate(Capability::GetOrder)?;
        Err(Error::not_yet_implemented(self.name(), "get order info"))
    }

    async fn get_active_orders(&self, _request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base().gate(Capability::GetOrders)?;
        Err(Error::not_yet_implemented(self.name(), "get active orders"))
    }

    async fn get_order_history(&self, _request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base().gate(Capability::GetOrders)?;
        Err(Error::not_yet_implemented(self.name(), "get order history"))
    }

    // Funding

    async fn get_deposit_address(
        &self,
        _currency: &Currency,
        _chain: Option<&str>,
    ) -> Result<DepositAddress> {
        self.base().gate(Capability::CryptoDeposit)?;
        Err(Error::not_yet_implemented(self.name(), "get deposit address"))
    }

    async fn withdraw_crypto(&self, _request: &WithdrawRequest) -> Result<WithdrawResponse> {
        self.base().gate(Capability::CryptoWithdrawal)?;
        Err(Error::not_yet_implemented(self.name(), "withdraw crypto"))
    }

    async fn withdraw_fiat(&self, _request: &WithdrawRequest) -> Result<WithdrawResponse> {
        self.base().gate(Capability::FiatWithdrawal)?;
        Err(Error::not_yet_implemented(self.name(), "withdraw fiat"))
    }

    async fn withdraw_fiat_international(
        &self,
        _request: &WithdrawRequest,
    ) -> Result<WithdrawResponse> {
        self.base().gate(Capability::InternationalBankWithdrawal)?;
        Err(Error::not_yet_implemented(self.name(), "withdraw fiat international"))
    }

    async fn get_funding_history(&self) -> Result<Vec<FundingRecord>> {
        let base = self.base();
        if !base.supports(Capability::DepositHistory)
            && !base.supports(Capability::WithdrawalHistory)
        {
            return Err(Error::unsupported(self.name(), "funding history"));
        }
        base.allow_authenticated_request()?;
        Err(Error::not_yet_implemented(self.name(), "get funding history"))
    }

    async fn get_fee_by_type(&self, _request: &FeeRequest) -> Result<Decimal> {
        self.base().require(Capability::TradeFee)?;
        Err(Error::not_yet_implemented(self.name(), "get fee by type"))
    }

    // Streaming

    async fn ws_connect(&self) -> Result<()> {
        self.base().require(Capability::Websocket)?;
        Err(Error::not_yet_implemented(self.name(), "websocket connect"))
    }

    async fn ws_subscribe(&self, _subscriptions: &[Subscription]) -> Result<()> {
        self.base().require(Capability::Websocket)?;
        Err(Error::not_yet_implemented(self.name(), "websocket subscribe"))
    }

    async fn ws_unsubscribe(&self, _subscriptions: &[Subscription]) -> Result<()> {
        self.base().require(Capability::Websocket)?;
        Err(Error::not_yet_implemented(self.name(), "websocket unsubscribe"))
    }

    async fn authenticate_websocket(&self) -> Result<()> {
        self.base().gate(Capability::WebsocketAuthenticated)?;
        Err(Error::not_yet_implemented(self.name(), "websocket authenticate"))
    }

    /// One subscription per enabled pair and supported public channel, plus
    /// account and order channels when authenticated streaming is available.
    fn generate_default_subscriptions(&self) -> Result<Vec<Subscription>> {
        let base = self.base();
        base.require(Capability::Websocket)?;

        let public: Vec<&str> = [
            (Capability::WebsocketTicker, channel::TICKER),
            (Capability::WebsocketOrderbook, channel::ORDERBOOK),
            (Capability::WebsocketTrades, channel::TRADES),
        ]
        .into_iter()
        .filter(|(cap, _)| base.supports(*cap))
        .map(|(_, name)| name)
        .collect();

        let mut subscriptions = Vec::new();
        for asset in base.enabled_assets() {
            for pair in base.get_pairs(asset, true)? {
                for name in &public {
                    subscriptions.push(Subscription::for_pair(*name, pair.clone(), asset));
                }
            }
        }

        if base.websocket_authenticated() {
            if base.supports(Capability::WebsocketAccount) {
                subscriptions.push(Subscription::new(channel::ACCOUNT));
            }
            if base.supports(Capability::WebsocketOrders) {
                subscriptions.push(Subscription::new(channel::ORDERS));
            }
        }
        Ok(subscriptions)
    }
}
