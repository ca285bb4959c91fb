//! Scriptable in-memory [`Venue`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::fixtures;
use crate::domain::{
    AssetClass, Balance, Cancel, CancelAllResponse, Capabilities, Capability, Currency,
    DepositAddress, Holdings, Level, Modify, ModifyResponse, OrderDetail, OrderStatus, Orderbook,
    OrdersRequest, Pair, Pairs, SubAccount, Submit, SubmitResponse, Ticker, WithdrawRequest,
    WithdrawResponse,
};
use crate::error::{Error, Result};
use crate::port::{MarketStore, Venue, VenueBase};

/// Venue whose exchange side is a map of orders in memory.
///
/// Every trait method bumps a per-operation call counter after its gates
/// pass, so tests can assert whether a request would have reached the wire.
pub struct MockVenue {
    base: VenueBase,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
    start_failure: Mutex<Option<String>>,
    auth_rejection: Mutex<Option<String>>,
    otp_rejection: Mutex<Option<String>>,
    orders: Mutex<BTreeMap<String, OrderDetail>>,
    withdrawals: Mutex<Vec<WithdrawRequest>>,
    next_id: AtomicU64,
}

impl MockVenue {
    pub fn new(name: &str, store: Arc<dyn MarketStore>) -> Self {
        Self::with_capabilities(name, Self::default_capabilities(), store)
    }

    pub fn with_capabilities(name: &str, caps: Capabilities, store: Arc<dyn MarketStore>) -> Self {
        Self {
            base: VenueBase::new(name, caps, store),
            calls: Mutex::default(),
            failures: Mutex::default(),
            start_failure: Mutex::default(),
            auth_rejection: Mutex::default(),
            otp_rejection: Mutex::default(),
            orders: Mutex::default(),
            withdrawals: Mutex::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// A venue with [`fixtures::venue_config`] applied: enabled, keyed and
    /// trading BTC-USD spot.
    pub fn configured(name: &str, store: Arc<dyn MarketStore>) -> Self {
        Self::configured_with(name, Self::default_capabilities(), store)
    }

    pub fn configured_with(name: &str, caps: Capabilities, store: Arc<dyn MarketStore>) -> Self {
        let venue = Self::with_capabilities(name, caps, store);
        venue
            .base
            .apply_config(&fixtures::venue_config(name))
            .expect("fixture config is valid");
        venue
    }

    pub fn default_capabilities() -> Capabilities {
        [
            Capability::TickerFetching,
            Capability::OrderbookFetching,
            Capability::AutoPairUpdates,
            Capability::AccountInfo,
            Capability::SubmitOrder,
            Capability::ModifyOrder,
            Capability::CancelOrder,
            Capability::CancelOrders,
            Capability::GetOrder,
            Capability::GetOrders,
            Capability::CryptoDeposit,
            Capability::CryptoWithdrawal,
            Capability::FiatWithdrawal,
            Capability::InternationalBankWithdrawal,
        ]
        .into_iter()
        .collect()
    }

    /// How many times `op` got past its gates.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Fail the next call to `op` with a venue error.
    pub fn fail_next(&self, op: &'static str, message: &str) {
        self.failures.lock().insert(op, message.to_string());
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_failure.lock() = Some(message.to_string());
    }

    /// Answer authenticated trading calls with a credential rejection.
    pub fn reject_auth(&self, reason: &str) {
        *self.auth_rejection.lock() = Some(reason.to_string());
    }

    pub fn reject_otp(&self, reason: &str) {
        *self.otp_rejection.lock() = Some(reason.to_string());
    }

    /// Withdrawal requests as the venue received them.
    pub fn withdrawals(&self) -> Vec<WithdrawRequest> {
        self.withdrawals.lock().clone()
    }

    /// Venue-side orders, open or not.
    pub fn orders(&self) -> Vec<OrderDetail> {
        self.orders.lock().values().cloned().collect()
    }

    fn hit(&self, op: &'static str) -> Result<()> {
        *self.calls.lock().entry(op).or_default() += 1;
        match self.failures.lock().remove(op) {
            Some(message) => Err(Error::Venue {
                venue: self.base.name().to_string(),
                code: "500".into(),
                message,
            }),
            None => Ok(()),
        }
    }

    fn authorised(&self, op: &'static str) -> Result<()> {
        self.hit(op)?;
        let rejection = self.auth_rejection.lock().clone();
        match rejection {
            Some(reason) => self.base.track(Err(Error::AuthRejected {
                venue: self.base.name().to_string(),
                reason,
            })),
            None => Ok(()),
        }
    }

    fn order_id(&self) -> String {
        format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record_withdrawal(&self, request: &WithdrawRequest) -> Result<WithdrawResponse> {
        if let Some(reason) = self.otp_rejection.lock().clone() {
            return Err(Error::OtpRejected {
                venue: self.base.name().to_string(),
                reason,
            });
        }
        self.withdrawals.lock().push(request.clone());
        Ok(WithdrawResponse {
            id: format!("wd-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            status: "pending".into(),
        })
    }

    fn open_orders(&self, asset: AssetClass) -> Vec<OrderDetail> {
        self.orders
            .lock()
            .values()
            .filter(|o| o.asset == asset && !o.is_terminal())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Venue for MockVenue {
    fn base(&self) -> &VenueBase {
        &self.base
    }

    async fn start(&self) -> Result<()> {
        self.hit("start")?;
        if let Some(message) = self.start_failure.lock().clone() {
            return Err(Error::Connection(message));
        }
        Ok(())
    }

    async fn fetch_tradable_pairs(&self, _asset: AssetClass) -> Result<Pairs> {
        self.hit("fetch_tradable_pairs")?;
        let mut pairs = Pairs::new();
        pairs.add(fixtures::btc_usd());
        pairs.add(Pair::new("ETH", "USD")?);
        Ok(pairs)
    }

    async fn update_ticker(&self, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        self.base.require(Capability::TickerFetching)?;
        self.base.require_asset(asset)?;
        self.hit("update_ticker")?;
        let mut ticker = Ticker::new(self.name(), pair.clone(), asset, dec!(100));
        ticker.bid = dec!(99.5);
        ticker.ask = dec!(100.5);
        ticker.last_updated = Utc::now();
        self.base.publish_ticker(ticker)
    }

    async fn update_orderbook(&self, pair: &Pair, asset: AssetClass) -> Result<Orderbook> {
        self.base.require(Capability::OrderbookFetching)?;
        self.base.require_asset(asset)?;
        self.hit("update_orderbook")?;
        let book = Orderbook::with_levels(
            self.name(),
            pair.clone(),
            asset,
            vec![Level::new(dec!(99), dec!(1)), Level::new(dec!(98), dec!(2))],
            vec![Level::new(dec!(101), dec!(1)), Level::new(dec!(102), dec!(2))],
        );
        self.base.publish_orderbook(book)
    }

    async fn update_account(&self) -> Result<Holdings> {
        self.base.gate(Capability::AccountInfo)?;
        self.authorised("update_account")?;
        let spot = SubAccount::new("spot")
            .with_balance("BTC", Balance::new(dec!(1.5), dec!(0.5)))
            .with_balance("USD", Balance::new(dec!(1000), Decimal::ZERO));
        self.base
            .publish_holdings(Holdings::new(self.name(), vec![spot]))
    }

    async fn submit_order(&self, submit: &Submit) -> Result<SubmitResponse> {
        self.base.gate(Capability::SubmitOrder)?;
        self.authorised("submit_order")?;
        let response = SubmitResponse {
            order_id: self.order_id(),
            placed: true,
            status: OrderStatus::Active,
            executed_amount: Decimal::ZERO,
            trades: Vec::new(),
        };
        let detail = OrderDetail::from_submit(self.name(), submit, &response);
        self.orders.lock().insert(detail.id.clone(), detail);
        Ok(response)
    }

    async fn modify_order(&self, modify: &Modify) -> Result<ModifyResponse> {
        self.base.gate(Capability::ModifyOrder)?;
        self.authorised("modify_order")?;
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(&modify.order_id)
            .ok_or_else(|| Error::NotFound(format!("order {}", modify.order_id)))?;
        order.price = modify.price;
        order.amount = modify.amount;
        order.remaining_amount = modify.amount - order.executed_amount;
        order.last_updated = Utc::now();
        Ok(ModifyResponse {
            order_id: modify.order_id.clone(),
            price: modify.price,
            amount: modify.amount,
        })
    }

    async fn cancel_order(&self, cancel: &Cancel) -> Result<()> {
        self.base.gate(Capability::CancelOrder)?;
        self.authorised("cancel_order")?;
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(&cancel.order_id)
            .ok_or_else(|| Error::NotFound(format!("order {}", cancel.order_id)))?;
        order.status = OrderStatus::Cancelled;
        order.last_updated = Utc::now();
        Ok(())
    }

    async fn cancel_all_orders(&self, cancel: &Cancel) -> Result<CancelAllResponse> {
        self.base.gate(Capability::CancelOrders)?;
        self.authorised("cancel_all_orders")?;
        let mut response = CancelAllResponse::default();
        let mut orders = self.orders.lock();
        for order in orders
            .values_mut()
            .filter(|o| o.asset == cancel.asset && !o.is_terminal())
            .filter(|o| cancel.pair.as_ref().map_or(true, |p| &o.pair == p))
        {
            order.status = OrderStatus::Cancelled;
            response.record(order.id.clone(), "cancelled");
        }
        Ok(response)
    }

    async fn get_order_info(
        &self,
        order_id: &str,
        _pair: Option<&Pair>,
        _asset: AssetClass,
    ) -> Result<OrderDetail> {
        self.base.gate(Capability::GetOrder)?;
        self.authorised("get_order_info")?;
        self.orders
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("order {order_id}")))
    }

    async fn get_active_orders(&self, request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base.gate(Capability::GetOrders)?;
        self.authorised("get_active_orders")?;
        let mut orders = self.open_orders(request.asset);
        request.filter(&mut orders)?;
        Ok(orders)
    }

    async fn get_order_history(&self, request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base.gate(Capability::GetOrders)?;
        self.authorised("get_order_history")?;
        let mut orders: Vec<OrderDetail> = self
            .orders
            .lock()
            .values()
            .filter(|o| o.asset == request.asset && o.is_terminal())
            .cloned()
            .collect();
        request.filter(&mut orders)?;
        Ok(orders)
    }

    async fn get_deposit_address(
        &self,
        currency: &Currency,
        chain: Option<&str>,
    ) -> Result<DepositAddress> {
        self.base.gate(Capability::CryptoDeposit)?;
        self.hit("get_deposit_address")?;
        Ok(DepositAddress {
            address: format!("{}-deposit-{}", self.name(), currency.lower()),
            tag: None,
            chain: chain.map(str::to_string),
        })
    }

    async fn withdraw_crypto(&self, request: &WithdrawRequest) -> Result<WithdrawResponse> {
        self.base.gate(Capability::CryptoWithdrawal)?;
        self.hit("withdraw_crypto")?;
        self.record_withdrawal(request)
    }

    async fn withdraw_fiat(&self, request: &WithdrawRequest) -> Result<WithdrawResponse> {
        self.base.gate(Capability::FiatWithdrawal)?;
        self.hit("withdraw_fiat")?;
        self.record_withdrawal(request)
    }

    async fn withdraw_fiat_international(
        &self,
        request: &WithdrawRequest,
    ) -> Result<WithdrawResponse> {
        self.base.gate(Capability::InternationalBankWithdrawal)?;
        self.hit("withdraw_fiat_international")?;
        self.record_withdrawal(request)
    }
}
