//! Binance spot venue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dto::{
    millis, AccountInfo, DepositAddressResponse, DepositRecord, DepthSnapshot, ExchangeInfo,
    OrderResponse, Ticker24h, WithdrawApplied, WithdrawRecord,
};
use super::signer::BinanceSigner;
use super::stream::{symbol, BinanceProtocol, SymbolMap};
use crate::domain::{
    AssetClass, Balance, Cancel, CancelAllResponse, Candle, Capabilities, Capability, Currency,
    DepositAddress, Destination, FundingRecord, Holdings, Interval, IntervalRule,
    KlineCapabilities, KlineSeries, Level, OrderDetail, OrderType, Orderbook, OrdersRequest, Pair,
    Pairs, SubAccount, Submit, SubmitResponse, Subscription, Ticker, WithdrawRequest,
    WithdrawResponse,
};
use crate::error::{Error, Result};
use crate::infrastructure::config::{StreamConfig, VenueConfig};
use crate::infrastructure::limiter::RateLimiter;
use crate::infrastructure::request::{RequestDescriptor, Requester};
use crate::infrastructure::websocket::{Frame, WebsocketManager, WsSettings};
use crate::port::{HttpTransport, MarketStore, Venue, VenueBase, WsDialer};

pub const REST_URL: &str = "https://api.binance.com";
pub const STREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// `urlEndpoints` keys that override the defaults.
pub const REST_ENDPOINT_KEY: &str = "RestSpotURL";
pub const STREAM_ENDPOINT_KEY: &str = "WebsocketSpotURL";

const DEPTH_LIMIT: u32 = 1000;

fn capabilities() -> Capabilities {
    [
        Capability::TickerFetching,
        Capability::TickerBatching,
        Capability::OrderbookFetching,
        Capability::AutoPairUpdates,
        Capability::AccountInfo,
        Capability::KlineFetching,
        Capability::SubmitOrder,
        Capability::CancelOrder,
        Capability::CancelOrders,
        Capability::GetOrder,
        Capability::GetOrders,
        Capability::CryptoDeposit,
        Capability::CryptoWithdrawal,
        Capability::DepositHistory,
        Capability::WithdrawalHistory,
        Capability::Websocket,
        Capability::WebsocketTicker,
        Capability::WebsocketOrderbook,
        Capability::WebsocketTrades,
        Capability::WebsocketMessageCorrelation,
    ]
    .into_iter()
    .collect()
}

fn klines() -> KlineCapabilities {
    KlineCapabilities {
        intervals: Interval::ALL
            .into_iter()
            .filter(|i| !matches!(i, Interval::TwoWeek | Interval::OneYear))
            .collect(),
        result_limit: 1000,
        rule: IntervalRule::Short,
    }
}

/// Spot REST and market streams.
pub struct Binance {
    base: VenueBase,
    rest: Arc<Requester>,
    symbols: SymbolMap,
    stream: WebsocketManager,
    resync: Mutex<Option<JoinHandle<()>>>,
}

impl Binance {
    pub fn new(
        config: &VenueConfig,
        store: Arc<dyn MarketStore>,
        transport: Arc<dyn HttpTransport>,
        dialer: Arc<dyn WsDialer>,
        stream_config: &StreamConfig,
        limiter: RateLimiter,
    ) -> Self {
        let endpoint = |key: &str, default: &str| {
            config
                .api
                .url_endpoints
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let rest = Requester::new(&config.name, endpoint(REST_ENDPOINT_KEY, REST_URL), transport)
            .configured(config)
            .with_limiter(limiter)
            .with_signer(Arc::new(BinanceSigner::new(&config.name)));

        let symbols = SymbolMap::default();
        let protocol = Arc::new(BinanceProtocol::new(&config.name, Arc::clone(&symbols)));
        let settings = WsSettings::from_config(
            endpoint(STREAM_ENDPOINT_KEY, STREAM_URL),
            config,
            stream_config,
        );
        let stream = WebsocketManager::new(
            &config.name,
            settings,
            protocol,
            dialer,
            Arc::clone(&store),
        );

        Self {
            base: VenueBase::new(&config.name, capabilities(), store).with_klines(klines()),
            rest: Arc::new(rest),
            symbols,
            stream,
            resync: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn stream(&self) -> &WebsocketManager {
        &self.stream
    }

    fn remember(&self, pair: &Pair) {
        self.symbols.insert(symbol(pair), pair.clone());
    }

    fn pair_for(&self, sym: &str) -> Result<Pair> {
        self.symbols
            .get(sym)
            .map(|p| p.clone())
            .ok_or_else(|| Error::InvalidPair(format!("{}: unknown symbol {sym}", self.name())))
    }

    fn spot_only(&self, asset: AssetClass) -> Result<()> {
        if asset == AssetClass::Spot {
            self.base.require_asset(asset)
        } else {
            Err(Error::InvalidAsset(format!("{} only trades spot", self.name())))
        }
    }

    async fn signed<T>(&self, request: RequestDescriptor) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let credentials = self.base.credentials();
        let result = self
            .rest
            .send(request.authenticated().with_nonce(), Some(&credentials))
            .await;
        self.base.track(result)
    }

    fn ticker_from(&self, raw: Ticker24h, pair: Pair) -> Ticker {
        let mut ticker = Ticker::new(self.name(), pair, AssetClass::Spot, raw.last_price);
        ticker.bid = raw.bid_price;
        ticker.ask = raw.ask_price;
        ticker.high = raw.high_price;
        ticker.low = raw.low_price;
        ticker.open = raw.open_price;
        ticker.close = raw.last_price;
        ticker.volume = raw.volume;
        ticker.quote_volume = raw.quote_volume;
        ticker.last_updated = millis(raw.close_time).min(Utc::now());
        ticker
    }

    fn order_params(&self, submit: &Submit) -> Result<RequestDescriptor> {
        let mut request = RequestDescriptor::post("/api/v3/order")
            .query("symbol", symbol(&submit.pair))
            .query("side", if submit.side.is_long() { "BUY" } else { "SELL" })
            .query("quantity", submit.amount.normalize());
        let time_in_force = match submit.order_type {
            OrderType::Market => {
                request = request.query("type", "MARKET");
                None
            }
            OrderType::Limit => Some("GTC"),
            OrderType::ImmediateOrCancel => Some("IOC"),
            OrderType::FillOrKill => Some("FOK"),
            OrderType::PostOnly => {
                request = request
                    .query("type", "LIMIT_MAKER")
                    .query("price", submit.price.normalize());
                None
            }
            other => return Err(Error::unsupported(self.name(), format!("order type {other}"))),
        };
        if let Some(tif) = time_in_force {
            request = request
                .query("type", "LIMIT")
                .query("timeInForce", tif)
                .query("price", submit.price.normalize());
        }
        if let Some(id) = &submit.client_order_id {
            request = request.query("newClientOrderId", id);
        }
        Ok(request.query("newOrderRespType", "FULL"))
    }

    async fn open_orders(&self, pair: Option<&Pair>) -> Result<Vec<OrderResponse>> {
        let mut request = RequestDescriptor::get("/api/v3/openOrders");
        if let Some(pair) = pair {
            request = request.query("symbol", symbol(pair));
        }
        self.signed(request).await
    }

    fn details(&self, orders: Vec<OrderResponse>) -> Vec<OrderDetail> {
        orders
            .into_iter()
            .filter_map(|o| match self.pair_for(&o.symbol) {
                Ok(pair) => Some(o.into_detail(self.name(), pair)),
                Err(e) => {
                    debug!(venue = %self.name(), error = %e, "Skipping order");
                    None
                }
            })
            .collect()
    }

    /// Refetch a book whenever the stream reports it unusable.
    fn spawn_resync(&self) {
        let mut slot = self.resync.lock();
        if slot.is_some() {
            return;
        }
        let Some(mut requests) = self.stream.take_resync_requests() else {
            return;
        };
        let rest = Arc::clone(&self.rest);
        let store = Arc::clone(self.base.store());
        let venue = self.name().to_string();
        *slot = Some(tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                match fetch_depth(&rest, &venue, &request.pair).await {
                    Ok(book) => {
                        if let Err(e) = store.apply_book_snapshot(book) {
                            warn!(venue = %venue, pair = %request.pair, error = %e, "Resync snapshot rejected");
                        }
                    }
                    Err(e) => {
                        warn!(venue = %venue, pair = %request.pair, error = %e, "Resync fetch failed");
                    }
                }
            }
        }));
    }
}

async fn fetch_depth(rest: &Requester, venue: &str, pair: &Pair) -> Result<Orderbook> {
    let snapshot: DepthSnapshot = rest
        .send(
            RequestDescriptor::get("/api/v3/depth")
                .query("symbol", symbol(pair))
                .query("limit", DEPTH_LIMIT),
            None,
        )
        .await?;
    let levels = |side: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>| {
        side.into_iter().map(|(p, a)| Level::new(p, a)).collect()
    };
    let mut book = Orderbook::with_levels(
        venue,
        pair.clone(),
        AssetClass::Spot,
        levels(snapshot.bids),
        levels(snapshot.asks),
    );
    book.sequence = Some(snapshot.last_update_id);
    Ok(book)
}

fn candle(row: &Value) -> Result<Candle> {
    let fields = Frame::new(row).items()?;
    let [open_time, open, high, low, close, volume, ..] = fields.as_slice() else {
        return Err(Error::Decode(format!("short kline row {row}")));
    };
    Ok(Candle {
        time: open_time.as_millis()?,
        open: open.as_decimal()?,
        high: high.as_decimal()?,
        low: low.as_decimal()?,
        close: close.as_decimal()?,
        volume: volume.as_decimal()?,
    })
}

#[async_trait]
impl Venue for Binance {
    fn base(&self) -> &VenueBase {
        &self.base
    }

    async fn apply_config(&self, config: &VenueConfig) -> Result<()> {
        self.base.apply_config(config)?;
        let manager = self.base.pair_manager();
        for asset in manager.assets() {
            for pair in manager.get_pairs(asset, false).unwrap_or_default() {
                self.remember(&pair);
            }
        }
        self.stream.set_credentials(Some(self.base.credentials()));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.resync.lock().take() {
            task.abort();
        }
        self.stream.shutdown().await
    }

    async fn fetch_tradable_pairs(&self, asset: AssetClass) -> Result<Pairs> {
        if asset != AssetClass::Spot {
            return Err(Error::InvalidAsset(format!("{} only trades spot", self.name())));
        }
        let info: ExchangeInfo = self
            .rest
            .send(RequestDescriptor::get("/api/v3/exchangeInfo"), None)
            .await?;
        let mut pairs = Pairs::new();
        for s in info.symbols.iter().filter(|s| s.is_trading()) {
            match Pair::new(s.base_asset.as_str(), s.quote_asset.as_str()) {
                Ok(pair) => {
                    self.symbols.insert(s.symbol.to_ascii_uppercase(), pair.clone());
                    pairs.add(pair);
                }
                Err(e) => debug!(symbol = %s.symbol, error = %e, "Skipping symbol"),
            }
        }
        info!(venue = %self.name(), pairs = pairs.len(), "Fetched tradable pairs");
        Ok(pairs)
    }

    async fn update_ticker(&self, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        self.base.require(Capability::TickerFetching)?;
        self.spot_only(asset)?;
        self.remember(pair);
        let raw: Ticker24h = self
            .rest
            .send(
                RequestDescriptor::get("/api/v3/ticker/24hr").query("symbol", symbol(pair)),
                None,
            )
            .await?;
        let ticker = self.ticker_from(raw, pair.clone());
        self.base.publish_ticker(ticker)
    }

    async fn update_tickers(&self, asset: AssetClass) -> Result<()> {
        self.base.require(Capability::TickerBatching)?;
        self.spot_only(asset)?;
        let enabled = self.base.get_pairs(asset, true)?;
        let all: Vec<Ticker24h> = self
            .rest
            .send(RequestDescriptor::get("/api/v3/ticker/24hr"), None)
            .await?;
        let mut published = 0;
        for raw in all {
            let Ok(pair) = self.pair_for(&raw.symbol) else {
                continue;
            };
            if !enabled.contains(&pair) {
                continue;
            }
            self.base.publish_ticker(self.ticker_from(raw, pair))?;
            published += 1;
        }
        debug!(venue = %self.name(), published, "Tickers updated");
        Ok(())
    }

    async fn update_orderbook(&self, pair: &Pair, asset: AssetClass) -> Result<Orderbook> {
        self.base.require(Capability::OrderbookFetching)?;
        self.spot_only(asset)?;
        self.remember(pair);
        let book = fetch_depth(&self.rest, self.name(), pair).await?;
        self.base.publish_orderbook(book)
    }

    async fn historic_candles(
        &self,
        pair: &Pair,
        asset: AssetClass,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<KlineSeries> {
        self.base.require(Capability::KlineFetching)?;
        self.spot_only(asset)?;
        let wire = self.base.klines().format(self.name(), interval)?;
        let rows: Vec<Value> = self
            .rest
            .send(
                RequestDescriptor::get("/api/v3/klines")
                    .query("symbol", symbol(pair))
                    .query("interval", wire)
                    .query("startTime", start.timestamp_millis())
                    // Inclusive on the venue side.
                    .query("endTime", end.timestamp_millis() - 1)
                    .query("limit", self.base.klines().result_limit),
                None,
            )
            .await?;
        let mut series = KlineSeries::new(self.name(), pair.clone(), asset, interval);
        series.candles = rows.iter().map(candle).collect::<Result<_>>()?;
        Ok(series)
    }

    async fn update_account(&self) -> Result<Holdings> {
        self.base.gate(Capability::AccountInfo)?;
        let account: AccountInfo = self.signed(RequestDescriptor::get("/api/v3/account")).await?;
        let mut spot = SubAccount::new("spot");
        spot.asset = Some(AssetClass::Spot);
        for b in account.balances {
            let total = b.free + b.locked;
            if total.is_zero() {
                continue;
            }
            spot = spot.with_balance(b.asset, Balance::new(total, b.locked));
        }
        self.base
            .publish_holdings(Holdings::new(self.name(), vec![spot]))
    }

    async fn submit_order(&self, submit: &Submit) -> Result<SubmitResponse> {
        self.base.gate(Capability::SubmitOrder)?;
        self.spot_only(submit.asset)?;
        self.remember(&submit.pair);
        let request = self.order_params(submit)?;
        let placed: OrderResponse = self.signed(request).await?;
        let status = super::dto::order_status(&placed.status);
        Ok(SubmitResponse {
            order_id: placed.order_id.to_string(),
            placed: true,
            status,
            executed_amount: placed.executed_qty,
            trades: placed.fills(submit.side),
        })
    }

    async fn cancel_order(&self, cancel: &Cancel) -> Result<()> {
        self.base.gate(Capability::CancelOrder)?;
        let pair = cancel.pair.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!("{}: cancelling needs the order's pair", self.name()))
        })?;
        let mut request = RequestDescriptor::delete("/api/v3/order").query("symbol", symbol(pair));
        request = if cancel.order_id.is_empty() {
            let client_id = cancel.client_order_id.as_deref().ok_or_else(|| {
                Error::InvalidInput(format!("{}: cancel needs an order id", self.name()))
            })?;
            request.query("origClientOrderId", client_id)
        } else {
            request.query("orderId", &cancel.order_id)
        };
        let _: OrderResponse = self.signed(request).await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, cancel: &Cancel) -> Result<CancelAllResponse> {
        self.base.gate(Capability::CancelOrders)?;
        let mut response = CancelAllResponse::default();
        if let Some(pair) = &cancel.pair {
            let request =
                RequestDescriptor::delete("/api/v3/openOrders").query("symbol", symbol(pair));
            let cancelled: Vec<OrderResponse> = self.signed(request).await?;
            for order in cancelled {
                response.record(order.order_id.to_string(), "cancelled");
            }
            return Ok(response);
        }

        for order in self.open_orders(None).await? {
            let request = RequestDescriptor::delete("/api/v3/order")
                .query("symbol", &order.symbol)
                .query("orderId", order.order_id);
            let status = match self.signed::<OrderResponse>(request).await {
                Ok(_) => "cancelled".to_string(),
                Err(e) => e.to_string(),
            };
            response.record(order.order_id.to_string(), status);
        }
        Ok(response)
    }

    async fn get_order_info(
        &self,
        order_id: &str,
        pair: Option<&Pair>,
        asset: AssetClass,
    ) -> Result<OrderDetail> {
        self.base.gate(Capability::GetOrder)?;
        self.spot_only(asset)?;
        let pair = pair.ok_or_else(|| {
            Error::InvalidInput(format!("{}: order lookup needs the order's pair", self.name()))
        })?;
        let order: OrderResponse = self
            .signed(
                RequestDescriptor::get("/api/v3/order")
                    .query("symbol", symbol(pair))
                    .query("orderId", order_id),
            )
            .await?;
        Ok(order.into_detail(self.name(), pair.clone()))
    }

    async fn get_active_orders(&self, request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base.gate(Capability::GetOrders)?;
        self.spot_only(request.asset)?;
        let single = (request.pairs.len() == 1).then(|| request.pairs.iter().next()).flatten();
        let mut orders = self.details(self.open_orders(single).await?);
        request.filter(&mut orders)?;
        Ok(orders)
    }

    async fn get_order_history(&self, request: &OrdersRequest) -> Result<Vec<OrderDetail>> {
        self.base.gate(Capability::GetOrders)?;
        self.spot_only(request.asset)?;
        let pairs = if request.pairs.is_empty() {
            self.base.get_pairs(request.asset, true)?
        } else {
            request.pairs.clone()
        };
        let mut orders = Vec::new();
        for pair in &pairs {
            let mut query =
                RequestDescriptor::get("/api/v3/allOrders").query("symbol", symbol(pair));
            if let Some(start) = request.start {
                query = query.query("startTime", start.timestamp_millis());
            }
            if let Some(end) = request.end {
                query = query.query("endTime", end.timestamp_millis());
            }
            let page: Vec<OrderResponse> = self.signed(query).await?;
            orders.extend(page.into_iter().map(|o| o.into_detail(self.name(), pair.clone())));
        }
        request.filter(&mut orders)?;
        Ok(orders)
    }

    async fn get_deposit_address(
        &self,
        currency: &Currency,
        chain: Option<&str>,
    ) -> Result<DepositAddress> {
        self.base.gate(Capability::CryptoDeposit)?;
        let mut request =
            RequestDescriptor::get("/sapi/v1/capital/deposit/address").query("coin", currency);
        if let Some(chain) = chain {
            request = request.query("network", chain);
        }
        let raw: DepositAddressResponse = self.signed(request).await?;
        Ok(DepositAddress {
            address: raw.address,
            tag: Some(raw.tag).filter(|t| !t.is_empty()),
            chain: chain.map(str::to_string),
        })
    }

    async fn withdraw_crypto(&self, request: &WithdrawRequest) -> Result<WithdrawResponse> {
        self.base.gate(Capability::CryptoWithdrawal)?;
        let Destination::Crypto(dest) = &request.destination else {
            return Err(Error::InvalidInput(format!(
                "{}: crypto withdrawal needs a crypto destination",
                self.name()
            )));
        };
        let mut query = RequestDescriptor::post("/sapi/v1/capital/withdraw/apply")
            .query("coin", &request.currency)
            .query("address", &dest.address)
            .query("amount", request.amount.normalize());
        if let Some(tag) = &dest.address_tag {
            query = query.query("addressTag", tag);
        }
        if let Some(chain) = &dest.chain {
            query = query.query("network", chain);
        }
        if !request.description.is_empty() {
            query = query.query("name", &request.description);
        }
        let applied: WithdrawApplied = self.signed(query).await?;
        Ok(WithdrawResponse {
            id: applied.id,
            status: "submitted".into(),
        })
    }

    async fn get_funding_history(&self) -> Result<Vec<FundingRecord>> {
        self.base.allow_authenticated_request()?;
        let deposits: Vec<DepositRecord> = self
            .signed(RequestDescriptor::get("/sapi/v1/capital/deposit/hisrec"))
            .await?;
        let withdrawals: Vec<WithdrawRecord> = self
            .signed(RequestDescriptor::get("/sapi/v1/capital/withdraw/history"))
            .await?;
        let mut records: Vec<FundingRecord> = deposits
            .into_iter()
            .map(DepositRecord::into_record)
            .chain(withdrawals.into_iter().map(WithdrawRecord::into_record))
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn ws_connect(&self) -> Result<()> {
        self.base.require(Capability::Websocket)?;
        self.spawn_resync();
        self.stream.connect().await
    }

    async fn ws_subscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        self.base.require(Capability::Websocket)?;
        for pair in subscriptions.iter().filter_map(|s| s.pair.as_ref()) {
            self.remember(pair);
        }
        self.stream.subscribe(subscriptions).await
    }

    async fn ws_unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        self.base.require(Capability::Websocket)?;
        self.stream.unsubscribe(subscriptions).await
    }
}

impl std::fmt::Debug for Binance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binance")
            .field("base", &self.base)
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Caches;
    use crate::domain::{OrderStatus, Side};
    use crate::error::ErrorKind;
    use crate::port::Method;
    use crate::testkit::stream::ChannelDialer;
    use crate::testkit::transport::MockTransport;
    use rust_decimal_macros::dec;

    fn config() -> VenueConfig {
        let mut config = VenueConfig::named("binance");
        config.api.authenticated_support = true;
        config.api.credentials = crate::domain::Credentials::new("key", "secret");
        config
            .currency_pairs
            .store_pairs(
                AssetClass::Spot,
                Pairs::parse_list("BTC-USDT,ETH-USDT", ",").unwrap(),
                false,
            )
            .unwrap();
        config
            .currency_pairs
            .store_pairs(AssetClass::Spot, Pairs::parse_list("BTC-USDT", ",").unwrap(), true)
            .unwrap();
        config
    }

    async fn venue() -> (Binance, Arc<MockTransport>, Arc<Caches>) {
        let transport = Arc::new(MockTransport::new());
        let caches = Arc::new(Caches::default());
        let config = config();
        let venue = Binance::new(
            &config,
            caches.clone(),
            transport.clone(),
            Arc::new(ChannelDialer::new()),
            &StreamConfig::default(),
            RateLimiter::disabled(),
        );
        venue.apply_config(&config).await.unwrap();
        (venue, transport, caches)
    }

    fn btc_usdt() -> Pair {
        Pair::new("BTC", "USDT").unwrap()
    }

    #[tokio::test]
    async fn ticker_is_fetched_once_then_cached() {
        let (venue, transport, _) = venue().await;
        transport.push_json(
            200,
            r#"{"symbol":"BTCUSDT","lastPrice":"105","bidPrice":"104.9","askPrice":"105.1",
                "highPrice":"110","lowPrice":"95","openPrice":"100","volume":"12",
                "quoteVolume":"1260","closeTime":1672515782136}"#,
        );
        let ticker = venue.fetch_ticker(&btc_usdt(), AssetClass::Spot).await.unwrap();
        assert_eq!(ticker.last, dec!(105));
        let again = venue.fetch_ticker(&btc_usdt(), AssetClass::Spot).await.unwrap();
        assert_eq!(ticker, again);

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://api.binance.com/api/v3/ticker/24hr?symbol=BTCUSDT");
    }

    #[tokio::test]
    async fn orderbook_carries_update_id() {
        let (venue, transport, _) = venue().await;
        transport.push_json(
            200,
            r#"{"lastUpdateId":1027024,"bids":[["4.00","431.00"]],"asks":[["4.02","12.00"]]}"#,
        );
        let book = venue.update_orderbook(&btc_usdt(), AssetClass::Spot).await.unwrap();
        assert_eq!(book.sequence, Some(1_027_024));
        assert_eq!(book.best_bid().unwrap().price, dec!(4.00));
    }

    #[tokio::test]
    async fn exchange_info_lists_trading_symbols() {
        let (venue, transport, _) = venue().await;
        transport.push_json(
            200,
            r#"{"symbols":[
                {"symbol":"BTCUSDT","status":"TRADING","baseAsset":"BTC","quoteAsset":"USDT"},
                {"symbol":"LUNAUSDT","status":"BREAK","baseAsset":"LUNA","quoteAsset":"USDT"}]}"#,
        );
        let pairs = venue.fetch_tradable_pairs(AssetClass::Spot).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(venue
            .fetch_tradable_pairs(AssetClass::Futures)
            .await
            .is_err_and(|e| e.kind() == ErrorKind::InvalidAsset));
    }

    #[tokio::test]
    async fn submit_signs_and_maps_response() {
        let (venue, transport, _) = venue().await;
        transport.push_json(
            200,
            r#"{"symbol":"BTCUSDT","orderId":28,"clientOrderId":"x","transactTime":1507725176595,
                "price":"100","origQty":"1","executedQty":"0","status":"NEW","type":"LIMIT",
                "side":"BUY","fills":[]}"#,
        );
        let submit = Submit {
            pair: btc_usdt(),
            asset: AssetClass::Spot,
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: dec!(100),
            amount: dec!(1),
            trigger_price: None,
            client_order_id: None,
            reduce_only: false,
        };
        let response = venue.submit_order(&submit).await.unwrap();
        assert_eq!(response.order_id, "28");
        assert_eq!(response.status, OrderStatus::Active);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert!(sent.url.contains("timeInForce=GTC"));
        assert!(sent.url.contains("&signature="));
        assert_eq!(sent.headers["X-MBX-APIKEY"], "key");
    }

    #[tokio::test]
    async fn rejected_key_blocks_further_requests() {
        let (venue, transport, _) = venue().await;
        transport.push_json(401, r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions."}"#);
        let err = venue.update_account().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRejected);

        let err = venue.update_account().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRejected);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn account_balances_skip_zero() {
        let (venue, transport, caches) = venue().await;
        transport.push_json(
            200,
            r#"{"balances":[{"asset":"BTC","free":"1.5","locked":"0.5"},
                            {"asset":"LTC","free":"0","locked":"0"}]}"#,
        );
        let holdings = venue.update_account().await.unwrap();
        let btc = holdings.total(&Currency::new("BTC"));
        assert_eq!(btc.total, dec!(2));
        assert_eq!(btc.hold, dec!(0.5));
        assert_eq!(holdings.accounts[0].balances.len(), 1);
        assert!(caches.holdings("binance").is_ok());
    }

    #[tokio::test]
    async fn klines_parse_rows() {
        let (venue, transport, _) = venue().await;
        transport.push_json(
            200,
            r#"[[1499040000000,"0.01634790","0.80000000","0.01575800","0.01577100",
                 "148976.11427815",1499644799999,"2434.19055334",308,"1756.87402397",
                 "28.46694368","0"]]"#,
        );
        let start = millis(1_499_040_000_000);
        let series = venue
            .historic_candles(
                &btc_usdt(),
                AssetClass::Spot,
                start,
                start + chrono::Duration::hours(1),
                Interval::OneHour,
            )
            .await
            .unwrap();
        assert_eq!(series.candles.len(), 1);
        assert_eq!(series.candles[0].high, dec!(0.8));
        assert!(transport.requests()[0].url.contains("interval=1h"));

        let err = venue
            .historic_candles(&btc_usdt(), AssetClass::Spot, start, start, Interval::OneYear)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn cancel_needs_pair_and_cancel_all_records_each() {
        let (venue, transport, _) = venue().await;
        let err = venue
            .cancel_order(&Cancel::new("28", AssetClass::Spot))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        transport.push_json(
            200,
            r#"[{"symbol":"BTCUSDT","orderId":1,"status":"NEW"},
                {"symbol":"BTCUSDT","orderId":2,"status":"NEW"}]"#,
        );
        transport.push_json(200, r#"{"symbol":"BTCUSDT","orderId":1,"status":"CANCELED"}"#);
        transport.push_json(400, r#"{"code":-2011,"msg":"Unknown order sent."}"#);
        let response = venue
            .cancel_all_orders(&Cancel::new("", AssetClass::Spot))
            .await
            .unwrap();
        assert_eq!(response.status["1"], "cancelled");
        assert!(response.status["2"].contains("Unknown order"));
    }
}
