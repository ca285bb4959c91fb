mod support;

use std::sync::Arc;

use rust_decimal_macros::dec;

use support::stream::eventually;
use tradeplex::adapter::outbound::{binance, MemoryWithdrawStore};
use tradeplex::application::{Engine, VenueFactories};
use tradeplex::domain::{
    AssetClass, Credentials, OrderStatus, OrderType, Pair, Pairs, Side, Submit,
};
use tradeplex::infrastructure::config::{Config, StreamConfig, VenueConfig};
use tradeplex::port::{HttpTransport, MarketStore, WsDialer};
use tradeplex::testkit::stream::ChannelDialer;
use tradeplex::testkit::transport::MockTransport;

const DEPTH: &str =
    r#"{"lastUpdateId":100,"bids":[["99.0","1"]],"asks":[["100.0","1"],["101.0","2"]]}"#;

fn btc_usdt() -> Pair {
    Pair::new("BTC", "USDT").unwrap()
}

fn venue_config(websocket: bool) -> VenueConfig {
    let mut config = VenueConfig::named("binance");
    config.api.authenticated_support = true;
    config.api.credentials = Credentials::new("key", "secret");
    config.features.enabled.websocket_api = websocket;
    config.features.enabled.auto_pair_updates = false;
    config
        .currency_pairs
        .store_pairs(AssetClass::Spot, Pairs::parse_list("BTC-USDT,ETH-USDT", ",").unwrap(), false)
        .unwrap();
    config
        .currency_pairs
        .store_pairs(AssetClass::Spot, Pairs::parse_list("BTC-USDT", ",").unwrap(), true)
        .unwrap();
    config
}

async fn engine(
    websocket: bool,
    transport: Arc<MockTransport>,
    dialer: Arc<ChannelDialer>,
) -> Engine {
    let mut config = Config::default();
    config.exchanges.push(venue_config(websocket));

    let transport: Arc<dyn HttpTransport> = transport;
    let dialer: Arc<dyn WsDialer> = dialer;
    let mut factories = VenueFactories::new();
    factories.insert(
        binance::NAME,
        binance::factory(transport, dialer, StreamConfig::default(), config.rate_limiter.clone()),
    );
    Engine::bootstrap(config, &factories, Arc::new(MemoryWithdrawStore::new()))
        .await
        .unwrap()
}

#[tokio::test]
async fn rest_ticker_and_order_flow() {
    let transport = Arc::new(MockTransport::new());
    let engine = engine(false, transport.clone(), Arc::new(ChannelDialer::new())).await;
    assert!(engine.start().await.is_empty());

    transport.push_json(
        200,
        r#"{"symbol":"BTCUSDT","lastPrice":"105","bidPrice":"104.9","askPrice":"105.1",
            "highPrice":"110","lowPrice":"95","openPrice":"100","volume":"12",
            "quoteVolume":"1260","closeTime":1672515782136}"#,
    );
    let ticker = engine.ticker("binance", &btc_usdt(), AssetClass::Spot).await.unwrap();
    assert_eq!(ticker.bid, dec!(104.9));

    transport.push_json(
        200,
        r#"{"symbol":"BTCUSDT","orderId":42,"clientOrderId":"c42","transactTime":1507725176595,
            "price":"100","origQty":"2","executedQty":"0","status":"NEW","type":"LIMIT",
            "side":"BUY","fills":[]}"#,
    );
    let submit = Submit {
        pair: btc_usdt(),
        asset: AssetClass::Spot,
        side: Side::Buy,
        order_type: OrderType::Limit,
        price: dec!(100),
        amount: dec!(2),
        trigger_price: None,
        client_order_id: None,
        reduce_only: false,
    };
    let placed = engine.submit_order("binance", &submit).await.unwrap();
    assert_eq!(placed.response.order_id, "42");

    let stored = engine.orders().ledger().get("binance", "42").unwrap();
    assert_eq!(stored.status, OrderStatus::Active);
    assert_eq!(stored.remaining_amount, dec!(2));

    transport.push_json(200, r#"{"symbol":"BTCUSDT","orderId":42,"status":"NEW"}"#);
    let queried = engine.query_order("binance", "42").await.unwrap();
    assert_eq!(queried.pair, btc_usdt());
    let query = &transport.requests()[2];
    assert!(query.url.contains("/api/v3/order?"));
    assert!(query.url.contains("symbol=BTCUSDT"));
    assert!(query.url.contains("orderId=42"));

    transport.push_json(200, r#"{"symbol":"BTCUSDT","orderId":42,"status":"CANCELED"}"#);
    engine.cancel_order("binance", "42").await.unwrap();
    assert_eq!(
        engine.orders().ledger().get("binance", "42").unwrap().status,
        OrderStatus::Cancelled
    );

    let cancel = &transport.requests()[3];
    assert!(cancel.url.contains("symbol=BTCUSDT"));
    assert!(cancel.url.contains("orderId=42"));
}

#[tokio::test]
async fn streamed_depth_resyncs_from_rest() {
    let transport = Arc::new(MockTransport::new());
    let dialer = Arc::new(ChannelDialer::new());
    let engine = engine(true, transport.clone(), dialer.clone()).await;

    // Acknowledge every subscription the venue sends on start.
    let server = {
        let dialer = dialer.clone();
        tokio::spawn(async move {
            let mut server = dialer.accept().await.unwrap();
            let mut streams = Vec::new();
            for _ in 0..3 {
                let request = server.next_request().await.unwrap();
                assert_eq!(request["method"], "SUBSCRIBE");
                streams.push(request["params"][0].as_str().unwrap().to_string());
                server.reply(request["id"].as_i64().unwrap());
            }
            (server, streams)
        })
    };
    assert!(engine.start().await.is_empty());
    let (server, streams) = server.await.unwrap();
    assert!(streams.contains(&"btcusdt@depth@100ms".to_string()));
    assert!(streams.contains(&"btcusdt@ticker".to_string()));

    transport.push_json(200, DEPTH);
    server.send_text(
        r#"{"e":"depthUpdate","E":1672515782136,"s":"BTCUSDT","U":99,"u":100,
            "b":[],"a":[["100.0","5"]]}"#,
    );

    let caches = engine.caches().clone();
    let book = eventually(|| caches.orderbook("binance", &btc_usdt(), AssetClass::Spot).ok())
        .await
        .expect("snapshot installed");
    assert_eq!(book.sequence, Some(100));
    assert!(transport.requests()[0].url.contains("/api/v3/depth?symbol=BTCUSDT"));

    server.send_text(
        r#"{"e":"depthUpdate","E":1672515782200,"s":"BTCUSDT","U":101,"u":101,
            "b":[],"a":[["100.0","0"]]}"#,
    );
    let book = eventually(|| {
        caches
            .orderbook("binance", &btc_usdt(), AssetClass::Spot)
            .ok()
            .filter(|b| b.sequence == Some(101))
    })
    .await
    .expect("delta applied");
    assert_eq!(book.best_ask().unwrap().price, dec!(101.0));

    engine.shutdown().await;
}
