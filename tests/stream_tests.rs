mod support;

use std::time::Duration;

use rust_decimal_macros::dec;

use support::stream::{eventually, fast_settings, record_states, rig, rig_with, sub, ticker};
use tradeplex::domain::{channel, AssetClass, Credentials, Pair};
use tradeplex::error::ErrorKind;
use tradeplex::infrastructure::config::OrderbookConfig;
use tradeplex::infrastructure::websocket::ConnectionState;
use tradeplex::port::{Correlation, MarketStore};

#[tokio::test]
async fn repeated_subscribe_sends_one_request() {
    let rig = rig(Correlation::None, OrderbookConfig::default());
    rig.manager.connect().await.unwrap();
    let mut server = rig.dialer.accept().await.unwrap();

    rig.manager.subscribe(&[ticker("BTC")]).await.unwrap();
    rig.manager.subscribe(&[ticker("BTC")]).await.unwrap();

    let request = server.next_request().await.unwrap();
    assert_eq!(request["method"], "subscribe");
    assert_eq!(request["channel"], channel::TICKER);
    assert!(server.try_next_request().is_none());
    assert_eq!(rig.manager.subscriptions().len(), 1);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn dropped_link_replays_every_subscription_in_order() {
    let rig = rig(Correlation::None, OrderbookConfig::default());
    rig.manager.connect().await.unwrap();
    let mut first = rig.dialer.accept().await.unwrap();
    rig.manager
        .subscribe(&[ticker("BTC"), ticker("ETH")])
        .await
        .unwrap();
    first.next_request().await.unwrap();
    first.next_request().await.unwrap();

    let states = record_states(&rig.manager, ConnectionState::Subscribed);
    first.close();
    let mut second = rig.dialer.accept().await.unwrap();
    let replayed = [
        second.next_request().await.unwrap(),
        second.next_request().await.unwrap(),
    ];
    assert_eq!(replayed[0]["base"], "BTC");
    assert_eq!(replayed[1]["base"], "ETH");

    let seen = states.await.unwrap();
    assert_eq!(seen.first(), Some(&ConnectionState::Degraded));
    assert_eq!(seen.last(), Some(&ConnectionState::Subscribed));
    assert!(second.try_next_request().is_none());
    assert_eq!(rig.manager.stats().reconnects, 1);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn silent_link_degrades_and_redials() {
    let mut settings = fast_settings();
    settings.traffic_timeout = Duration::from_millis(100);
    let rig = rig_with(Correlation::None, OrderbookConfig::default(), settings);
    let mut diagnostics = rig.manager.diagnostics();
    rig.manager.connect().await.unwrap();
    // Held open but never written to.
    let _silent = rig.dialer.accept().await.unwrap();

    let _second = tokio::time::timeout(Duration::from_secs(2), rig.dialer.accept())
        .await
        .expect("redial after traffic timeout")
        .unwrap();
    let degraded = diagnostics.recv().await.unwrap();
    assert!(degraded.message.contains("no traffic within timeout"));
    assert_eq!(rig.manager.stats().reconnects, 1);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn steady_traffic_keeps_link_up() {
    let mut settings = fast_settings();
    settings.traffic_timeout = Duration::from_millis(150);
    let rig = rig_with(Correlation::None, OrderbookConfig::default(), settings);
    rig.manager.connect().await.unwrap();
    let server = rig.dialer.accept().await.unwrap();

    for _ in 0..8 {
        server.send_text(r#"{"channel":"heartbeat"}"#);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(rig.manager.state(), ConnectionState::Subscribed);
    assert_eq!(rig.manager.stats().reconnects, 0);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn login_precedes_replay() {
    let mut settings = fast_settings();
    settings.authenticate = true;
    let rig = rig_with(Correlation::ById, OrderbookConfig::default(), settings);
    rig.manager.set_credentials(Some(Credentials::new("key", "secret")));
    rig.manager.subscribe(&[ticker("BTC")]).await.unwrap();

    let states = record_states(&rig.manager, ConnectionState::Subscribed);
    let manager = rig.manager.clone();
    let connecting = tokio::spawn(async move { manager.connect().await });
    let mut server = rig.dialer.accept().await.unwrap();
    let mut watch = rig.manager.watch_state();

    let login = server.next_request().await.unwrap();
    assert_eq!(login["method"], "auth");
    assert_eq!(login["key"], "key");
    watch
        .wait_for(|s| *s == ConnectionState::Authenticating)
        .await
        .unwrap();
    server.reply(login["id"].as_i64().unwrap());

    let replay = server.next_request().await.unwrap();
    assert_eq!(replay["method"], "subscribe");
    assert_eq!(replay["base"], "BTC");
    watch
        .wait_for(|s| *s == ConnectionState::Authenticated)
        .await
        .unwrap();
    server.reply(replay["id"].as_i64().unwrap());

    connecting.await.unwrap().unwrap();
    let seen = states.await.unwrap();
    let position = |state| seen.iter().position(|s| *s == state).unwrap();
    assert!(position(ConnectionState::Authenticating) < position(ConnectionState::Authenticated));
    assert_eq!(seen.last(), Some(&ConnectionState::Subscribed));
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejected_login_degrades() {
    let mut settings = fast_settings();
    settings.authenticate = true;
    let rig = rig_with(Correlation::ById, OrderbookConfig::default(), settings);
    rig.manager.set_credentials(Some(Credentials::new("key", "wrong")));

    let manager = rig.manager.clone();
    let connecting = tokio::spawn(async move { manager.connect().await });
    let mut server = rig.dialer.accept().await.unwrap();
    let login = server.next_request().await.unwrap();
    server.reject(login["id"].as_i64().unwrap(), "invalid api key");

    let err = connecting.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRejected);
    assert_eq!(rig.manager.state(), ConnectionState::Degraded);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsubscribe_removes_from_ledger() {
    let rig = rig(Correlation::None, OrderbookConfig::default());
    rig.manager.connect().await.unwrap();
    let mut server = rig.dialer.accept().await.unwrap();

    rig.manager
        .subscribe(&[ticker("BTC"), sub(channel::TRADES, "BTC")])
        .await
        .unwrap();
    server.next_request().await.unwrap();
    server.next_request().await.unwrap();

    rig.manager.unsubscribe(&[ticker("BTC")]).await.unwrap();
    let request = server.next_request().await.unwrap();
    assert_eq!(request["method"], "unsubscribe");
    assert_eq!(rig.manager.subscriptions(), vec![sub(channel::TRADES, "BTC")]);
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejected_subscription_is_not_recorded() {
    let rig = rig(Correlation::ById, OrderbookConfig::default());
    rig.manager.connect().await.unwrap();
    let mut server = rig.dialer.accept().await.unwrap();

    let responder = tokio::spawn(async move {
        let request = server.next_request().await.unwrap();
        server.reject(request["id"].as_i64().unwrap(), "no such market");
        server
    });
    let err = rig.manager.subscribe(&[ticker("XYZ")]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VenueError);
    let _server = responder.await.unwrap();
    assert!(rig.manager.subscriptions().is_empty());
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn streamed_book_and_trades_reach_consumers() {
    let rig = rig(Correlation::None, OrderbookConfig {
        websocket_buffer_enabled: false,
        ..OrderbookConfig::default()
    });
    let mut trades = rig.manager.trades();
    rig.manager.connect().await.unwrap();
    let server = rig.dialer.accept().await.unwrap();

    server.send_text(
        r#"{"channel":"book","base":"BTC","quote":"USD","seq":1,"snapshot":true,
            "bids":[["99","1"]],"asks":[["100","1"],["101","2"]]}"#,
    );
    server.send_text(
        r#"{"channel":"book","base":"BTC","quote":"USD","seq":2,"asks":[["100","0"]]}"#,
    );
    server.send_text(
        r#"{"channel":"trade","base":"BTC","quote":"USD","id":"t1",
            "price":"101","amount":"0.5","side":"BUY"}"#,
    );

    let pair = Pair::new("BTC", "USD").unwrap();
    let book = eventually(|| {
        rig.caches
            .orderbook("mock", &pair, AssetClass::Spot)
            .ok()
            .filter(|b| b.sequence == Some(2))
    })
    .await
    .expect("book updated");
    assert_eq!(book.best_ask().unwrap().price, dec!(101));

    let trade = trades.recv().await.unwrap();
    assert_eq!(trade.id, "t1");
    assert_eq!(trade.price, dec!(101));
    rig.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_is_terminal() {
    let rig = rig(Correlation::None, OrderbookConfig::default());
    rig.manager.connect().await.unwrap();
    let _server = rig.dialer.accept().await.unwrap();

    rig.manager.shutdown().await.unwrap();
    assert_eq!(rig.manager.state(), ConnectionState::Closed);
    assert!(rig.manager.connect().await.is_err());
}
