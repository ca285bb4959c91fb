mod support;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use support::book::{levels, make_book, prices};
use tradeplex::application::Caches;
use tradeplex::domain::kline::aggregate_trades;
use tradeplex::domain::{AssetClass, BookDelta, Interval, Level, Trade};
use tradeplex::error::ErrorKind;
use tradeplex::infrastructure::config::OrderbookConfig;
use tradeplex::port::{BookUpdate, MarketStore};
use tradeplex::testkit::fixtures;

fn unbuffered() -> OrderbookConfig {
    OrderbookConfig {
        websocket_buffer_enabled: false,
        ..OrderbookConfig::default()
    }
}

#[test]
fn zero_amount_delta_deletes_level() {
    let mut book = make_book(
        "v",
        fixtures::btc_usd(),
        &[(dec!(99), dec!(1))],
        &[(dec!(100), dec!(1)), (dec!(101), dec!(2))],
    );
    book.apply_delta(&BookDelta::asks(vec![Level::new(dec!(100), Decimal::ZERO)]));

    assert_eq!(prices(book.asks()), vec![(dec!(101), dec!(2))]);
    assert_eq!(prices(book.bids()), vec![(dec!(99), dec!(1))]);
    assert!(!book.is_crossed());
}

#[test]
fn cached_book_applies_streamed_deltas_in_order() {
    let caches = Caches::new(unbuffered());
    let pair = fixtures::btc_usd();
    let mut snapshot = make_book(
        "v",
        pair.clone(),
        &[(dec!(99), dec!(1))],
        &[(dec!(100), dec!(1)), (dec!(101), dec!(2))],
    );
    snapshot.sequence = Some(10);
    assert_eq!(caches.apply_book_snapshot(snapshot).unwrap(), BookUpdate::Applied);

    // Already covered by the snapshot.
    let stale = BookDelta::asks(levels(&[(dec!(101), dec!(9))])).with_sequence(9);
    caches
        .apply_book_delta("v", &pair, AssetClass::Spot, stale)
        .unwrap();

    let delete = BookDelta::asks(levels(&[(dec!(100), dec!(0))])).with_sequence(11);
    assert_eq!(
        caches
            .apply_book_delta("v", &pair, AssetClass::Spot, delete)
            .unwrap(),
        BookUpdate::Applied
    );

    let book = caches.orderbook("v", &pair, AssetClass::Spot).unwrap();
    assert_eq!(prices(book.asks()), vec![(dec!(101), dec!(2))]);
    assert_eq!(book.sequence, Some(11));
}

#[test]
fn delta_without_snapshot_degrades_once() {
    let caches = Caches::new(unbuffered());
    let pair = fixtures::btc_usd();
    let delta = || BookDelta::bids(levels(&[(dec!(99), dec!(1))]));

    assert_eq!(
        caches
            .apply_book_delta("v", &pair, AssetClass::Spot, delta())
            .unwrap(),
        BookUpdate::Degraded
    );
    assert_eq!(
        caches
            .apply_book_delta("v", &pair, AssetClass::Spot, delta())
            .unwrap(),
        BookUpdate::Buffered
    );
    assert_eq!(
        caches.orderbook("v", &pair, AssetClass::Spot).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn trades_aggregate_into_minute_candles() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let trade = |id: &str, offset: i64, price: Decimal, amount: Decimal| {
        Trade::new(id, t0 + Duration::seconds(offset), price, amount)
    };
    let trades = vec![
        trade("a", 0, dec!(10), dec!(1)),
        trade("b", 30, dec!(12), dec!(2)),
        trade("c", 90, dec!(11), dec!(1)),
    ];

    let series = aggregate_trades(
        &trades,
        Interval::OneMin,
        &fixtures::btc_usd(),
        AssetClass::Spot,
        "v",
    )
    .unwrap();

    assert_eq!(series.candles.len(), 2);
    let first = &series.candles[0];
    assert_eq!(first.time, t0);
    assert_eq!(
        (first.open, first.high, first.low, first.close, first.volume),
        (dec!(10), dec!(12), dec!(10), dec!(12), dec!(3))
    );
    let second = &series.candles[1];
    assert_eq!(second.time, t0 + Duration::minutes(1));
    assert_eq!(
        (second.open, second.high, second.low, second.close, second.volume),
        (dec!(11), dec!(11), dec!(11), dec!(11), dec!(1))
    );
}

#[test]
fn duplicate_trade_ids_are_rejected() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let trades = vec![
        Trade::new("dup", t0, dec!(10), dec!(1)),
        Trade::new("dup", t0 + Duration::seconds(5), dec!(11), dec!(1)),
    ];
    let err = aggregate_trades(
        &trades,
        Interval::OneMin,
        &fixtures::btc_usd(),
        AssetClass::Spot,
        "v",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateTrade);
}
