use rust_decimal::Decimal;

use tradeplex::domain::{AssetClass, Level, Orderbook, Pair};

pub fn levels(raw: &[(Decimal, Decimal)]) -> Vec<Level> {
    raw.iter().map(|(p, a)| Level::new(*p, *a)).collect()
}

pub fn make_book(
    venue: &str,
    pair: Pair,
    bids: &[(Decimal, Decimal)],
    asks: &[(Decimal, Decimal)],
) -> Orderbook {
    Orderbook::with_levels(venue, pair, AssetClass::Spot, levels(bids), levels(asks))
}

pub fn prices(levels: &[Level]) -> Vec<(Decimal, Decimal)> {
    levels.iter().map(|l| (l.price, l.amount)).collect()
}
