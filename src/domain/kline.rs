//! Candles, interval taxonomy and the pure planning/aggregation helpers.
//!
//! Interval boundaries are aligned to the Unix epoch: a candle for an
//! interval of duration `d` opens at a timestamp that is a multiple of `d`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::pair::Pair;
use super::trade::Trade;
use crate::error::{Error, Result};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMin,
    #[serde(rename = "3m")]
    ThreeMin,
    #[serde(rename = "5m")]
    FiveMin,
    #[serde(rename = "15m")]
    FifteenMin,
    #[serde(rename = "30m")]
    ThirtyMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHour,
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "6h")]
    SixHour,
    #[serde(rename = "8h")]
    EightHour,
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "2w")]
    TwoWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "1y")]
    OneYear,
}

impl Interval {
    pub const ALL: [Interval; 17] = [
        Self::OneMin,
        Self::ThreeMin,
        Self::FiveMin,
        Self::FifteenMin,
        Self::ThirtyMin,
        Self::OneHour,
        Self::TwoHour,
        Self::FourHour,
        Self::SixHour,
        Self::EightHour,
        Self::TwelveHour,
        Self::OneDay,
        Self::ThreeDay,
        Self::OneWeek,
        Self::TwoWeek,
        Self::OneMonth,
        Self::OneYear,
    ];

    /// Fixed duration in milliseconds. A month is 30 days, a year 365.
    #[must_use]
    pub const fn millis(self) -> i64 {
        match self {
            Self::OneMin => MINUTE_MS,
            Self::ThreeMin => 3 * MINUTE_MS,
            Self::FiveMin => 5 * MINUTE_MS,
            Self::FifteenMin => 15 * MINUTE_MS,
            Self::ThirtyMin => 30 * MINUTE_MS,
            Self::OneHour => HOUR_MS,
            Self::TwoHour => 2 * HOUR_MS,
            Self::FourHour => 4 * HOUR_MS,
            Self::SixHour => 6 * HOUR_MS,
            Self::EightHour => 8 * HOUR_MS,
            Self::TwelveHour => 12 * HOUR_MS,
            Self::OneDay => DAY_MS,
            Self::ThreeDay => 3 * DAY_MS,
            Self::OneWeek => 7 * DAY_MS,
            Self::TwoWeek => 14 * DAY_MS,
            Self::OneMonth => 30 * DAY_MS,
            Self::OneYear => 365 * DAY_MS,
        }
    }

    #[must_use]
    pub const fn short(self) -> &'static str {
        match self {
            Self::OneMin => "1m",
            Self::ThreeMin => "3m",
            Self::FiveMin => "5m",
            Self::FifteenMin => "15m",
            Self::ThirtyMin => "30m",
            Self::OneHour => "1h",
            Self::TwoHour => "2h",
            Self::FourHour => "4h",
            Self::SixHour => "6h",
            Self::EightHour => "8h",
            Self::TwelveHour => "12h",
            Self::OneDay => "1d",
            Self::ThreeDay => "3d",
            Self::OneWeek => "1w",
            Self::TwoWeek => "2w",
            Self::OneMonth => "1M",
            Self::OneYear => "1y",
        }
    }

    /// Start of the interval bucket containing `time`.
    #[must_use]
    pub fn truncate(self, time: DateTime<Utc>) -> DateTime<Utc> {
        from_millis(floor_to(time.timestamp_millis(), self.millis())).unwrap_or(time)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

impl FromStr for Interval {
    type Err = Error;

    /// Parse the canonical short form. `m` is minutes, `M` is months.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.short() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("unknown interval {s:?}")))
    }
}

/// How a venue spells intervals on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalRule {
    /// Canonical short form, e.g. `15m`.
    #[default]
    Short,
    /// Whole seconds, e.g. `900`.
    Seconds,
    /// Whole minutes, e.g. `15`.
    Minutes,
    /// Explicit per-interval spelling.
    Custom(BTreeMap<Interval, String>),
}

/// Render `interval` with a venue's rule.
///
/// # Errors
///
/// Returns `InvalidInput` when a custom rule has no spelling for `interval`.
pub fn format_interval(interval: Interval, rule: &IntervalRule) -> Result<String> {
    match rule {
        IntervalRule::Short => Ok(interval.short().to_string()),
        IntervalRule::Seconds => Ok((interval.millis() / 1000).to_string()),
        IntervalRule::Minutes => Ok((interval.millis() / MINUTE_MS).to_string()),
        IntervalRule::Custom(map) => map
            .get(&interval)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("no wire format for interval {interval}"))),
    }
}

/// What a venue declares about its candle endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlineCapabilities {
    pub intervals: Vec<Interval>,
    /// Maximum candles returned per request.
    pub result_limit: u32,
    #[serde(default)]
    pub rule: IntervalRule,
}

impl Default for KlineCapabilities {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
            result_limit: 500,
            rule: IntervalRule::Short,
        }
    }
}

impl KlineCapabilities {
    #[must_use]
    pub fn supports(&self, interval: Interval) -> bool {
        self.intervals.contains(&interval)
    }

    /// Wire spelling of a supported interval.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` when the venue does not offer `interval`.
    pub fn format(&self, venue: &str, interval: Interval) -> Result<String> {
        if !self.supports(interval) {
            return Err(Error::unsupported(venue, format!("interval {interval}")));
        }
        format_interval(interval, &self.rule)
    }
}

/// One OHLCV bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// A zero-volume candle at a single price.
    #[must_use]
    pub fn flat(time: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` when the OHLC bounds or volume are inconsistent.
    pub fn validate(&self) -> Result<()> {
        let within = |p: Decimal| self.low <= p && p <= self.high;
        if self.low > self.high || !within(self.open) || !within(self.close) {
            return Err(Error::InvalidInput(format!(
                "candle at {} has inconsistent OHLC values",
                self.time
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "candle at {} has negative volume",
                self.time
            )));
        }
        Ok(())
    }
}

/// Candles for one (venue, pair, asset class, interval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineSeries {
    pub venue: String,
    pub pair: Pair,
    pub asset: AssetClass,
    pub interval: Interval,
    pub candles: Vec<Candle>,
}

impl KlineSeries {
    #[must_use]
    pub fn new(
        venue: impl Into<String>,
        pair: Pair,
        asset: AssetClass,
        interval: Interval,
    ) -> Self {
        Self {
            venue: venue.into(),
            pair,
            asset,
            interval,
            candles: Vec::new(),
        }
    }

    /// Stable sort by open time.
    pub fn sort_candles(&mut self, ascending: bool) {
        if ascending {
            self.candles.sort_by(|a, b| a.time.cmp(&b.time));
        } else {
            self.candles.sort_by(|a, b| b.time.cmp(&a.time));
        }
    }

    /// Sort ascending and drop candles sharing an open time, keeping the first.
    pub fn dedupe(&mut self) {
        self.sort_candles(true);
        self.candles.dedup_by(|b, a| a.time == b.time);
    }

    /// Check sort order, alignment and each candle's invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the first violation.
    pub fn verify(&self) -> Result<()> {
        let step = self.interval.millis();
        for candle in &self.candles {
            candle.validate()?;
            if candle.time.timestamp_millis().rem_euclid(step) != 0 {
                return Err(Error::InvalidInput(format!(
                    "candle at {} is not aligned to {}",
                    candle.time, self.interval
                )));
            }
        }
        for pair in self.candles.windows(2) {
            if pair[1].time <= pair[0].time {
                return Err(Error::InvalidInput(format!(
                    "candles at {} and {} are not strictly ascending",
                    pair[0].time, pair[1].time
                )));
            }
        }
        Ok(())
    }

    /// True when every consecutive pair is exactly one interval apart.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let step = self.interval.millis();
        self.candles
            .windows(2)
            .all(|w| w[1].time.timestamp_millis() - w[0].time.timestamp_millis() == step)
    }

    /// Re-bucket into a larger interval that is a whole multiple of this one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `target` is not a larger whole multiple.
    pub fn convert_to(&self, target: Interval) -> Result<KlineSeries> {
        let from = self.interval.millis();
        let to = target.millis();
        if to <= from || to % from != 0 {
            return Err(Error::InvalidInput(format!(
                "cannot convert {} candles to {target}",
                self.interval
            )));
        }
        let mut sorted = self.candles.clone();
        sorted.sort_by(|a, b| a.time.cmp(&b.time));

        let mut out: Vec<Candle> = Vec::new();
        for candle in sorted {
            let bucket = target.truncate(candle.time);
            match out.last_mut() {
                Some(last) if last.time == bucket => {
                    last.high = last.high.max(candle.high);
                    last.low = last.low.min(candle.low);
                    last.close = candle.close;
                    last.volume += candle.volume;
                }
                _ => out.push(Candle {
                    time: bucket,
                    ..candle
                }),
            }
        }
        Ok(KlineSeries {
            interval: target,
            candles: out,
            ..self.clone()
        })
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn floor_to(ms: i64, step: i64) -> i64 {
    ms.div_euclid(step) * step
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Number of interval boundaries in `[start, end)`.
#[must_use]
pub fn candles_per_span(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval) -> u64 {
    let step = interval.millis();
    let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
    if end <= start {
        return 0;
    }
    let first = -(-start).div_euclid(step) * step;
    if first >= end {
        return 0;
    }
    ((end - 1 - first) / step + 1) as u64
}

/// Split `[start, end)` into consecutive ranges of at most `limit` intervals.
///
/// The first range starts at the interval boundary at or before `start`.
///
/// # Errors
///
/// Returns `InvalidInput` if the range is empty or `limit` is zero.
pub fn split_date_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Interval,
    limit: u32,
) -> Result<Vec<DateRange>> {
    if end <= start {
        return Err(Error::InvalidInput(format!(
            "start {start} must be before end {end}"
        )));
    }
    if limit == 0 {
        return Err(Error::InvalidInput("request limit must be positive".into()));
    }
    let step = interval.millis();
    let chunk = step * i64::from(limit);
    let end_ms = end.timestamp_millis();
    let mut cursor = floor_to(start.timestamp_millis(), step);

    let mut ranges = Vec::new();
    while cursor < end_ms {
        let next = (cursor + chunk).min(end_ms);
        let (Some(s), Some(e)) = (from_millis(cursor), from_millis(next)) else {
            return Err(Error::InvalidInput("date range out of bounds".into()));
        };
        ranges.push(DateRange { start: s, end: e });
        cursor = next;
    }
    Ok(ranges)
}

/// Build candles from trades.
///
/// Trades are validated, sorted by time, and bucketed by `interval`. Empty
/// buckets between the first and last trade become flat zero-volume candles
/// at the previous close so the series stays contiguous.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty list, non-positive price or amount, or
/// a zero timestamp; `DuplicateTrade` when a trade id repeats.
pub fn aggregate_trades(
    trades: &[Trade],
    interval: Interval,
    pair: &Pair,
    asset: AssetClass,
    venue: &str,
) -> Result<KlineSeries> {
    if trades.is_empty() {
        return Err(Error::InvalidInput("no trades supplied".into()));
    }
    let mut seen = HashSet::new();
    for trade in trades {
        if trade.price <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "trade {} has non-positive price {}",
                trade.id, trade.price
            )));
        }
        if trade.amount <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "trade {} has non-positive amount {}",
                trade.id, trade.amount
            )));
        }
        if trade.timestamp.timestamp_millis() == 0 {
            return Err(Error::InvalidInput(format!("trade {} has no timestamp", trade.id)));
        }
        if !trade.id.is_empty() && !seen.insert(trade.id.as_str()) {
            return Err(Error::DuplicateTrade {
                id: trade.id.clone(),
            });
        }
    }

    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    let step = interval.millis();
    let mut candles: Vec<Candle> = Vec::new();
    for trade in sorted {
        let bucket_ms = floor_to(trade.timestamp.timestamp_millis(), step);
        if let Some(last) = candles.last_mut() {
            if last.time.timestamp_millis() == bucket_ms {
                last.high = last.high.max(trade.price);
                last.low = last.low.min(trade.price);
                last.close = trade.price;
                last.volume += trade.amount;
                continue;
            }
        }
        if let Some(last) = candles.last().copied() {
            let mut gap = last.time.timestamp_millis() + step;
            while gap < bucket_ms {
                if let Some(time) = from_millis(gap) {
                    candles.push(Candle::flat(time, last.close));
                }
                gap += step;
            }
        }
        let time = from_millis(bucket_ms)
            .ok_or_else(|| Error::InvalidInput(format!("trade {} out of range", trade.id)))?;
        candles.push(Candle {
            time,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.amount,
        });
    }

    Ok(KlineSeries {
        venue: venue.to_string(),
        pair: pair.clone(),
        asset,
        interval,
        candles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn trade(id: &str, offset_secs: i64, price: Decimal, amount: Decimal) -> Trade {
        Trade::new(id, t0() + Duration::seconds(offset_secs), price, amount)
    }

    fn btc_usd() -> Pair {
        Pair::new("BTC", "USD").unwrap()
    }

    #[test]
    fn aggregates_trades_into_minute_candles() {
        let trades = vec![
            trade("a", 0, dec!(10), dec!(1)),
            trade("b", 30, dec!(12), dec!(2)),
            trade("c", 90, dec!(11), dec!(1)),
        ];
        let series =
            aggregate_trades(&trades, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v").unwrap();

        assert_eq!(series.candles.len(), 2);
        let first = series.candles[0];
        assert_eq!(first.time, t0());
        assert_eq!(
            (first.open, first.high, first.low, first.close, first.volume),
            (dec!(10), dec!(12), dec!(10), dec!(12), dec!(3))
        );
        let second = series.candles[1];
        assert_eq!(second.time, t0() + Duration::minutes(1));
        assert_eq!(
            (second.open, second.high, second.low, second.close, second.volume),
            (dec!(11), dec!(11), dec!(11), dec!(11), dec!(1))
        );
        assert!(series.verify().is_ok());
        assert!(series.is_contiguous());
    }

    #[test]
    fn unsorted_trades_are_sorted_first() {
        let trades = vec![
            trade("c", 90, dec!(11), dec!(1)),
            trade("a", 0, dec!(10), dec!(1)),
        ];
        let series =
            aggregate_trades(&trades, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v").unwrap();
        assert_eq!(series.candles[0].open, dec!(10));
    }

    #[test]
    fn gaps_become_flat_candles() {
        let trades = vec![
            trade("a", 0, dec!(10), dec!(1)),
            trade("b", 200, dec!(13), dec!(1)),
        ];
        let series =
            aggregate_trades(&trades, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v").unwrap();
        assert_eq!(series.candles.len(), 4);
        assert_eq!(series.candles[1], Candle::flat(t0() + Duration::minutes(1), dec!(10)));
        assert!(series.is_contiguous());
    }

    #[test]
    fn rejects_bad_trades() {
        let dup = vec![trade("a", 0, dec!(1), dec!(1)), trade("a", 5, dec!(1), dec!(1))];
        assert!(matches!(
            aggregate_trades(&dup, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v"),
            Err(Error::DuplicateTrade { .. })
        ));

        let negative = vec![trade("a", 0, dec!(-1), dec!(1))];
        assert!(matches!(
            aggregate_trades(&negative, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v"),
            Err(Error::InvalidInput(_))
        ));

        let zero_price = vec![trade("a", 0, dec!(0), dec!(1))];
        let aggregate = |trades: &[Trade]| {
            aggregate_trades(trades, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v")
        };
        assert!(aggregate(&zero_price).is_err());

        let mut no_time = trade("a", 0, dec!(1), dec!(1));
        no_time.timestamp = DateTime::<Utc>::default();
        assert!(aggregate(&[no_time]).is_err());
    }

    #[test]
    fn candles_per_span_counts_boundaries() {
        assert_eq!(candles_per_span(t0(), t0(), Interval::OneHour), 0);
        assert_eq!(
            candles_per_span(t0(), t0() + Duration::hours(5), Interval::OneHour),
            5
        );
        assert_eq!(
            candles_per_span(
                t0() + Duration::minutes(1),
                t0() + Duration::hours(2),
                Interval::OneHour,
            ),
            1
        );
    }

    #[test]
    fn split_respects_limit() {
        let ranges =
            split_date_range(t0(), t0() + Duration::hours(10), Interval::OneHour, 4).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].start, t0());
        assert_eq!(ranges[0].end, t0() + Duration::hours(4));
        assert_eq!(ranges[2].end, t0() + Duration::hours(10));
        for r in &ranges {
            assert!(candles_per_span(r.start, r.end, Interval::OneHour) <= 4);
        }
    }

    #[test]
    fn short_span_is_one_range() {
        let ranges =
            split_date_range(t0(), t0() + Duration::minutes(10), Interval::OneHour, 100).unwrap();
        assert_eq!(ranges.len(), 1);
        assert!(split_date_range(t0(), t0(), Interval::OneHour, 1).is_err());
    }

    #[test]
    fn interval_formats() {
        assert_eq!(format_interval(Interval::FifteenMin, &IntervalRule::Short).unwrap(), "15m");
        assert_eq!(format_interval(Interval::OneHour, &IntervalRule::Seconds).unwrap(), "3600");
        assert_eq!(format_interval(Interval::OneDay, &IntervalRule::Minutes).unwrap(), "1440");
        assert_eq!("1M".parse::<Interval>().unwrap(), Interval::OneMonth);
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::OneMin);

        let caps = KlineCapabilities {
            intervals: vec![Interval::OneHour],
            ..Default::default()
        };
        assert!(matches!(
            caps.format("v", Interval::OneMin),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn convert_to_larger_interval() {
        let trades: Vec<_> = (0..6)
            .map(|i| trade(&i.to_string(), i * 60, Decimal::from(10 + i), dec!(1)))
            .collect();
        let series =
            aggregate_trades(&trades, Interval::OneMin, &btc_usd(), AssetClass::Spot, "v").unwrap();
        let converted = series.convert_to(Interval::ThreeMin).unwrap();
        assert_eq!(converted.candles.len(), 2);
        assert_eq!(converted.candles[0].open, dec!(10));
        assert_eq!(converted.candles[0].close, dec!(12));
        assert_eq!(converted.candles[1].high, dec!(15));
        assert_eq!(converted.candles[1].volume, dec!(3));
        assert!(series.convert_to(Interval::OneMin).is_err());
    }

    #[test]
    fn sort_is_stable_and_directional() {
        let mut series = KlineSeries::new("v", btc_usd(), AssetClass::Spot, Interval::OneMin);
        series.candles = vec![
            Candle::flat(t0() + Duration::minutes(1), dec!(2)),
            Candle::flat(t0(), dec!(1)),
        ];
        series.sort_candles(true);
        assert_eq!(series.candles[0].open, dec!(1));
        series.sort_candles(false);
        assert_eq!(series.candles[0].open, dec!(2));
    }
}
