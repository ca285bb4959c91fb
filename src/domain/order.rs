//! Normalised order model, request types and list utilities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::error::SubmitError;
use super::pair::{Pair, Pairs};
use crate::error::{Error, Result};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    Bid,
    Ask,
    Any,
    Unknown,
}

impl Side {
    /// Sides that can be submitted to a venue.
    #[must_use]
    pub const fn is_tradable(self) -> bool {
        matches!(self, Self::Buy | Self::Sell | Self::Bid | Self::Ask)
    }

    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Buy | Self::Bid)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Bid => "BID",
            Self::Ask => "ASK",
            Self::Any => "ANY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "BID" => Ok(Self::Bid),
            "ASK" => Ok(Self::Ask),
            "ANY" => Ok(Self::Any),
            other => Err(Error::InvalidInput(format!("unknown order side {other:?}"))),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopLimit,
    TrailingStop,
    PostOnly,
    ImmediateOrCancel,
    FillOrKill,
    Any,
    Unknown,
}

impl OrderType {
    /// Types that can be submitted to a venue.
    #[must_use]
    pub const fn is_recognised(self) -> bool {
        !matches!(self, Self::Any | Self::Unknown)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::Market => "MARKET",
            Self::Stop => "STOP",
            Self::StopLimit => "STOP_LIMIT",
            Self::TrailingStop => "TRAILING_STOP",
            Self::PostOnly => "POST_ONLY",
            Self::ImmediateOrCancel => "IMMEDIATE_OR_CANCEL",
            Self::FillOrKill => "FILL_OR_KILL",
            Self::Any => "ANY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Active,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Cancelled,
    Rejected,
    Expired,
    Hidden,
    Any,
    Unknown,
}

impl OrderStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One fill against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub id: String,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

/// Order submission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submit {
    pub pair: Pair,
    pub asset: AssetClass,
    pub side: Side,
    pub order_type: OrderType,
    #[serde(default)]
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub reduce_only: bool,
}

impl Submit {
    /// Check the submission, reporting the first violated rule.
    ///
    /// # Errors
    ///
    /// Returns the [`SubmitError`] for the first rule that fails.
    pub fn validate(&self) -> std::result::Result<(), SubmitError> {
        if self.pair.base.is_empty() || self.pair.quote.is_empty() {
            return Err(SubmitError::PairEmpty);
        }
        if !self.side.is_tradable() {
            return Err(SubmitError::InvalidSide(self.side.to_string()));
        }
        if !self.order_type.is_recognised() {
            return Err(SubmitError::InvalidType(self.order_type.to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(SubmitError::AmountNotPositive);
        }
        if self.order_type == OrderType::Limit && self.price <= Decimal::ZERO {
            return Err(SubmitError::PriceMustBeSetForLimit);
        }
        if self.price < Decimal::ZERO || self.trigger_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(SubmitError::PriceNegative);
        }
        Ok(())
    }
}

/// What a venue reports after accepting a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Venue-side order id.
    pub order_id: String,
    /// Whether the order now rests on (or executed against) the book.
    pub placed: bool,
    pub status: OrderStatus,
    #[serde(default)]
    pub executed_amount: Decimal,
    #[serde(default)]
    pub trades: Vec<TradeFill>,
}

/// Order modification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modify {
    pub order_id: String,
    pub pair: Option<Pair>,
    pub asset: AssetClass,
    pub side: Option<Side>,
    pub price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyResponse {
    pub order_id: String,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Order cancellation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub pair: Option<Pair>,
    pub asset: AssetClass,
    #[serde(default)]
    pub side: Option<Side>,
}

impl Cancel {
    #[must_use]
    pub fn new(order_id: impl Into<String>, asset: AssetClass) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: None,
            pair: None,
            asset,
            side: None,
        }
    }
}

/// Per-order outcome of a bulk cancellation.
///
/// Holds one entry per attempted order, including failures, so partial
/// success is visible to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllResponse {
    pub status: BTreeMap<String, String>,
}

impl CancelAllResponse {
    pub fn record(&mut self, order_id: impl Into<String>, status: impl Into<String>) {
        self.status.insert(order_id.into(), status.into());
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.status.len()
    }
}

/// Selection criteria for active-order and order-history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersRequest {
    pub asset: AssetClass,
    #[serde(default)]
    pub pairs: Pairs,
    pub side: Side,
    pub order_type: OrderType,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl OrdersRequest {
    #[must_use]
    pub fn all(asset: AssetClass) -> Self {
        Self {
            asset,
            pairs: Pairs::new(),
            side: Side::Any,
            order_type: OrderType::Any,
            start: None,
            end: None,
        }
    }

    /// Apply every criterion to a venue's response, preserving order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the time range is inverted.
    pub fn filter(&self, orders: &mut Vec<OrderDetail>) -> Result<()> {
        filter_by_side(orders, self.side);
        filter_by_type(orders, self.order_type);
        filter_by_pairs(orders, &self.pairs);
        filter_by_time_range(orders, self.start, self.end)
    }
}

/// Full state of one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub venue: String,
    /// Venue-side order id.
    pub id: String,
    #[serde(default)]
    pub internal_id: Option<u64>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub pair: Pair,
    pub asset: AssetClass,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub executed_amount: Decimal,
    #[serde(default)]
    pub remaining_amount: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub trades: Vec<TradeFill>,
}

impl OrderDetail {
    /// Build the initial record for an accepted submission.
    #[must_use]
    pub fn from_submit(venue: &str, submit: &Submit, response: &SubmitResponse) -> Self {
        let now = Utc::now();
        let mut detail = Self {
            venue: venue.to_string(),
            id: response.order_id.clone(),
            internal_id: None,
            client_order_id: submit.client_order_id.clone(),
            pair: submit.pair.clone(),
            asset: submit.asset,
            side: submit.side,
            order_type: submit.order_type,
            status: response.status,
            price: submit.price,
            amount: submit.amount,
            executed_amount: response.executed_amount,
            remaining_amount: submit.amount - response.executed_amount,
            fee: Decimal::ZERO,
            date: now,
            last_updated: now,
            trades: response.trades.clone(),
        };
        detail.normalise();
        detail
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a newer view of the same order.
    ///
    /// Unknown statuses and zero amounts in `update` do not overwrite known
    /// values; fills are merged by id.
    pub fn update_from(&mut self, update: &OrderDetail) {
        if update.status != OrderStatus::Unknown {
            self.status = update.status;
        }
        if !update.price.is_zero() {
            self.price = update.price;
        }
        if !update.amount.is_zero() {
            self.amount = update.amount;
        }
        if !update.executed_amount.is_zero() {
            self.executed_amount = update.executed_amount;
        }
        if !update.fee.is_zero() {
            self.fee = update.fee;
        }
        if update.client_order_id.is_some() {
            self.client_order_id.clone_from(&update.client_order_id);
        }
        for fill in &update.trades {
            if !self.trades.iter().any(|t| t.id == fill.id) {
                self.trades.push(fill.clone());
            }
        }
        self.remaining_amount = self.amount - self.executed_amount;
        self.last_updated = if update.last_updated > self.last_updated {
            update.last_updated
        } else {
            Utc::now()
        };
        self.normalise();
    }

    /// Make amounts consistent with a terminal status.
    ///
    /// A filled order has nothing remaining; other terminal orders never
    /// report more executed than ordered.
    pub fn normalise(&mut self) {
        match self.status {
            OrderStatus::Filled => {
                if self.executed_amount.is_zero() {
                    self.executed_amount = self.amount;
                }
                self.remaining_amount = Decimal::ZERO;
            }
            OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired => {
                if self.executed_amount > self.amount {
                    self.executed_amount = self.amount;
                }
                self.remaining_amount = self.amount - self.executed_amount;
            }
            _ => {}
        }
    }
}

/// Keep orders on `side`. `Any` keeps everything.
pub fn filter_by_side(orders: &mut Vec<OrderDetail>, side: Side) {
    if side == Side::Any {
        return;
    }
    orders.retain(|o| o.side == side);
}

/// Keep orders of `order_type`. `Any` keeps everything.
pub fn filter_by_type(orders: &mut Vec<OrderDetail>, order_type: OrderType) {
    if order_type == OrderType::Any {
        return;
    }
    orders.retain(|o| o.order_type == order_type);
}

/// Keep orders whose pair is in `pairs`. An empty set keeps everything.
pub fn filter_by_pairs(orders: &mut Vec<OrderDetail>, pairs: &Pairs) {
    if pairs.is_empty() {
        return;
    }
    orders.retain(|o| pairs.contains(&o.pair));
}

/// Keep orders dated within `[start, end]`. Missing bounds are open.
///
/// # Errors
///
/// Returns `InvalidInput` when `start` is after `end`.
pub fn filter_by_time_range(
    orders: &mut Vec<OrderDetail>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(Error::InvalidInput(format!(
                "start {s} is after end {e}"
            )));
        }
    }
    orders.retain(|o| start.map_or(true, |s| o.date >= s) && end.map_or(true, |e| o.date <= e));
    Ok(())
}

pub fn sort_by_price(orders: &mut [OrderDetail], descending: bool) {
    orders.sort_by(|a, b| {
        let ord = a.price.cmp(&b.price);
        if descending { ord.reverse() } else { ord }
    });
}

pub fn sort_by_date(orders: &mut [OrderDetail], descending: bool) {
    orders.sort_by(|a, b| {
        let ord = a.date.cmp(&b.date);
        if descending { ord.reverse() } else { ord }
    });
}

pub fn sort_by_side(orders: &mut [OrderDetail], descending: bool) {
    orders.sort_by(|a, b| {
        let ord = a.side.as_str().cmp(b.side.as_str());
        if descending { ord.reverse() } else { ord }
    });
}

pub fn sort_by_type(orders: &mut [OrderDetail], descending: bool) {
    orders.sort_by(|a, b| {
        let ord = a.order_type.as_str().cmp(b.order_type.as_str());
        if descending { ord.reverse() } else { ord }
    });
}
