//! Binance REST payloads.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{
    AssetClass, FundingRecord, OrderDetail, OrderStatus, OrderType, Pair, Side, TradeFill,
    TransferDirection,
};

pub(super) fn millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: Decimal,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub open_price: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub close_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
    pub commission: Decimal,
    pub trade_id: i64,
}

/// Order as returned by the place, query and list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    pub status: String,
    #[serde(default, rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub transact_time: Option<i64>,
    #[serde(default)]
    pub update_time: Option<i64>,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

pub fn order_status(raw: &str) -> OrderStatus {
    match raw {
        "NEW" => OrderStatus::Active,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" => OrderStatus::Cancelled,
        "PENDING_CANCEL" => OrderStatus::PendingCancel,
        "REJECTED" => OrderStatus::Rejected,
        "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
        _ => OrderStatus::Unknown,
    }
}

pub fn order_type(raw: &str) -> OrderType {
    match raw {
        "LIMIT" => OrderType::Limit,
        "MARKET" => OrderType::Market,
        "STOP_LOSS" | "TAKE_PROFIT" => OrderType::Stop,
        "STOP_LOSS_LIMIT" | "TAKE_PROFIT_LIMIT" => OrderType::StopLimit,
        "LIMIT_MAKER" => OrderType::PostOnly,
        _ => OrderType::Unknown,
    }
}

pub fn side(raw: &str) -> Side {
    match raw {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        _ => Side::Unknown,
    }
}

impl OrderResponse {
    pub fn fills(&self, side: Side) -> Vec<TradeFill> {
        let timestamp = millis(self.transact_time.unwrap_or_default());
        self.fills
            .iter()
            .map(|f| TradeFill {
                id: f.trade_id.to_string(),
                price: f.price,
                amount: f.qty,
                fee: f.commission,
                side,
                timestamp,
            })
            .collect()
    }

    pub fn into_detail(self, venue: &str, pair: Pair) -> OrderDetail {
        let side = side(&self.side);
        let trades = self.fills(side);
        let date = millis(self.time.or(self.transact_time).unwrap_or_default());
        let last_updated = self.update_time.map_or(date, millis);
        let mut detail = OrderDetail {
            venue: venue.to_string(),
            id: self.order_id.to_string(),
            internal_id: None,
            client_order_id: self.client_order_id,
            pair,
            asset: AssetClass::Spot,
            side,
            order_type: order_type(&self.order_type),
            status: order_status(&self.status),
            price: self.price,
            amount: self.orig_qty,
            executed_amount: self.executed_qty,
            remaining_amount: self.orig_qty - self.executed_qty,
            fee: trades.iter().map(|t| t.fee).sum(),
            date,
            last_updated,
            trades,
        };
        detail.normalise();
        detail
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddressResponse {
    pub address: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawApplied {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub amount: Decimal,
    pub coin: String,
    pub status: i64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
    pub insert_time: i64,
}

impl DepositRecord {
    pub fn into_record(self) -> FundingRecord {
        let status = match self.status {
            0 => "pending",
            1 => "complete",
            6 => "credited",
            _ => "unknown",
        };
        FundingRecord {
            id: self.id.or_else(|| self.tx_id.clone()).unwrap_or_default(),
            direction: TransferDirection::Deposit,
            status: status.into(),
            currency: self.coin.into(),
            amount: self.amount,
            fee: Decimal::ZERO,
            address: self.address,
            tx_id: self.tx_id,
            timestamp: millis(self.insert_time),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRecord {
    pub id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub transaction_fee: Decimal,
    pub coin: String,
    pub status: i64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
    pub apply_time: String,
}

impl WithdrawRecord {
    pub fn into_record(self) -> FundingRecord {
        let status = match self.status {
            0 => "email sent",
            1 => "cancelled",
            2 => "awaiting approval",
            3 => "rejected",
            4 => "processing",
            5 => "failure",
            6 => "complete",
            _ => "unknown",
        };
        let timestamp = NaiveDateTime::parse_from_str(&self.apply_time, "%Y-%m-%d %H:%M:%S")
            .map(|t| t.and_utc())
            .unwrap_or_default();
        FundingRecord {
            id: self.id,
            direction: TransferDirection::Withdrawal,
            status: status.into(),
            currency: self.coin.into(),
            amount: self.amount,
            fee: self.transaction_fee,
            address: self.address,
            tx_id: self.tx_id,
            timestamp,
        }
    }
}

/// `{"code":-1121,"msg":"Invalid symbol."}`
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}
