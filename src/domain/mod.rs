//! Venue-agnostic trading model.

mod account;
mod asset;
mod book;
mod capability;
mod credentials;
mod error;
mod funding;
mod key;
mod order;
mod pair;
mod subscription;
mod ticker;
mod trade;
mod withdraw;

pub mod kline;

// Pairs and asset classes
pub use asset::{AssetClass, PairManager, PairStore};
pub use pair::{Currency, Pair, PairFormat, Pairs, DEFAULT_DELIMITER, KNOWN_DELIMITERS};

pub use capability::{Capabilities, Capability};
pub use credentials::Credentials;
pub use error::{SubmitError, WithdrawError};
pub use key::MarketKey;
pub use subscription::{channel, Subscription};

// Market data
pub use book::{BookDelta, BookSide, Level, Orderbook};
pub use kline::{Candle, Interval, IntervalRule, KlineCapabilities, KlineSeries};
pub use ticker::Ticker;
pub use trade::Trade;

// Account and orders
pub use account::{Balance, Holdings, SubAccount};
pub use order::{
    filter_by_pairs, filter_by_side, filter_by_time_range, filter_by_type, sort_by_date,
    sort_by_price, sort_by_side, sort_by_type, Cancel, CancelAllResponse, Modify, ModifyResponse,
    OrderDetail, OrderStatus, OrderType, OrdersRequest, Side, Submit, SubmitResponse, TradeFill,
};

// Funding
pub use funding::{DepositAddress, FeeRequest, FeeType, FundingRecord, TransferDirection};
pub use withdraw::{
    BankAccount, CryptoDestination, Destination, FiatDestination, WithdrawEvent, WithdrawKind,
    WithdrawRequest, WithdrawResponse,
};
