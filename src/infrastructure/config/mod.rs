//! Infrastructure configuration modules.

pub mod duration;
pub mod limiter;
pub mod logging;
pub mod settings;
pub mod stream;
pub mod venue;

pub use limiter::{BucketConfig, RateLimiterConfig};
pub use logging::LoggingConfig;
pub use settings::{Config, DatabaseConfig};
pub use stream::{ReconnectionConfig, StreamConfig};
pub use venue::{
    ApiConfig, Credentials, FeatureToggles, FeaturesConfig, OrderbookConfig, VenueConfig,
};
