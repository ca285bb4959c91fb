//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the engine's use cases.

pub mod cache;
pub mod engine;
pub mod order;
pub mod registry;
pub mod withdraw;

pub use cache::Caches;
pub use engine::Engine;
pub use order::{OrderManager, PlacedOrder};
pub use registry::{Registry, VenueFactories, VenueFactory};
pub use withdraw::{BankStore, WithdrawManager};
