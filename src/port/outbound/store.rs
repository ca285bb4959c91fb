//! Persistence port for withdrawal history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::WithdrawEvent;
use crate::error::Result;

/// Storage for submitted withdrawals.
#[async_trait]
pub trait WithdrawStore: Send + Sync {
    /// Save an event, replacing any event with the same id.
    async fn save(&self, event: &WithdrawEvent) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawEvent>>;

    /// Events for a venue, most recent first, at most `limit`.
    async fn list_for_venue(&self, venue: &str, limit: usize) -> Result<Vec<WithdrawEvent>>;
}
