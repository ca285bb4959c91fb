//! Order manager.
//!
//! Validates submissions locally, delegates to the venue, and keeps the
//! order ledger in step with what venues confirm. Nothing in the ledger
//! changes until the venue has answered.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::OrderLedger;
use super::registry::Registry;
use crate::domain::{
    AssetClass, Cancel, CancelAllResponse, Capability, Modify, ModifyResponse, OrderDetail,
    OrderStatus, OrdersRequest, Pair, Submit, SubmitResponse,
};
use crate::error::Result;
use crate::port::Venue;

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub internal_id: u64,
    pub response: SubmitResponse,
    /// The ledger record after the submission was stored.
    pub order: OrderDetail,
}

pub struct OrderManager {
    registry: Arc<Registry>,
    ledger: Arc<OrderLedger>,
}

impl OrderManager {
    #[must_use]
    pub fn new(registry: Arc<Registry>, ledger: Arc<OrderLedger>) -> Self {
        Self { registry, ledger }
    }

    #[must_use]
    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    fn venue(&self, name: &str, capability: Capability) -> Result<Arc<dyn Venue>> {
        let venue = self.registry.enabled(name)?;
        venue.base().gate(capability)?;
        Ok(venue)
    }

    /// Validate, submit and record an order.
    ///
    /// # Errors
    ///
    /// - `InvalidSubmit` citing the first failed rule
    /// - `InvalidExchange` for unknown or disabled venues
    /// - `Unsupported` / `AuthRequired` / `AuthRejected` from the venue gate
    /// - whatever the venue returns for the submission
    pub async fn submit(&self, venue: &str, submit: &Submit) -> Result<PlacedOrder> {
        submit.validate()?;
        let venue = self.venue(venue, Capability::SubmitOrder)?;
        venue.base().require_asset(submit.asset)?;

        let internal_id = self.ledger.next_internal_id();
        debug!(venue = %venue.name(), internal_id, pair = %submit.pair, side = %submit.side, "Submitting order");

        let response = venue.base().track(venue.submit_order(submit).await)?;

        let mut order = OrderDetail::from_submit(venue.name(), submit, &response);
        order.internal_id = Some(internal_id);
        let order = self.ledger.upsert(order);
        info!(
            venue = %venue.name(),
            internal_id,
            order_id = %response.order_id,
            placed = response.placed,
            status = %response.status,
            "Order submitted"
        );
        Ok(PlacedOrder {
            internal_id,
            response,
            order,
        })
    }

    /// # Errors
    ///
    /// Returns gate errors or the venue's rejection.
    pub async fn modify(&self, venue: &str, modify: &Modify) -> Result<ModifyResponse> {
        let venue = self.venue(venue, Capability::ModifyOrder)?;
        let response = venue.base().track(venue.modify_order(modify).await)?;

        let id = if response.order_id.is_empty() || response.order_id == modify.order_id {
            modify.order_id.as_str()
        } else {
            self.ledger
                .rekey(venue.name(), &modify.order_id, &response.order_id);
            response.order_id.as_str()
        };
        if let Some(mut order) = self.ledger.get(venue.name(), id) {
            order.price = response.price;
            order.amount = response.amount;
            self.ledger.upsert(order);
        }
        Ok(response)
    }

    /// # Errors
    ///
    /// Returns gate errors or the venue's rejection.
    pub async fn cancel(&self, venue: &str, cancel: &Cancel) -> Result<()> {
        let venue = self.venue(venue, Capability::CancelOrder)?;
        venue.base().track(venue.cancel_order(cancel).await)?;
        self.mark_cancelled(venue.name(), &cancel.order_id);
        Ok(())
    }

    /// Cancel every matching order. Ledger entries are marked cancelled only
    /// for orders the venue reports as cancelled.
    ///
    /// # Errors
    ///
    /// Returns gate errors or the venue's rejection of the whole request.
    pub async fn cancel_all(&self, venue: &str, cancel: &Cancel) -> Result<CancelAllResponse> {
        let venue = self.venue(venue, Capability::CancelOrders)?;
        let response = venue.base().track(venue.cancel_all_orders(cancel).await)?;
        for (id, status) in &response.status {
            if is_cancelled(status) {
                self.mark_cancelled(venue.name(), id);
            } else {
                warn!(venue = %venue.name(), order_id = %id, status = %status, "Order not cancelled");
            }
        }
        Ok(response)
    }

    /// Query the venue and merge the answer into the ledger.
    ///
    /// # Errors
    ///
    /// Returns gate errors or the venue's rejection.
    pub async fn order_info(
        &self,
        venue: &str,
        order_id: &str,
        pair: Option<&Pair>,
        asset: AssetClass,
    ) -> Result<OrderDetail> {
        let venue = self.venue(venue, Capability::GetOrder)?;
        let order = venue
            .base()
            .track(venue.get_order_info(order_id, pair, asset).await)?;
        Ok(self.ledger.upsert(order))
    }

    /// Active orders from the venue, filtered by `request`.
    ///
    /// # Errors
    ///
    /// Returns gate errors, the venue's rejection, or `InvalidInput` for an
    /// inverted time range.
    pub async fn active_orders(
        &self,
        venue: &str,
        request: &OrdersRequest,
    ) -> Result<Vec<OrderDetail>> {
        let venue = self.venue(venue, Capability::GetOrders)?;
        let mut orders = venue.base().track(venue.get_active_orders(request).await)?;
        request.filter(&mut orders)?;
        Ok(orders
            .into_iter()
            .map(|order| self.ledger.upsert(order))
            .collect())
    }

    /// Historic orders from the venue, filtered by `request`.
    ///
    /// # Errors
    ///
    /// As for [`active_orders`](Self::active_orders).
    pub async fn order_history(
        &self,
        venue: &str,
        request: &OrdersRequest,
    ) -> Result<Vec<OrderDetail>> {
        let venue = self.venue(venue, Capability::GetOrders)?;
        let mut orders = venue.base().track(venue.get_order_history(request).await)?;
        request.filter(&mut orders)?;
        Ok(orders)
    }

    fn mark_cancelled(&self, venue: &str, order_id: &str) {
        if let Some(mut order) = self.ledger.get(venue, order_id) {
            order.status = OrderStatus::Cancelled;
            self.ledger.upsert(order);
        }
    }
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("orders", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

fn is_cancelled(status: &str) -> bool {
    ["cancelled", "canceled", "ok", "success"]
        .iter()
        .any(|s| status.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Caches;
    use crate::domain::{Capabilities, OrderType, Side, SubmitError};
    use crate::error::{Error, ErrorKind};
    use crate::infrastructure::config::OrderbookConfig;
    use crate::port::MarketStore;
    use crate::testkit::fixtures;
    use crate::testkit::venue::MockVenue;
    use rust_decimal_macros::dec;

    fn manager_with(venue: MockVenue) -> (OrderManager, Arc<MockVenue>) {
        let venue = Arc::new(venue);
        let mut registry = Registry::new();
        registry.register(venue.clone()).unwrap();
        let manager = OrderManager::new(Arc::new(registry), Arc::new(OrderLedger::new()));
        (manager, venue)
    }

    fn store() -> Arc<dyn MarketStore> {
        Arc::new(Caches::new(OrderbookConfig::default()))
    }

    #[tokio::test]
    async fn limit_without_price_is_rejected_before_venue() {
        let (manager, venue) = manager_with(MockVenue::configured("mock", store()));
        let mut submit = fixtures::limit_buy(dec!(0), dec!(1));
        submit.order_type = OrderType::Limit;

        let err = manager.submit("mock", &submit).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSubmit(SubmitError::PriceMustBeSetForLimit)));
        assert_eq!(
            err.to_string(),
            "invalid order submission: price must be set if limit order type is desired"
        );
        assert_eq!(venue.calls("submit_order"), 0);
    }

    #[tokio::test]
    async fn submit_records_in_ledger() {
        let (manager, venue) = manager_with(MockVenue::configured("mock", store()));
        let placed = manager
            .submit("MOCK", &fixtures::limit_buy(dec!(100), dec!(2)))
            .await
            .unwrap();

        assert!(placed.response.placed);
        assert_eq!(venue.calls("submit_order"), 1);
        let stored = manager.ledger().get("mock", &placed.response.order_id).unwrap();
        assert_eq!(stored.internal_id, Some(placed.internal_id));
        assert_eq!(stored.side, Side::Buy);
        assert_eq!(stored.remaining_amount, dec!(2));
    }

    #[tokio::test]
    async fn internal_ids_are_unique() {
        let (manager, _venue) = manager_with(MockVenue::configured("mock", store()));
        let a = manager.submit("mock", &fixtures::limit_buy(dec!(100), dec!(1))).await.unwrap();
        let b = manager.submit("mock", &fixtures::limit_buy(dec!(101), dec!(1))).await.unwrap();
        assert_ne!(a.internal_id, b.internal_id);
        assert_eq!(manager.ledger().len(), 2);
    }

    #[tokio::test]
    async fn missing_capability_is_unsupported() {
        let caps = Capabilities::empty().with(Capability::TickerFetching);
        let (manager, _venue) = manager_with(MockVenue::configured_with("mock", caps, store()));
        let err = manager
            .submit("mock", &fixtures::limit_buy(dec!(100), dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn disabled_venue_is_refused() {
        let (manager, venue) = manager_with(MockVenue::configured("mock", store()));
        venue.set_enabled(false);
        let err = manager
            .submit("mock", &fixtures::limit_buy(dec!(100), dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExchange);
    }

    #[tokio::test]
    async fn cancel_updates_ledger_only_after_confirmation() {
        let (manager, venue) = manager_with(MockVenue::configured("mock", store()));
        let placed = manager
            .submit("mock", &fixtures::limit_buy(dec!(100), dec!(1)))
            .await
            .unwrap();
        let id = placed.response.order_id.clone();

        venue.fail_next("cancel_order", "order is locked");
        let cancel = Cancel::new(&id, AssetClass::Spot);
        assert!(manager.cancel("mock", &cancel).await.is_err());
        assert_eq!(manager.ledger().get("mock", &id).unwrap().status, OrderStatus::Active);

        manager.cancel("mock", &cancel).await.unwrap();
        assert_eq!(manager.ledger().get("mock", &id).unwrap().status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_all_reports_each_order() {
        let (manager, _venue) = manager_with(MockVenue::configured("mock", store()));
        for price in [dec!(100), dec!(101)] {
            manager.submit("mock", &fixtures::limit_buy(price, dec!(1))).await.unwrap();
        }
        let response = manager
            .cancel_all("mock", &Cancel::new("", AssetClass::Spot))
            .await
            .unwrap();
        assert_eq!(response.count(), 2);
        assert!(manager.ledger().active().is_empty());
    }

    #[tokio::test]
    async fn auth_rejection_blocks_further_requests() {
        let (manager, venue) = manager_with(MockVenue::configured("mock", store()));
        venue.reject_auth("invalid api key");

        let err = manager
            .submit("mock", &fixtures::limit_buy(dec!(100), dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRejected);
        assert_eq!(venue.calls("submit_order"), 1);

        // Refused locally until credentials are revalidated.
        let err = manager
            .submit("mock", &fixtures::limit_buy(dec!(100), dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRejected);
        assert_eq!(venue.calls("submit_order"), 1);
    }
}
