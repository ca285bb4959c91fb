//! Withdraw manager and bank account store.
//!
//! A withdrawal passes the venue's capability and credential gate, picks up
//! a one-time password when the venue needs one, resolves its bank account
//! for fiat, and is then handed to the venue. The accepted withdrawal is
//! recorded through [`WithdrawStore`]; a storage failure is logged and does
//! not undo the withdrawal.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::registry::Registry;
use crate::domain::{
    BankAccount, Capability, Currency, Destination, WithdrawEvent, WithdrawKind, WithdrawRequest,
};
use crate::error::{Error, Result};
use crate::infrastructure::otp::Otp;
use crate::port::{Venue, WithdrawStore};

/// Configured bank accounts, by id.
#[derive(Debug, Clone, Default)]
pub struct BankStore {
    accounts: BTreeMap<String, BankAccount>,
}

impl BankStore {
    /// Later accounts replace earlier ones with the same id.
    #[must_use]
    pub fn new(accounts: impl IntoIterator<Item = BankAccount>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn get(&self, id: &str) -> Result<BankAccount> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("bank account {id}")))
    }

    /// Enabled accounts usable for `venue` in `currency`.
    #[must_use]
    pub fn usable(&self, venue: &str, currency: &Currency) -> Vec<BankAccount> {
        self.accounts
            .values()
            .filter(|a| a.check_usable(venue, currency).is_ok())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

pub struct WithdrawManager {
    registry: Arc<Registry>,
    banks: BankStore,
    store: Arc<dyn WithdrawStore>,
}

impl WithdrawManager {
    #[must_use]
    pub fn new(registry: Arc<Registry>, banks: BankStore, store: Arc<dyn WithdrawStore>) -> Self {
        Self {
            registry,
            banks,
            store,
        }
    }

    #[must_use]
    pub fn banks(&self) -> &BankStore {
        &self.banks
    }

    /// Submit a withdrawal whose destination is already complete.
    ///
    /// # Errors
    ///
    /// - `InvalidWithdraw` for malformed requests or unusable bank accounts
    /// - `InvalidExchange`, `Unsupported`, `AuthRequired`, `AuthRejected` from the gate
    /// - `OtpRejected` when a password cannot be produced or the venue refuses it
    /// - the venue's own rejection
    pub async fn submit(&self, venue: &str, request: &WithdrawRequest) -> Result<WithdrawEvent> {
        request.validate_basic()?;
        let kind = request.kind();
        let venue = self.registry.enabled(venue)?;
        venue.base().gate(kind.capability())?;

        let mut request = request.clone();
        if let Some(account) = request.bank_account() {
            account.check_usable(venue.name(), &request.currency)?;
        }
        request.validate()?;
        self.apply_passwords(venue.as_ref(), &mut request)?;

        let response = match kind {
            WithdrawKind::Crypto => venue.withdraw_crypto(&request).await,
            WithdrawKind::Fiat => venue.withdraw_fiat(&request).await,
            WithdrawKind::FiatInternational => venue.withdraw_fiat_international(&request).await,
        };
        let response = venue.base().track(response)?;
        info!(
            venue = %venue.name(),
            kind = kind.as_str(),
            currency = %request.currency,
            amount = %request.amount,
            venue_id = %response.id,
            "Withdrawal submitted"
        );

        let event = WithdrawEvent::new(venue.name(), &request, &response);
        if let Err(e) = self.store.save(&event).await {
            error!(venue = %venue.name(), id = %event.id, error = %e, "Failed to persist withdrawal");
        }
        Ok(event)
    }

    /// Resolve `bank_id` into the request's fiat destination, then submit.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown bank id, `InvalidInput` for crypto requests,
    /// then everything [`submit`](Self::submit) returns.
    pub async fn submit_fiat(
        &self,
        venue: &str,
        bank_id: &str,
        request: &WithdrawRequest,
    ) -> Result<WithdrawEvent> {
        let account = self.banks.get(bank_id)?;
        let mut request = request.clone();
        match &mut request.destination {
            Destination::Fiat(fiat) => fiat.bank_account = Some(account),
            Destination::Crypto(_) => {
                return Err(Error::InvalidInput(
                    "bank account given for a crypto withdrawal".into(),
                ))
            }
        }
        self.submit(venue, &request).await
    }

    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn withdrawal_by_id(&self, id: Uuid) -> Result<Option<WithdrawEvent>> {
        self.store.get(id).await
    }

    /// Most recent first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` for unknown venues or the store's error.
    pub async fn withdrawals_for_venue(
        &self,
        venue: &str,
        limit: usize,
    ) -> Result<Vec<WithdrawEvent>> {
        let venue = self
            .registry
            .get(venue)
            .ok_or_else(|| Error::InvalidExchange(format!("{venue} is not loaded")))?;
        self.store.list_for_venue(venue.name(), limit).await
    }

    fn apply_passwords(&self, venue: &dyn Venue, request: &mut WithdrawRequest) -> Result<()> {
        let credentials = venue.base().credentials();
        if request.trade_password.is_none() && !credentials.trade_password.is_empty() {
            request.trade_password = Some(credentials.trade_password.clone());
        }

        let needs_otp =
            venue.base().supports(Capability::WithdrawalRequiresOtp) || credentials.requires_otp();
        if !needs_otp || request.one_time_password.is_some() {
            return Ok(());
        }
        if !credentials.requires_otp() {
            warn!(venue = %venue.name(), "Venue requires a one-time password but no secret is configured");
            return Err(Error::OtpRejected {
                venue: venue.name().to_string(),
                reason: "no one-time password secret configured".into(),
            });
        }
        let otp = Otp::from_secret(venue.name(), &credentials.otp_secret)?;
        request.one_time_password = Some(otp.current()?);
        Ok(())
    }
}

impl std::fmt::Debug for WithdrawManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawManager")
            .field("banks", &self.banks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::memory::MemoryWithdrawStore;
    use crate::application::Caches;
    use crate::domain::{Capabilities, WithdrawError};
    use crate::error::ErrorKind;
    use crate::infrastructure::config::OrderbookConfig;
    use crate::port::MarketStore;
    use crate::testkit::fixtures;
    use crate::testkit::venue::MockVenue;
    use rust_decimal_macros::dec;

    const SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn store() -> Arc<dyn MarketStore> {
        Arc::new(Caches::new(OrderbookConfig::default()))
    }

    fn manager(venue: MockVenue) -> (WithdrawManager, Arc<MockVenue>, Arc<MemoryWithdrawStore>) {
        let venue = Arc::new(venue);
        let mut registry = Registry::new();
        registry.register(venue.clone()).unwrap();
        let history = Arc::new(MemoryWithdrawStore::new());
        let banks = BankStore::new(vec![fixtures::bank_account("acct-1", "USD,EUR")]);
        let manager = WithdrawManager::new(Arc::new(registry), banks, history.clone());
        (manager, venue, history)
    }

    #[tokio::test]
    async fn crypto_withdrawal_is_recorded() {
        let (manager, venue, history) = manager(MockVenue::configured("mock", store()));
        let request = WithdrawRequest::crypto("BTC", dec!(0.5), "bc1qexample");

        let event = manager.submit("mock", &request).await.unwrap();
        assert_eq!(event.venue, "mock");
        assert_eq!(venue.withdrawals().len(), 1);
        assert_eq!(history.len(), 1);

        let found = manager.withdrawal_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(found.venue_id, event.venue_id);
        assert_eq!(manager.withdrawals_for_venue("MOCK", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_permission_is_unsupported() {
        let caps = Capabilities::empty().with(Capability::CryptoWithdrawal);
        let (manager, _venue, _) = manager(MockVenue::configured_with("mock", caps, store()));
        let request = WithdrawRequest::fiat("USD", dec!(10), false);
        let err = manager.submit_fiat("mock", "acct-1", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn fiat_resolves_bank_account() {
        let (manager, venue, _) = manager(MockVenue::configured("mock", store()));
        let request = WithdrawRequest::fiat("USD", dec!(10), true);
        manager.submit_fiat("mock", "acct-1", &request).await.unwrap();

        let sent = venue.withdrawals();
        assert_eq!(sent[0].kind(), WithdrawKind::FiatInternational);
        assert_eq!(sent[0].bank_account().unwrap().id, "acct-1");
    }

    #[tokio::test]
    async fn fiat_checks_currency_and_id() {
        let (manager, venue, _) = manager(MockVenue::configured("mock", store()));
        let request = WithdrawRequest::fiat("JPY", dec!(10), false);
        let err = manager.submit_fiat("mock", "acct-1", &request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidWithdraw(WithdrawError::BankAccountUnsupported { .. })
        ));

        let err = manager.submit_fiat("mock", "nope", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(venue.withdrawals().is_empty());
    }

    #[tokio::test]
    async fn otp_is_generated_from_secret() {
        let venue = MockVenue::configured("mock", store());
        let mut creds = venue.base().credentials();
        creds.otp_secret = SEED.into();
        venue.base().set_credentials(creds);
        let (manager, venue, _) = manager(venue);

        let request = WithdrawRequest::crypto("BTC", dec!(1), "addr");
        manager.submit("mock", &request).await.unwrap();
        let otp = venue.withdrawals()[0].one_time_password.clone().unwrap();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn otp_required_without_secret_is_rejected() {
        let caps = MockVenue::default_capabilities().with(Capability::WithdrawalRequiresOtp);
        let (manager, venue, history) = manager(MockVenue::configured_with("mock", caps, store()));
        let request = WithdrawRequest::crypto("BTC", dec!(1), "addr");

        let err = manager.submit("mock", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OtpRejected);
        assert!(venue.withdrawals().is_empty());
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn venue_otp_rejection_aborts() {
        let (manager, venue, history) = manager(MockVenue::configured("mock", store()));
        venue.reject_otp("code expired");
        let request = WithdrawRequest::crypto("BTC", dec!(1), "addr");

        let err = manager.submit("mock", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OtpRejected);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_withdrawal() {
        let (manager, venue, history) = manager(MockVenue::configured("mock", store()));
        history.fail_saves(true);
        let request = WithdrawRequest::crypto("BTC", dec!(1), "addr");

        assert!(manager.submit("mock", &request).await.is_ok());
        assert_eq!(venue.withdrawals().len(), 1);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn zero_amount_is_invalid() {
        let (manager, _venue, _) = manager(MockVenue::configured("mock", store()));
        let request = WithdrawRequest::crypto("BTC", dec!(0), "addr");
        let err = manager.submit("mock", &request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidWithdraw(WithdrawError::AmountNotPositive)));
    }
}
