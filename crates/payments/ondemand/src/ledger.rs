//! Per-account on-demand ledger.

use std::collections::BTreeSet;
use std::sync::Arc;

use blobmeter_primitives::{QuorumId, U256, billable_symbols};
use parking_lot::RwLock;

use crate::constants::DEFAULT_SUPPORTED_QUORUMS;
use crate::{CumulativePaymentStore, InMemoryCumulativePaymentStore, OnDemandError};

/// Pricing parameters for an [`OnDemandLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDemandLedgerConfig {
    pub total_deposits: U256,
    pub price_per_symbol: U256,
    pub min_num_symbols: u32,
    pub supported_quorums: BTreeSet<QuorumId>,
}

impl OnDemandLedgerConfig {
    /// Config supporting the default on-demand quorums.
    pub fn new(total_deposits: U256, price_per_symbol: u64, min_num_symbols: u32) -> Self {
        Self {
            total_deposits,
            price_per_symbol: U256::from(price_per_symbol),
            min_num_symbols,
            supported_quorums: DEFAULT_SUPPORTED_QUORUMS.into_iter().collect(),
        }
    }

    pub fn with_supported_quorums(mut self, quorums: impl IntoIterator<Item = QuorumId>) -> Self {
        self.supported_quorums = quorums.into_iter().collect();
        self
    }
}

/// Charges dispersals against an account's cumulative on-demand payment.
///
/// Atomicity of the bound check is delegated to the [`CumulativePaymentStore`]; the ledger
/// takes no lock of its own around store updates.
pub struct OnDemandLedger {
    total_deposits: RwLock<U256>,
    price_per_symbol: U256,
    min_num_symbols: u32,
    supported_quorums: BTreeSet<QuorumId>,
    store: Arc<dyn CumulativePaymentStore>,
}

impl std::fmt::Debug for OnDemandLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnDemandLedger")
            .field("total_deposits", &*self.total_deposits.read())
            .field("price_per_symbol", &self.price_per_symbol)
            .field("min_num_symbols", &self.min_num_symbols)
            .field("supported_quorums", &self.supported_quorums)
            .finish_non_exhaustive()
    }
}

impl OnDemandLedger {
    /// Build a ledger over an existing store, starting from the value it holds.
    pub async fn from_store(
        config: OnDemandLedgerConfig,
        store: Arc<dyn CumulativePaymentStore>,
    ) -> Result<Self, OnDemandError> {
        let cumulative_payment = store.get_cumulative_payment().await?;
        Self::build(config, cumulative_payment, store)
    }

    /// Build a ledger over a fresh in-memory store holding `cumulative_payment`.
    ///
    /// Clients use this with the value last reported by the disperser.
    pub fn from_value(
        config: OnDemandLedgerConfig,
        cumulative_payment: U256,
    ) -> Result<Self, OnDemandError> {
        let store = Arc::new(InMemoryCumulativePaymentStore::new(cumulative_payment));
        Self::build(config, cumulative_payment, store)
    }

    fn build(
        config: OnDemandLedgerConfig,
        cumulative_payment: U256,
        store: Arc<dyn CumulativePaymentStore>,
    ) -> Result<Self, OnDemandError> {
        if cumulative_payment > config.total_deposits {
            return Err(OnDemandError::CumulativePaymentExceedsDeposits {
                cumulative_payment,
                total_deposits: config.total_deposits,
            });
        }

        Ok(Self {
            total_deposits: RwLock::new(config.total_deposits),
            price_per_symbol: config.price_per_symbol,
            min_num_symbols: config.min_num_symbols,
            supported_quorums: config.supported_quorums,
            store,
        })
    }

    /// Charge a dispersal. Returns the new cumulative payment.
    pub async fn debit(&self, symbol_count: u32, quorums: &[QuorumId]) -> Result<U256, OnDemandError> {
        if symbol_count == 0 {
            return Err(OnDemandError::ZeroSymbolCount);
        }
        if let Some(&requested) = quorums.iter().find(|q| !self.supported_quorums.contains(q)) {
            return Err(OnDemandError::QuorumNotSupported {
                requested,
                supported: self.supported_quorums.iter().copied().collect(),
            });
        }

        let cost = self.blob_cost(symbol_count);
        let total_deposits = self.total_deposits();
        Ok(self.store.add_cumulative_payment(cost, total_deposits).await?)
    }

    /// Undo a debit of `symbol_count` symbols, clamping at zero. Returns the new cumulative payment.
    pub async fn revert_debit(&self, symbol_count: u32) -> Result<U256, OnDemandError> {
        if symbol_count == 0 {
            return Err(OnDemandError::ZeroSymbolCount);
        }
        let cost = self.blob_cost(symbol_count);
        Ok(self.store.subtract_cumulative_payment(cost).await?)
    }

    /// Replace the deposit bound. Any value is accepted, including a decrease.
    pub fn update_total_deposits(&self, total_deposits: U256) {
        *self.total_deposits.write() = total_deposits;
    }

    pub fn total_deposits(&self) -> U256 {
        *self.total_deposits.read()
    }

    pub async fn cumulative_payment(&self) -> Result<U256, OnDemandError> {
        Ok(self.store.get_cumulative_payment().await?)
    }

    /// Price of a dispersal of `symbol_count` symbols, after the minimum-symbol floor.
    pub fn blob_cost(&self, symbol_count: u32) -> U256 {
        U256::from(billable_symbols(symbol_count, self.min_num_symbols)) * self.price_per_symbol
    }

    pub fn price_per_symbol(&self) -> U256 {
        self.price_per_symbol
    }

    pub fn min_num_symbols(&self) -> u32 {
        self.min_num_symbols
    }

    pub fn supported_quorums(&self) -> &BTreeSet<QuorumId> {
        &self.supported_quorums
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{InsufficientFundsError, StoreError};

    fn test_config(total_deposits: u64) -> OnDemandLedgerConfig {
        OnDemandLedgerConfig::new(U256::from(total_deposits), 10, 10)
    }

    #[tokio::test]
    async fn test_min_symbols_charged() {
        let ledger = OnDemandLedger::from_value(test_config(10_000), U256::ZERO).unwrap();

        assert_eq!(ledger.debit(5, &[0]).await, Ok(U256::from(100u64)));
        assert_eq!(ledger.cumulative_payment().await, Ok(U256::from(100u64)));
        assert_eq!(ledger.debit(20, &[0, 1]).await, Ok(U256::from(300u64)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_reports_state() {
        let ledger = OnDemandLedger::from_value(test_config(150), U256::from(100u64)).unwrap();

        assert_eq!(
            ledger.debit(10, &[0]).await,
            Err(OnDemandError::InsufficientFunds(InsufficientFundsError {
                current_cumulative_payment: U256::from(100u64),
                total_deposits: U256::from(150u64),
                blob_cost: U256::from(100u64),
            }))
        );
        assert_eq!(ledger.cumulative_payment().await, Ok(U256::from(100u64)));
    }

    #[tokio::test]
    async fn test_unsupported_quorum() {
        let ledger = OnDemandLedger::from_value(test_config(10_000), U256::ZERO).unwrap();

        let err = ledger.debit(10, &[0, 2]).await.unwrap_err();
        assert_eq!(
            err,
            OnDemandError::QuorumNotSupported {
                requested: 2,
                supported: vec![0, 1],
            }
        );
        assert!(!err.is_retryable());
        assert_eq!(ledger.cumulative_payment().await, Ok(U256::ZERO));
    }

    #[tokio::test]
    async fn test_injected_quorums() {
        let config = test_config(10_000).with_supported_quorums([0, 1, 2]);
        let ledger = OnDemandLedger::from_value(config, U256::ZERO).unwrap();
        assert!(ledger.debit(10, &[2]).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_symbols() {
        let ledger = OnDemandLedger::from_value(test_config(10_000), U256::ZERO).unwrap();
        assert_eq!(ledger.debit(0, &[0]).await, Err(OnDemandError::ZeroSymbolCount));
        assert_eq!(ledger.revert_debit(0).await, Err(OnDemandError::ZeroSymbolCount));
    }

    #[tokio::test]
    async fn test_revert_debit() {
        let ledger = OnDemandLedger::from_value(test_config(10_000), U256::from(50u64)).unwrap();

        ledger.debit(20, &[0]).await.unwrap();
        assert_eq!(ledger.revert_debit(20).await, Ok(U256::from(50u64)));
        // clamps at zero
        assert_eq!(ledger.revert_debit(20).await, Ok(U256::ZERO));
    }

    #[tokio::test]
    async fn test_update_total_deposits() {
        let ledger = OnDemandLedger::from_value(test_config(100), U256::ZERO).unwrap();
        ledger.debit(10, &[0]).await.unwrap();
        assert!(ledger.debit(10, &[0]).await.is_err());

        ledger.update_total_deposits(U256::from(200u64));
        assert_eq!(ledger.debit(10, &[0]).await, Ok(U256::from(200u64)));

        // decreases are accepted; further debits simply fail
        ledger.update_total_deposits(U256::from(50u64));
        assert_eq!(ledger.total_deposits(), U256::from(50u64));
        assert_matches!(ledger.debit(1, &[0]).await, Err(OnDemandError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn test_starting_value_above_deposits() {
        assert_matches!(
            OnDemandLedger::from_value(test_config(100), U256::from(101u64)),
            Err(OnDemandError::CumulativePaymentExceedsDeposits { .. })
        );
    }

    #[tokio::test]
    async fn test_from_store_reads_existing_value() {
        let store = Arc::new(InMemoryCumulativePaymentStore::new(U256::from(400u64)));
        let ledger = OnDemandLedger::from_store(test_config(1_000), store.clone()).await.unwrap();

        assert_eq!(ledger.debit(10, &[1]).await, Ok(U256::from(500u64)));
        assert_eq!(store.get_cumulative_payment().await, Ok(U256::from(500u64)));
    }

    #[tokio::test]
    async fn test_durable_store_revert_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = crate::RedbPaymentStore::open(dir.path().join("payments.redb")).unwrap();
        let store = Arc::new(db.account(blobmeter_primitives::Address::repeat_byte(1)));
        let ledger = OnDemandLedger::from_store(test_config(1_000), store).await.unwrap();

        ledger.debit(10, &[0]).await.unwrap();
        assert_eq!(
            ledger.revert_debit(10).await,
            Err(OnDemandError::Store(StoreError::DecreaseForbidden))
        );
        assert_eq!(ledger.cumulative_payment().await, Ok(U256::from(100u64)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_exactly_one_succeeds() {
        let ledger = Arc::new(
            OnDemandLedger::from_value(OnDemandLedgerConfig::new(U256::from(150u64), 1, 1), U256::ZERO)
                .unwrap(),
        );

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.debit(100, &[0]).await })
            })
            .collect();
        let results: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(OnDemandError::InsufficientFunds(e)) if e.current_cumulative_payment == U256::from(100u64)
        )));
        assert_eq!(ledger.cumulative_payment().await, Ok(U256::from(100u64)));
    }
}
