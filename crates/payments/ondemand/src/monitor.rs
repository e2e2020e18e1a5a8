//! Keeps cached on-demand ledgers in sync with vault deposits.

use std::sync::Arc;

use async_trait::async_trait;
use blobmeter_primitives::{Address, U256};
use blobmeter_vault::{
    MonitorConfig, MonitorTarget, PaymentVault, RefreshSummary, VaultError, VaultMonitor,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{OnDemandError, OnDemandLedgerCache};

/// Ledgers whose deposits an [`OnDemandVaultMonitor`] refreshes.
pub trait UpdatableOnDemandLedgers: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Accounts with a live ledger.
    fn accounts_to_update(&self) -> Vec<Address>;

    fn update_total_deposits(&self, account: Address, total_deposits: U256)
    -> Result<(), Self::Error>;
}

impl UpdatableOnDemandLedgers for OnDemandLedgerCache {
    type Error = OnDemandError;

    fn accounts_to_update(&self) -> Vec<Address> {
        OnDemandLedgerCache::accounts_to_update(self)
    }

    fn update_total_deposits(
        &self,
        account: Address,
        total_deposits: U256,
    ) -> Result<(), OnDemandError> {
        OnDemandLedgerCache::update_total_deposits(self, account, total_deposits);
        Ok(())
    }
}

/// [`MonitorTarget`] that pulls deposits from the vault and pushes them into ledgers.
pub struct OnDemandVaultSync<L> {
    vault: Arc<dyn PaymentVault>,
    ledgers: Arc<L>,
}

impl<L> OnDemandVaultSync<L> {
    pub fn new(vault: Arc<dyn PaymentVault>, ledgers: Arc<L>) -> Self {
        Self { vault, ledgers }
    }
}

#[async_trait]
impl<L: UpdatableOnDemandLedgers> MonitorTarget for OnDemandVaultSync<L> {
    const FAMILY: &'static str = "ondemand";

    fn accounts_to_update(&self) -> Vec<Address> {
        self.ledgers.accounts_to_update()
    }

    async fn refresh(&self, accounts: &[Address]) -> Result<usize, VaultError> {
        let deposits = self.vault.total_deposits(accounts).await?;
        VaultError::check_len(accounts.len(), deposits.len())?;

        let mut failed = 0;
        for (&account, total_deposits) in accounts.iter().zip(deposits) {
            if let Err(error) = self.ledgers.update_total_deposits(account, total_deposits) {
                warn!(%account, %error, "failed to update on-demand ledger");
                failed += 1;
            }
        }
        Ok(failed)
    }
}

/// Background task refreshing deposits for a set of on-demand ledgers.
pub struct OnDemandVaultMonitor<L> {
    inner: VaultMonitor<OnDemandVaultSync<L>>,
}

impl<L: UpdatableOnDemandLedgers> OnDemandVaultMonitor<L> {
    /// Spawn onto the current tokio runtime. Stops when `shutdown` is cancelled.
    pub fn spawn(
        vault: Arc<dyn PaymentVault>,
        ledgers: Arc<L>,
        config: MonitorConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        let target = Arc::new(OnDemandVaultSync::new(vault, ledgers));
        Self {
            inner: VaultMonitor::spawn(target, config, shutdown),
        }
    }

    pub async fn refresh(&self) -> RefreshSummary {
        self.inner.refresh().await
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub async fn stop(self) {
        self.inner.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blobmeter_vault::TestPaymentVault;

    use super::*;
    use crate::{InMemoryStoreFactory, OnDemandLedgerCacheConfig};

    fn setup() -> (Arc<TestPaymentVault>, Arc<OnDemandLedgerCache>) {
        let vault = Arc::new(TestPaymentVault::new());
        let cache = Arc::new(OnDemandLedgerCache::new(
            OnDemandLedgerCacheConfig::default(),
            vault.clone(),
            Arc::new(InMemoryStoreFactory::new()),
        ));
        (vault, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_increase_unblocks_debits() {
        let (vault, cache) = setup();
        let a = Address::repeat_byte(1);
        vault.set_total_deposit(a, U256::from(10u64));
        let ledger = cache.get_or_create(a).await.unwrap();
        ledger.debit(10, &[0]).await.unwrap();
        assert!(ledger.debit(1, &[0]).await.is_err());

        vault.set_total_deposit(a, U256::from(100u64));
        let shutdown = CancellationToken::new();
        let monitor = OnDemandVaultMonitor::spawn(
            vault.clone(),
            Arc::clone(&cache),
            MonitorConfig::new(Duration::from_secs(30)),
            &shutdown,
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(ledger.total_deposits(), U256::from(100u64));
        assert_eq!(ledger.debit(1, &[0]).await, Ok(U256::from(11u64)));

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_follow_config() {
        let (vault, cache) = setup();
        for n in 1..=5 {
            let account = Address::repeat_byte(n);
            vault.set_total_deposit(account, U256::from(n as u64));
            cache.get_or_create(account).await.unwrap();
        }
        let calls = vault.calls();

        let shutdown = CancellationToken::new();
        let monitor = OnDemandVaultMonitor::spawn(
            vault.clone(),
            Arc::clone(&cache),
            MonitorConfig::new(Duration::from_secs(30)).with_max_batch_size(2),
            &shutdown,
        );

        let summary = monitor.refresh().await;
        assert_eq!(summary.accounts, 5);
        assert_eq!(summary.updated, 5);
        assert_eq!(vault.calls() - calls, 3);

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(monitor.is_stopped());
    }

    #[tokio::test]
    async fn test_vault_failure_fails_batch() {
        let (vault, cache) = setup();
        let a = Address::repeat_byte(1);
        cache.get_or_create(a).await.unwrap();

        vault.set_failure(Some("rpc down"));
        let sync = OnDemandVaultSync::new(vault.clone(), Arc::clone(&cache));
        assert_eq!(
            sync.refresh(&[a]).await,
            Err(VaultError::Request("rpc down".into()))
        );
    }
}
