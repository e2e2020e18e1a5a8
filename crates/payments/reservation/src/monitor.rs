//! Keeps cached reservation ledgers in sync with the vault.

use std::sync::Arc;

use async_trait::async_trait;
use blobmeter_primitives::{Address, Reservation};
use blobmeter_vault::{
    MonitorConfig, MonitorTarget, PaymentVault, RefreshSummary, VaultError, VaultMonitor,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{ReservationLedgerCache, ReservationLedgerError};

/// Ledgers whose reservations a [`ReservationVaultMonitor`] refreshes.
#[async_trait]
pub trait UpdatableReservationLedgers: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Accounts with a live ledger.
    fn accounts_to_update(&self) -> Vec<Address>;

    /// Apply a freshly fetched reservation. `None` means the vault no longer has one.
    async fn update_reservation(
        &self,
        account: Address,
        reservation: Option<Reservation>,
    ) -> Result<(), Self::Error>;
}

#[async_trait]
impl UpdatableReservationLedgers for ReservationLedgerCache {
    type Error = ReservationLedgerError;

    fn accounts_to_update(&self) -> Vec<Address> {
        ReservationLedgerCache::accounts_to_update(self)
    }

    async fn update_reservation(
        &self,
        account: Address,
        reservation: Option<Reservation>,
    ) -> Result<(), ReservationLedgerError> {
        ReservationLedgerCache::update_reservation(self, account, reservation).await
    }
}

/// [`MonitorTarget`] that pulls reservations from the vault and pushes them into ledgers.
pub struct ReservationVaultSync<L> {
    vault: Arc<dyn PaymentVault>,
    ledgers: Arc<L>,
}

impl<L> ReservationVaultSync<L> {
    pub fn new(vault: Arc<dyn PaymentVault>, ledgers: Arc<L>) -> Self {
        Self { vault, ledgers }
    }
}

#[async_trait]
impl<L: UpdatableReservationLedgers> MonitorTarget for ReservationVaultSync<L> {
    const FAMILY: &'static str = "reservation";

    fn accounts_to_update(&self) -> Vec<Address> {
        self.ledgers.accounts_to_update()
    }

    async fn refresh(&self, accounts: &[Address]) -> Result<usize, VaultError> {
        let reservations = self.vault.reservations(accounts).await?;
        VaultError::check_len(accounts.len(), reservations.len())?;

        let mut failed = 0;
        for (&account, data) in accounts.iter().zip(reservations) {
            let reservation = match data.map(Reservation::try_from).transpose() {
                Ok(reservation) => reservation,
                Err(error) => {
                    warn!(%account, %error, "invalid reservation in vault");
                    failed += 1;
                    continue;
                }
            };
            if let Err(error) = self.ledgers.update_reservation(account, reservation).await {
                warn!(%account, %error, "failed to update reservation ledger");
                failed += 1;
            }
        }
        Ok(failed)
    }
}

/// Background task refreshing reservations for a set of ledgers.
///
/// Never creates ledgers: only accounts reported by
/// [`accounts_to_update`](UpdatableReservationLedgers::accounts_to_update) are fetched.
pub struct ReservationVaultMonitor<L> {
    inner: VaultMonitor<ReservationVaultSync<L>>,
}

impl<L: UpdatableReservationLedgers> ReservationVaultMonitor<L> {
    /// Spawn onto the current tokio runtime. Stops when `shutdown` is cancelled.
    pub fn spawn(
        vault: Arc<dyn PaymentVault>,
        ledgers: Arc<L>,
        config: MonitorConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        let target = Arc::new(ReservationVaultSync::new(vault, ledgers));
        Self {
            inner: VaultMonitor::spawn(target, config, shutdown),
        }
    }

    /// Refresh now, outside the regular schedule.
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
