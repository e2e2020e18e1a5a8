//! Payment vault interface.

use async_trait::async_trait;
use blobmeter_primitives::{Address, ReservationData, U256};

use crate::VaultError;

/// Read-only access to the on-chain payment vault.
///
/// Batch methods preserve the order of `accounts`. Unknown accounts yield a zero deposit
/// or an absent reservation rather than an error.
#[async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait PaymentVault: Send + Sync {
    /// Total on-demand deposit of one account.
    async fn total_deposit(&self, account: Address) -> Result<U256, VaultError>;

    /// Total on-demand deposits of several accounts.
    async fn total_deposits(&self, accounts: &[Address]) -> Result<Vec<U256>, VaultError>;

    /// Reservation of one account, if it has one.
    async fn reservation(&self, account: Address) -> Result<Option<ReservationData>, VaultError>;

    /// Reservations of several accounts.
    async fn reservations(
        &self,
        accounts: &[Address],
    ) -> Result<Vec<Option<ReservationData>>, VaultError>;

    /// Network-wide on-demand throughput limit.
    async fn global_symbols_per_second(&self) -> Result<u64, VaultError>;

    /// Minimum number of symbols billed per dispersal.
    async fn min_num_symbols(&self) -> Result<u32, VaultError>;

    /// On-demand price per symbol, in wei.
    async fn price_per_symbol(&self) -> Result<u64, VaultError>;
}
