//! Payment vault access and background refresh of vault-sourced ledger parameters.
//!
//! # Components
//!
//! - [`PaymentVault`] - Read-only view of the on-chain payment vault
//! - [`VaultMonitor`] - Cancellable background task polling the vault on an interval
//! - [`MonitorTarget`] - Ledger family a monitor keeps in sync
//! - [`StripedLocks`] - Per-account creation locks for ledger caches
//! - `TestPaymentVault` - In-memory vault for tests (feature `test-utils`)

mod constants;
mod error;
mod locks;
mod metrics;
mod monitor;
#[cfg(any(test, feature = "test-utils"))]
mod test_utils;
mod vault;

pub use constants::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL};
pub use error::VaultError;
pub use locks::StripedLocks;
pub use monitor::{MonitorConfig, MonitorTarget, RefreshSummary, VaultMonitor, refresh_round};
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::TestPaymentVault;
pub use vault::PaymentVault;
