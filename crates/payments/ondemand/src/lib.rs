//! On-demand payment accounting.
//!
//! Each account pays per dispersal from an on-chain deposit. Spending is tracked as a
//! monotonically increasing cumulative payment, which must never exceed the deposit.
//!
//! # Components
//!
//! - [`OnDemandLedger`] - Prices dispersals and charges them against a cumulative payment store
//! - [`CumulativePaymentStore`] - Atomic bounded counter, in memory or durable
//! - [`RedbPaymentStore`] - Durable, increase-only store for servers
//! - [`OnDemandLedgerCache`] - Bounded, vault-backed cache of ledgers for many accounts
//! - [`OnDemandVaultMonitor`] - Background refresh of cached deposits from the vault

pub mod args;
mod cache;
mod constants;
mod error;
mod ledger;
mod metrics;
mod monitor;
mod redb_store;
mod store;

pub use args::OnDemandCacheArgs;
pub use cache::{OnDemandCacheStats, OnDemandLedgerCache, OnDemandLedgerCacheConfig};
pub use constants::*;
pub use error::{InsufficientFundsError, OnDemandError, StoreError};
pub use ledger::{OnDemandLedger, OnDemandLedgerConfig};
pub use monitor::{OnDemandVaultMonitor, OnDemandVaultSync, UpdatableOnDemandLedgers};
pub use redb_store::{RedbAccountPaymentStore, RedbPaymentStore};
pub use store::{
    CumulativePaymentStore, CumulativePaymentStoreFactory, InMemoryCumulativePaymentStore,
    InMemoryStoreFactory,
};
