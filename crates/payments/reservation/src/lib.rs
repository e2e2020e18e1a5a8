//! Reservation accounting.
//!
//! A reservation is a pre-purchased throughput allowance, metered per account by a
//! [`LeakyBucket`](blobmeter_ratelimit::LeakyBucket).
//!
//! # Components
//!
//! - [`ReservationLedger`] - Thread-safe meter for one account's reservation
//! - [`ReservationLedgerConfig`] - Parameters a ledger is built from
//! - [`ReservationLedgerCache`] - Bounded, vault-backed cache of ledgers for many accounts
//! - [`ReservationVaultMonitor`] - Background refresh of cached reservations from the vault

pub mod args;
mod cache;
mod config;
mod constants;
mod error;
mod ledger;
mod metrics;
mod monitor;

pub use args::ReservationCacheArgs;
pub use cache::{ReservationCacheStats, ReservationLedgerCache, ReservationLedgerCacheConfig};
pub use config::ReservationLedgerConfig;
pub use constants::*;
pub use error::ReservationLedgerError;
pub use ledger::ReservationLedger;
pub use monitor::{ReservationVaultMonitor, ReservationVaultSync, UpdatableReservationLedgers};
