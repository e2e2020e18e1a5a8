//! Client-side payment accounting for a single account.
//!
//! A dispersal client pays for every blob with its reservation, its on-demand deposit, or
//! both. [`ClientLedger`] picks the mechanism, falls back from reservation to on-demand
//! when configured to, and tells the caller whether a failure is worth retrying.
//!
//! # Components
//!
//! - [`ClientLedger`] - Mode-dispatched ledger producing [`PaymentMetadata`](blobmeter_primitives::PaymentMetadata)
//! - [`ClientLedgerMode`] - Which payment mechanisms are in use
//! - [`ClientLedgerError`] - Retryable vs fatal payment failures
//! - [`ClientLedgerMonitors`] - Vault monitors keeping the ledger's parameters current

pub mod args;
mod constants;
mod error;
mod ledger;
mod metrics;
mod mode;
mod monitor;

pub use args::ClientLedgerArgs;
pub use constants::*;
pub use error::{ClientLedgerError, ConfigError, PaymentFailure};
pub use ledger::ClientLedger;
pub use mode::{ClientLedgerMode, PaymentMechanism};
pub use monitor::ClientLedgerMonitors;
