//! Shared types for blob dispersal payment accounting.
//!
//! # Components
//!
//! - [`Reservation`] - Pre-purchased throughput allowance for a time window and quorum set
//! - [`PaymentMetadata`] - Per-dispersal payment header attached to requests
//! - [`Clock`] - Injectable time source used by ledgers
//! - [`billable_symbols`] - Minimum-symbol billing floor

mod clock;
mod payment;
mod reservation;

pub use clock::{Clock, SystemClock, unix_nanos};
#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
pub use payment::PaymentMetadata;
pub use reservation::{Reservation, ReservationData, ReservationError};

/// Re-exported so dependents agree on the account and amount types.
pub use alloy_primitives::{Address, U256};

/// Identifier of a validator quorum.
pub type QuorumId = u8;

/// Number of symbols billed for a dispersal of `symbol_count` symbols.
///
/// Dispersals smaller than `min_num_symbols` are billed as if they were exactly that size.
pub fn billable_symbols(symbol_count: u32, min_num_symbols: u32) -> u32 {
    symbol_count.max(min_num_symbols)
}
