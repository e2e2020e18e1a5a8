//! Vault error types.

use blobmeter_primitives::{Address, ReservationError};

/// Errors returned by a [`PaymentVault`](crate::PaymentVault).
///
/// All of these are transient from a monitor's point of view: the next tick retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// The underlying chain request failed.
    #[error("vault request failed: {0}")]
    Request(String),

    /// A batch call returned a different number of results than accounts requested.
    #[error("vault returned {got} results for {expected} accounts")]
    LengthMismatch { expected: usize, got: usize },

    /// The vault holds a reservation that cannot be used.
    #[error("invalid reservation for {account}: {source}")]
    InvalidReservation {
        account: Address,
        #[source]
        source: ReservationError,
    },
}

impl VaultError {
    /// Check that a batch response lines up with the request.
    pub fn check_len(expected: usize, got: usize) -> Result<(), Self> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::LengthMismatch { expected, got })
        }
    }
}
