//! Reservation ledger error types.

use std::time::SystemTime;

use blobmeter_primitives::{Address, QuorumId};
use blobmeter_ratelimit::{LeakyBucketError, TimeMovedBackwardError};
use blobmeter_vault::VaultError;

/// Errors from reservation ledgers and the reservation cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationLedgerError {
    /// The request names quorums the reservation does not cover. Never succeeds on retry.
    #[error("quorums {requested:?} not permitted by reservation (permitted: {permitted:?})")]
    QuorumNotPermitted {
        requested: Vec<QuorumId>,
        permitted: Vec<QuorumId>,
    },

    /// The dispersal time is outside the reservation window.
    #[error(
        "dispersal time {dispersal_time:?} outside reservation window [{start_time:?}, {end_time:?}]"
    )]
    TimeOutOfRange {
        dispersal_time: SystemTime,
        start_time: SystemTime,
        end_time: SystemTime,
    },

    /// Local clock regressed. Retryable.
    #[error(transparent)]
    TimeMovedBackward(#[from] TimeMovedBackwardError),

    #[error("symbol count must be > 0")]
    ZeroSymbolCount,

    /// Bucket parameters derived from the reservation are unusable.
    #[error("invalid bucket parameters: {0}")]
    InvalidBucket(LeakyBucketError),

    /// The vault holds no reservation for this account.
    #[error("no reservation found for account {0}")]
    ReservationNotFound(Address),

    /// The vault stopped reporting this ledger's reservation.
    #[error("reservation revoked")]
    ReservationRevoked,

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl ReservationLedgerError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimeMovedBackward(_) | Self::Vault(_))
    }
}

impl From<LeakyBucketError> for ReservationLedgerError {
    fn from(err: LeakyBucketError) -> Self {
        match err {
            LeakyBucketError::TimeMovedBackward(inner) => Self::TimeMovedBackward(inner),
            LeakyBucketError::ZeroSymbolCount => Self::ZeroSymbolCount,
            other => Self::InvalidBucket(other),
        }
    }
}
