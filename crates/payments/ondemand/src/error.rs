//! On-demand accounting error types.

use blobmeter_primitives::{QuorumId, U256};
use blobmeter_vault::VaultError;

/// A debit would push the cumulative payment past the account's deposits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "insufficient funds: cumulative payment {current_cumulative_payment} + blob cost {blob_cost} exceeds total deposits {total_deposits}"
)]
pub struct InsufficientFundsError {
    pub current_cumulative_payment: U256,
    pub total_deposits: U256,
    pub blob_cost: U256,
}

/// Errors from a [`CumulativePaymentStore`](crate::CumulativePaymentStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFundsError),

    /// Durable stores only ever move forward.
    #[error("cumulative payment cannot decrease in a durable store")]
    DecreaseForbidden,

    #[error("database error: {0}")]
    Database(String),

    #[error("store task failed: {0}")]
    Join(String),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

/// Errors from on-demand ledgers and the on-demand cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnDemandError {
    /// The request names a quorum on-demand payments cannot cover. Never succeeds on retry.
    #[error("quorum {requested} not supported for on-demand payments (supported: {supported:?})")]
    QuorumNotSupported {
        requested: QuorumId,
        supported: Vec<QuorumId>,
    },

    /// Retryable in isolation; deposits may grow or a reservation may take over.
    #[error(transparent)]
    InsufficientFunds(InsufficientFundsError),

    #[error("symbol count must be > 0")]
    ZeroSymbolCount,

    #[error("cumulative payment {cumulative_payment} exceeds total deposits {total_deposits}")]
    CumulativePaymentExceedsDeposits {
        cumulative_payment: U256,
        total_deposits: U256,
    },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl OnDemandError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientFunds(_) | Self::Vault(_))
    }
}

impl From<StoreError> for OnDemandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds(inner) => Self::InsufficientFunds(inner),
            other => Self::Store(other),
        }
    }
}
