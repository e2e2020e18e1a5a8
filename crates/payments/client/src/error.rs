//! Client ledger error types.

use std::time::SystemTime;

use blobmeter_ondemand::OnDemandError;
use blobmeter_primitives::Address;
use blobmeter_reservation::ReservationLedgerError;

use crate::{ClientLedgerMode, PaymentMechanism};

/// A [`ClientLedger`](crate::ClientLedger) was assembled inconsistently.
///
/// Returned at construction only. Wiring code should treat it as a startup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("account cannot be the zero address")]
    ZeroAccount,

    #[error("{mode} mode requires a {mechanism} ledger")]
    MissingLedger {
        mode: ClientLedgerMode,
        mechanism: PaymentMechanism,
    },

    #[error("{mode} mode must not be given a {mechanism} ledger")]
    UnexpectedLedger {
        mode: ClientLedgerMode,
        mechanism: PaymentMechanism,
    },
}

/// What went wrong while paying for (or refunding) a dispersal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentFailure {
    #[error("reservation: {0}")]
    Reservation(#[from] ReservationLedgerError),

    #[error("on-demand: {0}")]
    OnDemand(#[from] OnDemandError),

    #[error(
        "reservation lacks capacity for blob with {symbols} symbols ({bytes} bytes), and no on-demand fallback is configured"
    )]
    ReservationExhausted { symbols: u32, bytes: u64 },

    #[error("payment uses {mechanism}, but no {mechanism} ledger is configured")]
    LedgerNotConfigured { mechanism: PaymentMechanism },

    #[error("ledger tracks account {expected}, got {got}")]
    ForeignAccount { expected: Address, got: Address },

    #[error("dispersal time {0:?} cannot be encoded as a payment timestamp")]
    InvalidTimestamp(SystemTime),
}

/// Payment failure, classified by whether the caller should retry.
///
/// A fatal failure means no future dispersal can be paid for without operator action, such
/// as a misconfigured ledger, an expired reservation, or exhausted funds with no fallback.
/// The ledger never aborts the process itself; callers decide how to stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientLedgerError {
    #[error("retryable payment failure: {0}")]
    Retryable(PaymentFailure),

    #[error("fatal payment failure: {0}")]
    Fatal(PaymentFailure),
}

impl ClientLedgerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn failure(&self) -> &PaymentFailure {
        match self {
            Self::Retryable(failure) | Self::Fatal(failure) => failure,
        }
    }

    pub(crate) fn fatal(failure: impl Into<PaymentFailure>) -> Self {
        Self::Fatal(failure.into())
    }

    pub(crate) fn retryable(failure: impl Into<PaymentFailure>) -> Self {
        Self::Retryable(failure.into())
    }
}

impl From<ReservationLedgerError> for ClientLedgerError {
    fn from(err: ReservationLedgerError) -> Self {
        if err.is_retryable() {
            Self::retryable(err)
        } else {
            Self::fatal(err)
        }
    }
}

impl From<OnDemandError> for ClientLedgerError {
    fn from(err: OnDemandError) -> Self {
        if err.is_retryable() {
            Self::retryable(err)
        } else {
            Self::fatal(err)
        }
    }
}
