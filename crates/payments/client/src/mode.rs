//! Client ledger modes.

use serde::{Deserialize, Serialize};

/// Payment mechanisms a [`ClientLedger`](crate::ClientLedger) uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClientLedgerMode {
    ReservationOnly,
    OnDemandOnly,
    /// Reservation first, on-demand when the reservation lacks capacity.
    ReservationAndOnDemand,
}

impl ClientLedgerMode {
    pub fn uses_reservation(self) -> bool {
        matches!(self, Self::ReservationOnly | Self::ReservationAndOnDemand)
    }

    pub fn uses_on_demand(self) -> bool {
        matches!(self, Self::OnDemandOnly | Self::ReservationAndOnDemand)
    }
}

/// One of the two ways a dispersal is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PaymentMechanism {
    Reservation,
    OnDemand,
}
