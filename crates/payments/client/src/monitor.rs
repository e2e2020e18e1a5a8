//! Vault monitors for a client ledger.

use std::sync::Arc;

use async_trait::async_trait;
use blobmeter_ondemand::{OnDemandVaultMonitor, UpdatableOnDemandLedgers};
use blobmeter_primitives::{Address, Reservation, U256};
use blobmeter_reservation::{ReservationVaultMonitor, UpdatableReservationLedgers};
use blobmeter_vault::{MonitorConfig, PaymentVault};
use tokio_util::sync::CancellationToken;

use crate::{ClientLedger, ClientLedgerError};

#[async_trait]
impl UpdatableReservationLedgers for ClientLedger {
    type Error = ClientLedgerError;

    fn accounts_to_update(&self) -> Vec<Address> {
        ClientLedger::accounts_to_update(self)
    }

    async fn update_reservation(
        &self,
        account: Address,
        reservation: Option<Reservation>,
    ) -> Result<(), ClientLedgerError> {
        ClientLedger::update_reservation(self, account, reservation)
    }
}

impl UpdatableOnDemandLedgers for ClientLedger {
    type Error = ClientLedgerError;

    fn accounts_to_update(&self) -> Vec<Address> {
        ClientLedger::accounts_to_update(self)
    }

    fn update_total_deposits(
        &self,
        account: Address,
        total_deposits: U256,
    ) -> Result<(), ClientLedgerError> {
        ClientLedger::update_total_deposits(self, account, total_deposits)
    }
}

/// Monitors refreshing a [`ClientLedger`]'s reservation and deposit.
///
/// Only the ledgers the client's mode uses are monitored. Dropping the handle stops every
/// monitor.
pub struct ClientLedgerMonitors {
    reservation: Option<ReservationVaultMonitor<ClientLedger>>,
    on_demand: Option<OnDemandVaultMonitor<ClientLedger>>,
}

impl ClientLedgerMonitors {
    /// Spawn onto the current tokio runtime. Stops when `shutdown` is cancelled.
    pub fn spawn(
        ledger: &Arc<ClientLedger>,
        vault: Arc<dyn PaymentVault>,
        config: MonitorConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        let reservation = ledger.mode().uses_reservation().then(|| {
            ReservationVaultMonitor::spawn(Arc::clone(&vault), Arc::clone(ledger), config, shutdown)
        });
        let on_demand = ledger.mode().uses_on_demand().then(|| {
            OnDemandVaultMonitor::spawn(Arc::clone(&vault), Arc::clone(ledger), config, shutdown)
        });

        Self {
            reservation,
            on_demand,
        }
    }

    /// Refresh every monitored parameter now, outside the regular schedule.
    pub async fn refresh(&self) {
        if let Some(monitor) = &self.reservation {
            monitor.refresh().await;
        }
        if let Some(monitor) = &self.on_demand {
            monitor.refresh().await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.reservation.as_ref().is_none_or(|m| m.is_stopped())
            && self.on_demand.as_ref().is_none_or(|m| m.is_stopped())
    }

    /// Stop every monitor and wait for them to exit.
    pub async fn stop(self) {
        if let Some(monitor) = self.reservation {
            monitor.stop().await;
        }
        if let Some(monitor) = self.on_demand {
            monitor.stop().await;
        }
    }
}
