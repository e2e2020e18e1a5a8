//! Mode-dispatched client ledger.

use std::sync::Arc;
use std::time::SystemTime;

use blobmeter_ondemand::{OnDemandError, OnDemandLedger};
use blobmeter_primitives::{
    Address, Clock, PaymentMetadata, QuorumId, Reservation, U256, unix_nanos,
};
use blobmeter_reservation::{ReservationLedger, ReservationLedgerError};
use tracing::{debug, error, info, warn};

use crate::metrics::ClientLedgerMetrics;
use crate::{
    BYTES_PER_SYMBOL, ClientLedgerError, ClientLedgerMode, ConfigError, PaymentFailure,
    PaymentMechanism,
};

/// Payment state for the single account a dispersal client pays from.
///
/// Holds exactly the ledgers its [`ClientLedgerMode`] calls for. Every failure is returned
/// as [`ClientLedgerError::Retryable`] or [`ClientLedgerError::Fatal`]; a fatal error means
/// this client cannot pay for any further dispersal until an operator intervenes.
pub struct ClientLedger {
    account: Address,
    mode: ClientLedgerMode,
    reservation: Option<ReservationLedger>,
    on_demand: Option<OnDemandLedger>,
    clock: Arc<dyn Clock>,
    metrics: ClientLedgerMetrics,
}

impl std::fmt::Debug for ClientLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLedger")
            .field("account", &self.account)
            .field("mode", &self.mode)
            .field("reservation", &self.reservation)
            .field("on_demand", &self.on_demand)
            .finish_non_exhaustive()
    }
}

impl ClientLedger {
    /// Assemble a client ledger.
    ///
    /// Fails if `account` is zero, or if the ledgers given do not match `mode`: every
    /// mechanism the mode uses must have a ledger, and no other ledger may be given.
    pub fn new(
        account: Address,
        mode: ClientLedgerMode,
        reservation: Option<ReservationLedger>,
        on_demand: Option<OnDemandLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if account == Address::ZERO {
            return Err(ConfigError::ZeroAccount);
        }
        check_ledger(
            mode,
            PaymentMechanism::Reservation,
            mode.uses_reservation(),
            reservation.is_some(),
        )?;
        check_ledger(
            mode,
            PaymentMechanism::OnDemand,
            mode.uses_on_demand(),
            on_demand.is_some(),
        )?;

        let ledger = Self {
            account,
            mode,
            reservation,
            on_demand,
            clock,
            metrics: ClientLedgerMetrics::default(),
        };
        ledger.record_initial_metrics();
        debug!(%account, %mode, "created client ledger");
        Ok(ledger)
    }

    /// Pay for a dispersal of `symbol_count` symbols to `quorums`.
    ///
    /// On success the returned metadata names the mechanism used: a cumulative payment means
    /// on-demand, none means reservation.
    pub async fn debit(
        &self,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<PaymentMetadata, ClientLedgerError> {
        let now = self.clock.now();
        let timestamp = unix_nanos(now)
            .ok_or(ClientLedgerError::Fatal(PaymentFailure::InvalidTimestamp(now)))?;

        match self.mode {
            ClientLedgerMode::ReservationOnly => {
                self.debit_reservation_only(now, timestamp, symbol_count, quorums)
            }
            ClientLedgerMode::OnDemandOnly => {
                self.debit_on_demand_only(timestamp, symbol_count, quorums).await
            }
            ClientLedgerMode::ReservationAndOnDemand => {
                self.debit_reservation_or_on_demand(now, timestamp, symbol_count, quorums)
                    .await
            }
        }
    }

    /// Undo a debit whose dispersal never reached the disperser.
    ///
    /// Routed by `payment`: on-demand payments are refunded to the on-demand ledger,
    /// reservation payments to the reservation bucket.
    pub async fn revert_debit(
        &self,
        payment: &PaymentMetadata,
        symbol_count: u32,
    ) -> Result<(), ClientLedgerError> {
        self.check_account(payment.account_id)?;

        if payment.is_on_demand() {
            let ledger = self.on_demand_ledger()?;
            let cumulative_payment = ledger.revert_debit(symbol_count).await?;
            self.metrics.cumulative_payment.set(wei_gauge(cumulative_payment));
            debug!(
                account = %self.account,
                symbols = symbol_count,
                %cumulative_payment,
                "reverted on-demand debit"
            );
        } else {
            let ledger = self.reservation_ledger()?;
            let remaining = ledger.revert_debit(self.clock.now(), symbol_count)?;
            self.metrics.reservation_remaining_capacity.set(remaining as f64);
            debug!(
                account = %self.account,
                symbols = symbol_count,
                remaining,
                "reverted reservation debit"
            );
        }
        Ok(())
    }

    /// The only account this ledger pays for.
    pub fn accounts_to_update(&self) -> Vec<Address> {
        vec![self.account]
    }

    /// Apply a reservation fetched from the vault.
    ///
    /// A missing reservation is logged and the current one kept, so a transient vault gap
    /// does not strand the client. Updates for any other account are rejected.
    pub fn update_reservation(
        &self,
        account: Address,
        reservation: Option<Reservation>,
    ) -> Result<(), ClientLedgerError> {
        self.check_account(account)?;
        let ledger = self.reservation_ledger()?;

        let Some(reservation) = reservation else {
            warn!(%account, "vault reports no reservation, keeping current one");
            return Ok(());
        };

        ledger.update_reservation(reservation, self.clock.now())?;
        self.metrics
            .reservation_bucket_capacity
            .set(ledger.bucket_capacity() as f64);
        Ok(())
    }

    /// Apply a deposit fetched from the vault. Updates for any other account are rejected.
    pub fn update_total_deposits(
        &self,
        account: Address,
        total_deposits: U256,
    ) -> Result<(), ClientLedgerError> {
        self.check_account(account)?;
        self.on_demand_ledger()?.update_total_deposits(total_deposits);
        self.metrics.total_deposits.set(wei_gauge(total_deposits));
        Ok(())
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn mode(&self) -> ClientLedgerMode {
        self.mode
    }

    pub fn reservation_ledger(&self) -> Result<&ReservationLedger, ClientLedgerError> {
        self.reservation
            .as_ref()
            .ok_or(ClientLedgerError::Fatal(PaymentFailure::LedgerNotConfigured {
                mechanism: PaymentMechanism::Reservation,
            }))
    }

    pub fn on_demand_ledger(&self) -> Result<&OnDemandLedger, ClientLedgerError> {
        self.on_demand
            .as_ref()
            .ok_or(ClientLedgerError::Fatal(PaymentFailure::LedgerNotConfigured {
                mechanism: PaymentMechanism::OnDemand,
            }))
    }

    fn debit_reservation_only(
        &self,
        now: SystemTime,
        timestamp: i64,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<PaymentMetadata, ClientLedgerError> {
        if !self.debit_reservation(now, symbol_count, quorums)? {
            return Err(ClientLedgerError::Retryable(PaymentFailure::ReservationExhausted {
                symbols: symbol_count,
                bytes: u64::from(symbol_count) * BYTES_PER_SYMBOL,
            }));
        }
        Ok(PaymentMetadata::new(self.account, timestamp, None))
    }

    async fn debit_on_demand_only(
        &self,
        timestamp: i64,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<PaymentMetadata, ClientLedgerError> {
        let ledger = self.on_demand_ledger()?;
        // no fallback exists, so even insufficient funds are fatal
        let cumulative_payment = self
            .debit_on_demand(ledger, symbol_count, quorums)
            .await
            .map_err(|err| self.fatal(err))?;
        Ok(PaymentMetadata::new(self.account, timestamp, Some(cumulative_payment)))
    }

    async fn debit_reservation_or_on_demand(
        &self,
        now: SystemTime,
        timestamp: i64,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<PaymentMetadata, ClientLedgerError> {
        let on_demand = self.on_demand_ledger()?;
        if self.debit_reservation(now, symbol_count, quorums)? {
            return Ok(PaymentMetadata::new(self.account, timestamp, None));
        }

        info!(
            account = %self.account,
            symbols = symbol_count,
            bytes = u64::from(symbol_count) * BYTES_PER_SYMBOL,
            "reservation lacks capacity, falling back to on-demand"
        );

        match self.debit_on_demand(on_demand, symbol_count, quorums).await {
            Ok(cumulative_payment) => {
                Ok(PaymentMetadata::new(self.account, timestamp, Some(cumulative_payment)))
            }
            // the reservation may have capacity again on a later attempt
            Err(err @ OnDemandError::InsufficientFunds(_)) => Err(ClientLedgerError::retryable(err)),
            Err(err) => Err(self.fatal(err)),
        }
    }

    /// Returns whether the reservation accepted the debit. Only clock regressions are
    /// retryable; every other reservation error is fatal, including a dispersal time outside
    /// the reservation window, so that an expired reservation never drains on-demand funds.
    ///
    /// Fatal here means no debit can succeed with the reservation currently installed. The
    /// ledger itself stays usable: once the reservation monitor installs a renewed
    /// reservation, debits inside its window succeed again.
    fn debit_reservation(
        &self,
        now: SystemTime,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<bool, ClientLedgerError> {
        let ledger = self.reservation_ledger()?;
        match ledger.debit(now, now, symbol_count, quorums) {
            Ok((accepted, remaining)) => {
                self.metrics.reservation_remaining_capacity.set(remaining as f64);
                Ok(accepted)
            }
            Err(err @ ReservationLedgerError::TimeMovedBackward(_)) => {
                warn!(account = %self.account, %err, "reservation debit hit clock regression");
                Err(ClientLedgerError::retryable(err))
            }
            Err(err) => Err(self.fatal(err)),
        }
    }

    async fn debit_on_demand(
        &self,
        ledger: &OnDemandLedger,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<U256, OnDemandError> {
        let cumulative_payment = ledger.debit(symbol_count, quorums).await?;
        self.metrics.cumulative_payment.set(wei_gauge(cumulative_payment));
        Ok(cumulative_payment)
    }

    fn fatal(&self, failure: impl Into<PaymentFailure>) -> ClientLedgerError {
        let failure = failure.into();
        error!(account = %self.account, mode = %self.mode, %failure, "fatal payment failure");
        ClientLedgerError::Fatal(failure)
    }

    fn check_account(&self, account: Address) -> Result<(), ClientLedgerError> {
        if account != self.account {
            return Err(ClientLedgerError::Fatal(PaymentFailure::ForeignAccount {
                expected: self.account,
                got: account,
            }));
        }
        Ok(())
    }

    fn record_initial_metrics(&self) {
        if let Some(ledger) = &self.reservation {
            self.metrics
                .reservation_bucket_capacity
                .set(ledger.bucket_capacity() as f64);
            if let Ok(remaining) = ledger.remaining_capacity(self.clock.now()) {
                self.metrics.reservation_remaining_capacity.set(remaining as f64);
            }
        }
        if let Some(ledger) = &self.on_demand {
            self.metrics.total_deposits.set(wei_gauge(ledger.total_deposits()));
        }
    }
}

fn check_ledger(
    mode: ClientLedgerMode,
    mechanism: PaymentMechanism,
    required: bool,
    present: bool,
) -> Result<(), ConfigError> {
    match (required, present) {
        (true, false) => Err(ConfigError::MissingLedger { mode, mechanism }),
        (false, true) => Err(ConfigError::UnexpectedLedger { mode, mechanism }),
        _ => Ok(()),
    }
}

/// Wei amounts beyond `u128` saturate in gauges.
fn wei_gauge(amount: U256) -> f64 {
    u128::try_from(amount).map(|v| v as f64).unwrap_or(f64::MAX)
}
