//! CLI arguments for a dispersal client's payment ledger.

use std::time::Duration;

use blobmeter_primitives::Reservation;
use blobmeter_ratelimit::OverfillBehavior;
use blobmeter_reservation::{DEFAULT_CLIENT_BIAS, ReservationLedgerConfig, ReservationLedgerError};
use blobmeter_vault::MonitorConfig;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::ClientLedgerMode;
use crate::constants::*;

/// Client ledger arguments.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Client Payments")]
#[serde(default)]
pub struct ClientLedgerArgs {
    /// Payment mechanisms (reservation-only, on-demand-only, reservation-and-on-demand)
    #[arg(long = "client-ledger.mode", default_value_t = DEFAULT_CLIENT_LEDGER_MODE)]
    pub mode: ClientLedgerMode,

    /// Seconds between reservation and deposit refreshes from the payment vault
    #[arg(
        long = "client-ledger.vault-monitor-interval",
        default_value_t = DEFAULT_VAULT_MONITOR_INTERVAL.as_secs()
    )]
    pub vault_monitor_interval_secs: u64,

    /// Reservation bucket capacity, in seconds of reserved throughput
    #[arg(
        long = "client-ledger.bucket-capacity-period",
        default_value_t = DEFAULT_CLIENT_BUCKET_CAPACITY_PERIOD.as_secs()
    )]
    pub bucket_capacity_period_secs: u64,
}

impl Default for ClientLedgerArgs {
    fn default() -> Self {
        Self {
            mode: DEFAULT_CLIENT_LEDGER_MODE,
            vault_monitor_interval_secs: DEFAULT_VAULT_MONITOR_INTERVAL.as_secs(),
            bucket_capacity_period_secs: DEFAULT_CLIENT_BUCKET_CAPACITY_PERIOD.as_secs(),
        }
    }
}

impl ClientLedgerArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.vault_monitor_interval_secs == 0 {
            return Err("client-ledger.vault-monitor-interval must be > 0".to_string());
        }
        if self.bucket_capacity_period_secs == 0 {
            return Err("client-ledger.bucket-capacity-period must be > 0".to_string());
        }
        Ok(())
    }

    /// Reservation ledger config for a client.
    ///
    /// The bucket starts full, since the client cannot know what it dispersed before it
    /// started, and partial seconds round against the client.
    pub fn reservation_config(
        &self,
        reservation: Reservation,
        min_num_symbols: u32,
    ) -> Result<ReservationLedgerConfig, ReservationLedgerError> {
        Ok(ReservationLedgerConfig::new(
            reservation,
            min_num_symbols,
            true,
            OverfillBehavior::OncePermitted,
            Duration::from_secs(self.bucket_capacity_period_secs),
        )?
        .with_bias(DEFAULT_CLIENT_BIAS))
    }

    /// Single batch: a client only ever monitors its own account.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(Duration::from_secs(self.vault_monitor_interval_secs))
            .with_max_batch_size(0)
    }
}

#[cfg(test)]
mod tests {
    use blobmeter_ratelimit::BiasBehavior;
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        client: ClientLedgerArgs,
    }

    #[test]
    fn test_defaults() {
        let args = Cli::parse_from(["test"]).client;
        assert_eq!(args, ClientLedgerArgs::default());
        assert!(args.validate().is_ok());
        assert_eq!(args.mode, ClientLedgerMode::ReservationAndOnDemand);
        assert_eq!(args.monitor_config().update_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_mode() {
        let args = Cli::parse_from(["test", "--client-ledger.mode", "on-demand-only"]).client;
        assert_eq!(args.mode, ClientLedgerMode::OnDemandOnly);

        assert!(Cli::try_parse_from(["test", "--client-ledger.mode", "sometimes"]).is_err());
    }

    #[test]
    fn test_reservation_config() {
        let args = ClientLedgerArgs::default();
        let reservation = Reservation::new(
            10,
            std::time::UNIX_EPOCH,
            std::time::UNIX_EPOCH + Duration::from_secs(3_600),
            [0, 1],
        )
        .unwrap();

        let config = args.reservation_config(reservation, 1).unwrap();
        assert_eq!(config.bucket_capacity(), 600);
        assert!(config.start_full());
        assert_eq!(config.bias(), BiasBehavior::PermitLess);
        assert_eq!(config.overfill(), OverfillBehavior::OncePermitted);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let args = ClientLedgerArgs {
            vault_monitor_interval_secs: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }
}
