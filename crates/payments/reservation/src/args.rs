//! CLI arguments for the server-side reservation ledger cache.

use std::time::Duration;

use blobmeter_ratelimit::{BiasBehavior, OverfillBehavior};
use blobmeter_vault::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL, MonitorConfig};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::ReservationLedgerCacheConfig;

/// Reservation cache and vault monitor arguments.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Reservation Accounting")]
#[serde(default)]
pub struct ReservationCacheArgs {
    /// Initial number of reservation ledgers kept in memory
    #[arg(long = "reservation.max-ledgers", default_value_t = DEFAULT_MAX_LEDGERS)]
    pub max_ledgers: usize,

    /// Upper bound the cache may grow to rather than drop unsettled buckets
    #[arg(long = "reservation.max-ledgers-ceiling", default_value_t = DEFAULT_MAX_LEDGERS_CEILING)]
    pub max_ledgers_ceiling: usize,

    /// Leaky bucket capacity, in seconds of reserved throughput
    #[arg(
        long = "reservation.bucket-capacity-period",
        default_value_t = DEFAULT_BUCKET_CAPACITY_PERIOD.as_secs()
    )]
    pub bucket_capacity_period_secs: u64,

    /// Overfill policy (not-permitted, once-permitted)
    #[arg(long = "reservation.overfill", default_value_t = DEFAULT_OVERFILL_BEHAVIOR)]
    pub overfill: OverfillBehavior,

    /// Partial-second rounding (permit-more, permit-less)
    #[arg(long = "reservation.bias", default_value_t = DEFAULT_SERVER_BIAS)]
    pub bias: BiasBehavior,

    /// Seconds between reservation refreshes from the payment vault
    #[arg(
        long = "reservation.vault-update-interval",
        default_value_t = DEFAULT_UPDATE_INTERVAL.as_secs()
    )]
    pub vault_update_interval_secs: u64,

    /// Accounts fetched per vault call (0 = all at once)
    #[arg(long = "reservation.vault-batch-size", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub vault_batch_size: usize,
}

impl Default for ReservationCacheArgs {
    fn default() -> Self {
        Self {
            max_ledgers: DEFAULT_MAX_LEDGERS,
            max_ledgers_ceiling: DEFAULT_MAX_LEDGERS_CEILING,
            bucket_capacity_period_secs: DEFAULT_BUCKET_CAPACITY_PERIOD.as_secs(),
            overfill: DEFAULT_OVERFILL_BEHAVIOR,
            bias: DEFAULT_SERVER_BIAS,
            vault_update_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs(),
            vault_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl ReservationCacheArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ledgers == 0 {
            return Err("reservation.max-ledgers must be > 0".to_string());
        }
        if self.max_ledgers_ceiling < self.max_ledgers {
            return Err(
                "reservation.max-ledgers-ceiling must be >= reservation.max-ledgers".to_string(),
            );
        }
        if self.bucket_capacity_period_secs == 0 {
            return Err("reservation.bucket-capacity-period must be > 0".to_string());
        }
        if self.vault_update_interval_secs == 0 {
            return Err("reservation.vault-update-interval must be > 0".to_string());
        }
        Ok(())
    }

    pub fn cache_config(&self) -> ReservationLedgerCacheConfig {
        ReservationLedgerCacheConfig {
            max_ledgers: self.max_ledgers,
            max_ledgers_ceiling: self.max_ledgers_ceiling,
            bucket_capacity_period: Duration::from_secs(self.bucket_capacity_period_secs),
            overfill: self.overfill,
            bias: self.bias,
            start_full: false,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(Duration::from_secs(self.vault_update_interval_secs))
            .with_max_batch_size(self.vault_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        reservation: ReservationCacheArgs,
    }

    #[test]
    fn test_defaults_match_cache_defaults() {
        let args = Cli::parse_from(["test"]).reservation;
        assert_eq!(args, ReservationCacheArgs::default());
        assert!(args.validate().is_ok());
        assert_eq!(args.cache_config(), ReservationLedgerCacheConfig::default());
        assert_eq!(args.monitor_config(), MonitorConfig::default());
    }

    #[test]
    fn test_parse_policies() {
        let args = Cli::parse_from([
            "test",
            "--reservation.overfill",
            "not-permitted",
            "--reservation.bias",
            "permit-less",
            "--reservation.max-ledgers",
            "16",
        ])
        .reservation;

        let config = args.cache_config();
        assert_eq!(config.overfill, OverfillBehavior::NotPermitted);
        assert_eq!(config.bias, BiasBehavior::PermitLess);
        assert_eq!(config.max_ledgers, 16);
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let args = ReservationCacheArgs {
            max_ledgers: 100,
            max_ledgers_ceiling: 10,
            ..Default::default()
        };
        assert!(args.validate().is_err());

        let args = ReservationCacheArgs {
            vault_update_interval_secs: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }
}
