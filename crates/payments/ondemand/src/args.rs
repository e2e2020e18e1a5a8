//! CLI arguments for the server-side on-demand ledger cache.

use std::time::Duration;

use blobmeter_primitives::QuorumId;
use blobmeter_vault::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL, MonitorConfig};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::OnDemandLedgerCacheConfig;
use crate::constants::*;

/// On-demand cache and vault monitor arguments.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "On-Demand Accounting")]
#[serde(default)]
pub struct OnDemandCacheArgs {
    /// Number of on-demand ledgers kept in memory
    #[arg(long = "ondemand.max-ledgers", default_value_t = DEFAULT_MAX_LEDGERS)]
    pub max_ledgers: usize,

    /// Quorums on-demand payments may target
    #[arg(
        long = "ondemand.supported-quorums",
        value_delimiter = ',',
        default_values_t = DEFAULT_SUPPORTED_QUORUMS
    )]
    pub supported_quorums: Vec<QuorumId>,

    /// Seconds between deposit refreshes from the payment vault
    #[arg(
        long = "ondemand.vault-update-interval",
        default_value_t = DEFAULT_UPDATE_INTERVAL.as_secs()
    )]
    pub vault_update_interval_secs: u64,

    /// Accounts fetched per vault call (0 = all at once)
    #[arg(long = "ondemand.vault-batch-size", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub vault_batch_size: usize,
}

impl Default for OnDemandCacheArgs {
    fn default() -> Self {
        Self {
            max_ledgers: DEFAULT_MAX_LEDGERS,
            supported_quorums: DEFAULT_SUPPORTED_QUORUMS.to_vec(),
            vault_update_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs(),
            vault_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl OnDemandCacheArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ledgers == 0 {
            return Err("ondemand.max-ledgers must be > 0".to_string());
        }
        if self.supported_quorums.is_empty() {
            return Err("ondemand.supported-quorums must name at least one quorum".to_string());
        }
        if self.vault_update_interval_secs == 0 {
            return Err("ondemand.vault-update-interval must be > 0".to_string());
        }
        Ok(())
    }

    pub fn cache_config(&self) -> OnDemandLedgerCacheConfig {
        OnDemandLedgerCacheConfig {
            max_ledgers: self.max_ledgers,
            supported_quorums: self.supported_quorums.iter().copied().collect(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(Duration::from_secs(self.vault_update_interval_secs))
            .with_max_batch_size(self.vault_batch_size)
    }
}
