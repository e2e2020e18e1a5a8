//! Vault monitor metrics.

use metrics::Counter;

/// Per-family vault monitor metrics.
#[derive(Clone, Debug)]
pub(crate) struct VaultMonitorMetrics {
    /// Completed refresh rounds
    pub(crate) refreshes_total: Counter,
    /// Rounds that timed out or had a failed vault fetch
    pub(crate) refresh_failures_total: Counter,
    /// Accounts whose fresh parameters could not be applied
    pub(crate) account_update_failures_total: Counter,
}

impl VaultMonitorMetrics {
    pub(crate) fn new(family: &'static str) -> Self {
        Self {
            refreshes_total: metrics::counter!(
                "payments.vault_monitor.refreshes_total",
                "family" => family
            ),
            refresh_failures_total: metrics::counter!(
                "payments.vault_monitor.refresh_failures_total",
                "family" => family
            ),
            account_update_failures_total: metrics::counter!(
                "payments.vault_monitor.account_update_failures_total",
                "family" => family
            ),
        }
    }
}
