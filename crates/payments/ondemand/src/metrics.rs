//! On-demand ledger cache metrics.

use metrics::{Counter, Gauge};

/// On-demand ledger cache metrics
#[derive(Clone, Debug)]
pub(crate) struct OnDemandCacheMetrics {
    /// Ledgers removed from the cache
    pub(crate) evictions_total: Counter,
    /// Ledgers currently cached
    pub(crate) size: Gauge,
}

impl Default for OnDemandCacheMetrics {
    fn default() -> Self {
        Self {
            evictions_total: metrics::counter!("payments.ondemand_cache.evictions_total"),
            size: metrics::gauge!("payments.ondemand_cache.size"),
        }
    }
}
