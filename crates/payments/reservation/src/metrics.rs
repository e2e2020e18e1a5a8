//! Reservation ledger cache metrics.

use metrics::{Counter, Gauge};

/// Reservation ledger cache metrics
#[derive(Clone, Debug)]
pub(crate) struct ReservationCacheMetrics {
    /// Ledgers removed from the cache
    pub(crate) evictions_total: Counter,
    /// Eviction attempts that found a non-empty bucket
    pub(crate) premature_evictions_total: Counter,
    /// Capacity increases
    pub(crate) resizes_total: Counter,
    /// Ledgers currently cached
    pub(crate) size: Gauge,
    /// Current cache capacity
    pub(crate) capacity: Gauge,
}

impl Default for ReservationCacheMetrics {
    fn default() -> Self {
        Self {
            evictions_total: metrics::counter!("payments.reservation_cache.evictions_total"),
            premature_evictions_total: metrics::counter!(
                "payments.reservation_cache.premature_evictions_total"
            ),
            resizes_total: metrics::counter!("payments.reservation_cache.resizes_total"),
            size: metrics::gauge!("payments.reservation_cache.size"),
            capacity: metrics::gauge!("payments.reservation_cache.capacity"),
        }
    }
}
