//! Client ledger metrics.

use metrics::Gauge;

/// Client ledger metrics
#[derive(Clone, Debug)]
pub(crate) struct ClientLedgerMetrics {
    /// Symbols the reservation bucket can still take
    pub(crate) reservation_remaining_capacity: Gauge,
    /// Reservation bucket capacity
    pub(crate) reservation_bucket_capacity: Gauge,
    /// Latest cumulative on-demand payment, in wei
    pub(crate) cumulative_payment: Gauge,
    /// On-demand deposits, in wei
    pub(crate) total_deposits: Gauge,
}

impl Default for ClientLedgerMetrics {
    fn default() -> Self {
        Self {
            reservation_remaining_capacity: metrics::gauge!(
                "payments.client_ledger.reservation_remaining_capacity"
            ),
            reservation_bucket_capacity: metrics::gauge!(
                "payments.client_ledger.reservation_bucket_capacity"
            ),
            cumulative_payment: metrics::gauge!("payments.client_ledger.cumulative_payment"),
            total_deposits: metrics::gauge!("payments.client_ledger.total_deposits"),
        }
    }
}
