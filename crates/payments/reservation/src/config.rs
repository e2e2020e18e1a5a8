//! Reservation ledger configuration.

use std::time::Duration;

use blobmeter_primitives::Reservation;
use blobmeter_ratelimit::{BiasBehavior, OverfillBehavior, bucket_capacity};

use crate::constants::DEFAULT_CLIENT_BIAS;
use crate::ReservationLedgerError;

/// Parameters a [`ReservationLedger`](crate::ReservationLedger) is built from.
///
/// Validated on construction: the bucket capacity derived from the reservation's rate and
/// `bucket_capacity_period` is always at least one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLedgerConfig {
    reservation: Reservation,
    min_num_symbols: u32,
    start_full: bool,
    overfill: OverfillBehavior,
    bias: BiasBehavior,
    bucket_capacity_period: Duration,
    bucket_capacity: u64,
}

impl ReservationLedgerConfig {
    /// Create a config with the client bias. Servers override it with [`with_bias`](Self::with_bias).
    pub fn new(
        reservation: Reservation,
        min_num_symbols: u32,
        start_full: bool,
        overfill: OverfillBehavior,
        bucket_capacity_period: Duration,
    ) -> Result<Self, ReservationLedgerError> {
        let bucket_capacity = bucket_capacity(reservation.symbols_per_second(), bucket_capacity_period)
            .map_err(ReservationLedgerError::InvalidBucket)?;

        Ok(Self {
            reservation,
            min_num_symbols,
            start_full,
            overfill,
            bias: DEFAULT_CLIENT_BIAS,
            bucket_capacity_period,
            bucket_capacity,
        })
    }

    pub fn with_bias(mut self, bias: BiasBehavior) -> Self {
        self.bias = bias;
        self
    }

    /// Same parameters applied to a replacement reservation.
    pub fn with_reservation(&self, reservation: Reservation) -> Result<Self, ReservationLedgerError> {
        Ok(Self::new(
            reservation,
            self.min_num_symbols,
            self.start_full,
            self.overfill,
            self.bucket_capacity_period,
        )?
        .with_bias(self.bias))
    }

    pub fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    pub fn min_num_symbols(&self) -> u32 {
        self.min_num_symbols
    }

    pub fn start_full(&self) -> bool {
        self.start_full
    }

    pub fn overfill(&self) -> OverfillBehavior {
        self.overfill
    }

    pub fn bias(&self) -> BiasBehavior {
        self.bias
    }

    pub fn bucket_capacity_period(&self) -> Duration {
        self.bucket_capacity_period
    }

    /// Symbols per second times the capacity period.
    pub fn bucket_capacity(&self) -> u64 {
        self.bucket_capacity
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use assert_matches::assert_matches;
    use blobmeter_ratelimit::LeakyBucketError;

    use super::*;

    fn reservation(rate: u64) -> Reservation {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        Reservation::new(rate, start, start + Duration::from_secs(3_600), [0, 1]).unwrap()
    }

    #[test]
    fn test_capacity_derived_from_rate() {
        let config = ReservationLedgerConfig::new(
            reservation(10),
            1,
            false,
            OverfillBehavior::OncePermitted,
            Duration::from_secs(60),
        )
        .unwrap();

        assert_eq!(config.bucket_capacity(), 600);
        assert_eq!(config.bias(), BiasBehavior::PermitLess);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_matches!(
            ReservationLedgerConfig::new(
                reservation(1),
                1,
                false,
                OverfillBehavior::OncePermitted,
                Duration::from_millis(100),
            ),
            Err(ReservationLedgerError::InvalidBucket(LeakyBucketError::ZeroCapacity))
        );
    }

    #[test]
    fn test_with_reservation_keeps_policy() {
        let config = ReservationLedgerConfig::new(
            reservation(10),
            7,
            true,
            OverfillBehavior::NotPermitted,
            Duration::from_secs(30),
        )
        .unwrap()
        .with_bias(BiasBehavior::PermitMore);

        let updated = config.with_reservation(reservation(20)).unwrap();
        assert_eq!(updated.bucket_capacity(), 600);
        assert_eq!(updated.min_num_symbols(), 7);
        assert!(updated.start_full());
        assert_eq!(updated.overfill(), OverfillBehavior::NotPermitted);
        assert_eq!(updated.bias(), BiasBehavior::PermitMore);
        assert_eq!(updated.reservation().symbols_per_second(), 20);
    }
}
