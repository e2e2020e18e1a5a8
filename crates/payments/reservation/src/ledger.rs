//! Per-account reservation ledger.

use std::time::SystemTime;

use blobmeter_primitives::{QuorumId, Reservation, billable_symbols};
use blobmeter_ratelimit::LeakyBucket;
use parking_lot::Mutex;

use crate::{ReservationLedgerConfig, ReservationLedgerError};

/// Meters one account's reservation.
///
/// Safe to share between tasks. Every operation holds an internal lock for its whole
/// check-and-fill, so concurrent debits never race on capacity. No I/O happens under the lock.
#[derive(Debug)]
pub struct ReservationLedger {
    inner: Mutex<LedgerState>,
}

#[derive(Debug)]
struct LedgerState {
    config: ReservationLedgerConfig,
    bucket: LeakyBucket,
    revoked: bool,
}

impl ReservationLedger {
    pub fn new(config: ReservationLedgerConfig, now: SystemTime) -> Result<Self, ReservationLedgerError> {
        let bucket = LeakyBucket::new(
            config.reservation().symbols_per_second(),
            config.bucket_capacity(),
            config.bias(),
            config.overfill(),
            config.start_full(),
            now,
        )?;

        Ok(Self {
            inner: Mutex::new(LedgerState {
                config,
                bucket,
                revoked: false,
            }),
        })
    }

    /// Charge a dispersal of `symbol_count` symbols against the reservation.
    ///
    /// Returns whether the debit was accepted, along with the capacity remaining afterwards.
    /// A `false` result is not an error: the bucket is simply full for now, and nothing was
    /// charged.
    pub fn debit(
        &self,
        now: SystemTime,
        dispersal_time: SystemTime,
        symbol_count: u32,
        quorums: &[QuorumId],
    ) -> Result<(bool, u64), ReservationLedgerError> {
        if symbol_count == 0 {
            return Err(ReservationLedgerError::ZeroSymbolCount);
        }

        let mut state = self.inner.lock();
        if state.revoked {
            return Err(ReservationLedgerError::ReservationRevoked);
        }
        let reservation = state.config.reservation();

        if !reservation.unpermitted_quorums(quorums).is_empty() {
            return Err(ReservationLedgerError::QuorumNotPermitted {
                requested: quorums.to_vec(),
                permitted: reservation.permitted_quorums().iter().copied().collect(),
            });
        }
        if !reservation.is_active_at(dispersal_time) {
            return Err(ReservationLedgerError::TimeOutOfRange {
                dispersal_time,
                start_time: reservation.start_time(),
                end_time: reservation.end_time(),
            });
        }

        let billable = billable_symbols(symbol_count, state.config.min_num_symbols());
        let accepted = state.bucket.fill(now, billable)?;
        Ok((accepted, state.bucket.remaining_capacity()))
    }

    /// Undo a debit of `symbol_count` symbols. Returns the remaining capacity afterwards.
    ///
    /// `now` is the current time, not the time of the original debit.
    pub fn revert_debit(&self, now: SystemTime, symbol_count: u32) -> Result<u64, ReservationLedgerError> {
        if symbol_count == 0 {
            return Err(ReservationLedgerError::ZeroSymbolCount);
        }

        let mut state = self.inner.lock();
        let billable = billable_symbols(symbol_count, state.config.min_num_symbols());
        state.bucket.revert_fill(now, billable)?;
        Ok(state.bucket.remaining_capacity())
    }

    /// Replace the reservation, keeping the bucket's absolute fill level.
    ///
    /// Symbols already in the bucket stay there. If the new capacity is smaller than the
    /// current level, the bucket is overfull until it drains. Clears a revocation.
    pub fn update_reservation(
        &self,
        reservation: Reservation,
        now: SystemTime,
    ) -> Result<(), ReservationLedgerError> {
        let mut state = self.inner.lock();
        let config = state.config.with_reservation(reservation)?;
        state
            .bucket
            .reconfigure(now, config.reservation().symbols_per_second(), config.bucket_capacity())?;
        state.config = config;
        state.revoked = false;
        Ok(())
    }

    /// Stop accepting debits until a reservation is installed again.
    ///
    /// The bucket keeps leaking and still accepts reverts, so a reservation restored later
    /// resumes from the same fill level.
    pub fn revoke(&self) {
        self.inner.lock().revoked = true;
    }

    pub fn is_revoked(&self) -> bool {
        self.inner.lock().revoked
    }

    /// Whether the bucket would be fully drained at `now`. Does not modify the ledger.
    pub fn is_bucket_empty(&self, now: SystemTime) -> Result<bool, ReservationLedgerError> {
        Ok(self.inner.lock().bucket.is_empty_at(now)?)
    }

    /// Capacity available at `now`. Does not modify the ledger.
    pub fn remaining_capacity(&self, now: SystemTime) -> Result<u64, ReservationLedgerError> {
        let state = self.inner.lock();
        let level = state.bucket.level_at(now)?;
        Ok(state.bucket.capacity().saturating_sub(level))
    }

    pub fn bucket_capacity(&self) -> u64 {
        self.inner.lock().bucket.capacity()
    }

    pub fn reservation(&self) -> Reservation {
        self.inner.lock().config.reservation().clone()
    }

    pub fn config(&self) -> ReservationLedgerConfig {
        self.inner.lock().config.clone()
    }
}
