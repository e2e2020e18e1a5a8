//! Leaky bucket state machine.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{LeakyBucketError, TimeMovedBackwardError};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Rounding direction for sub-second leakage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BiasBehavior {
    /// Round partial-second leakage up. Lenient; used where denying a paid dispersal is worse
    /// than admitting a slightly early one.
    PermitMore,
    /// Round partial-second leakage down. Frugal; used by clients that must never exceed
    /// what the server will accept.
    PermitLess,
}

/// What to do with a fill that does not fit in the remaining capacity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OverfillBehavior {
    /// Reject any fill that would exceed capacity.
    NotPermitted,
    /// Accept one over-capacity fill as long as the bucket is not already at or above capacity.
    OncePermitted,
}

/// Number of symbols a bucket leaking at `leak_rate` drains in `duration`, rounded down.
pub fn bucket_capacity(leak_rate: u64, duration: Duration) -> Result<u64, LeakyBucketError> {
    if leak_rate == 0 {
        return Err(LeakyBucketError::ZeroLeakRate);
    }
    let symbols = u128::from(leak_rate) * duration.as_nanos() / NANOS_PER_SECOND;
    let capacity = u64::try_from(symbols)
        .map_err(|_| LeakyBucketError::CapacityOverflow { leak_rate, duration })?;
    if capacity == 0 {
        return Err(LeakyBucketError::ZeroCapacity);
    }
    Ok(capacity)
}

/// Integer leaky bucket.
///
/// Leakage for whole seconds is exact. Sub-second leakage is rounded according to the
/// [`BiasBehavior`], and the rounding applied by one leak is subtracted by the next, so the
/// total leaked across any sequence of leaks spanning `n` whole seconds is exactly
/// `n * leak_rate`.
///
/// Not synchronized. Owners are expected to guard it with their own lock.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    bias: BiasBehavior,
    overfill: OverfillBehavior,
    capacity: u64,
    leak_rate: u64,
    fill_level: u64,
    previous_leak_time: SystemTime,
    /// Symbols already leaked for the sub-second part of `previous_leak_time`.
    previous_partial_leakage: u64,
}

impl LeakyBucket {
    /// Create a bucket. With `start_full` the bucket begins at capacity, so nothing can be
    /// admitted until some time has passed.
    pub fn new(
        leak_rate: u64,
        capacity: u64,
        bias: BiasBehavior,
        overfill: OverfillBehavior,
        start_full: bool,
        now: SystemTime,
    ) -> Result<Self, LeakyBucketError> {
        if leak_rate == 0 {
            return Err(LeakyBucketError::ZeroLeakRate);
        }
        if capacity == 0 {
            return Err(LeakyBucketError::ZeroCapacity);
        }
        let (_, nanos) = split_time(now)?;

        Ok(Self {
            bias,
            overfill,
            capacity,
            leak_rate,
            fill_level: if start_full { capacity } else { 0 },
            previous_leak_time: now,
            previous_partial_leakage: partial_second_leakage(bias, leak_rate, nanos),
        })
    }

    /// Add `symbol_count` symbols to the bucket.
    ///
    /// Returns `Ok(false)` if the bucket lacks capacity. A rejected fill does not count
    /// against the meter.
    pub fn fill(&mut self, now: SystemTime, symbol_count: u32) -> Result<bool, LeakyBucketError> {
        if symbol_count == 0 {
            return Err(LeakyBucketError::ZeroSymbolCount);
        }
        self.leak(now)?;

        let new_level = self.fill_level.saturating_add(u64::from(symbol_count));
        if new_level <= self.capacity {
            self.fill_level = new_level;
            return Ok(true);
        }

        match self.overfill {
            OverfillBehavior::NotPermitted => Ok(false),
            OverfillBehavior::OncePermitted => {
                if self.fill_level >= self.capacity {
                    return Ok(false);
                }
                self.fill_level = new_level;
                Ok(true)
            }
        }
    }

    /// Remove `symbol_count` symbols previously added by [`fill`](Self::fill), clamping at zero.
    ///
    /// `now` is the current time, not the time of the original fill.
    pub fn revert_fill(&mut self, now: SystemTime, symbol_count: u32) -> Result<(), LeakyBucketError> {
        if symbol_count == 0 {
            return Err(LeakyBucketError::ZeroSymbolCount);
        }
        self.leak(now)?;
        self.fill_level = self.fill_level.saturating_sub(u64::from(symbol_count));
        Ok(())
    }

    /// Change the leak rate and capacity, keeping the absolute fill level.
    ///
    /// Leakage up to `now` is accounted at the old rate.
    pub fn reconfigure(
        &mut self,
        now: SystemTime,
        leak_rate: u64,
        capacity: u64,
    ) -> Result<(), LeakyBucketError> {
        if leak_rate == 0 {
            return Err(LeakyBucketError::ZeroLeakRate);
        }
        if capacity == 0 {
            return Err(LeakyBucketError::ZeroCapacity);
        }
        self.leak(now)?;

        let (_, nanos) = split_time(self.previous_leak_time)?;
        self.leak_rate = leak_rate;
        self.capacity = capacity;
        self.previous_partial_leakage = partial_second_leakage(self.bias, leak_rate, nanos);
        Ok(())
    }

    /// Fill level the bucket would have at `now`, without modifying it.
    pub fn level_at(&self, now: SystemTime) -> Result<u64, LeakyBucketError> {
        let mut probe = self.clone();
        probe.leak(now)?;
        Ok(probe.fill_level)
    }

    /// Whether the bucket would be fully drained at `now`, without modifying it.
    pub fn is_empty_at(&self, now: SystemTime) -> Result<bool, LeakyBucketError> {
        Ok(self.level_at(now)? == 0)
    }

    pub fn fill_level(&self) -> u64 {
        self.fill_level
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Capacity not yet used as of the last leak. Zero while overfilled.
    pub fn remaining_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.fill_level)
    }

    pub fn leak_rate(&self) -> u64 {
        self.leak_rate
    }

    pub fn bias(&self) -> BiasBehavior {
        self.bias
    }

    pub fn overfill(&self) -> OverfillBehavior {
        self.overfill
    }

    pub fn previous_leak_time(&self) -> SystemTime {
        self.previous_leak_time
    }

    fn leak(&mut self, now: SystemTime) -> Result<(), LeakyBucketError> {
        if now < self.previous_leak_time {
            return Err(TimeMovedBackwardError {
                previous_time: self.previous_leak_time,
                current_time: now,
            }
            .into());
        }
        let (now_secs, now_nanos) = split_time(now)?;
        let (previous_secs, _) = split_time(self.previous_leak_time)?;

        //   previous leak                          current leak
        //        |                                      |
        //   |----*----------|----------------|----------*-----|
        //   [______________________________]              full seconds
        //   [____]                                        already leaked last time
        //                                    [__________] partial second
        let full = now_secs
            .saturating_sub(previous_secs)
            .saturating_mul(self.leak_rate);
        let partial = partial_second_leakage(self.bias, self.leak_rate, now_nanos);
        let leaked = full
            .saturating_add(partial)
            .saturating_sub(self.previous_partial_leakage);

        self.fill_level = self.fill_level.saturating_sub(leaked);
        self.previous_leak_time = now;
        self.previous_partial_leakage = partial;
        Ok(())
    }
}

fn split_time(time: SystemTime) -> Result<(u64, u32), LeakyBucketError> {
    let since_epoch = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| LeakyBucketError::TimeBeforeEpoch(time))?;
    Ok((since_epoch.as_secs(), since_epoch.subsec_nanos()))
}

fn partial_second_leakage(bias: BiasBehavior, leak_rate: u64, nanos: u32) -> u64 {
    let scaled = u128::from(nanos) * u128::from(leak_rate);
    let leaked = match bias {
        BiasBehavior::PermitMore => scaled.div_ceil(NANOS_PER_SECOND),
        BiasBehavior::PermitLess => scaled / NANOS_PER_SECOND,
    };
    // nanos < 1s, so at most one second's worth leaks
    u64::try_from(leaked).unwrap_or(leak_rate)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    fn t0() -> SystemTime {
        // 1971-08-15T00:00:00Z
        UNIX_EPOCH + Duration::from_secs(51_580_800)
    }

    fn bucket(
        leak_rate: u64,
        capacity: u64,
        bias: BiasBehavior,
        overfill: OverfillBehavior,
        start_full: bool,
    ) -> LeakyBucket {
        LeakyBucket::new(leak_rate, capacity, bias, overfill, start_full, t0()).unwrap()
    }

    #[test]
    fn test_constructor_rejects_zero_parameters() {
        let now = t0();
        assert_matches!(
            LeakyBucket::new(0, 10, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false, now),
            Err(LeakyBucketError::ZeroLeakRate)
        );
        assert_matches!(
            LeakyBucket::new(10, 0, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false, now),
            Err(LeakyBucketError::ZeroCapacity)
        );
    }

    #[test]
    fn test_bucket_capacity() {
        assert_eq!(bucket_capacity(10, Duration::from_secs(60)).unwrap(), 600);
        assert_eq!(bucket_capacity(10, Duration::from_millis(1_550)).unwrap(), 15);
        assert_matches!(
            bucket_capacity(10, Duration::from_millis(50)),
            Err(LeakyBucketError::ZeroCapacity)
        );
        assert_matches!(
            bucket_capacity(0, Duration::from_secs(60)),
            Err(LeakyBucketError::ZeroLeakRate)
        );
        assert_matches!(
            bucket_capacity(u64::MAX, Duration::from_secs(2)),
            Err(LeakyBucketError::CapacityOverflow { .. })
        );
    }

    #[test]
    fn test_start_full() {
        let full = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, true);
        assert_eq!(full.fill_level(), 100);
        assert_eq!(full.remaining_capacity(), 0);

        let empty = bucket(10, 100, BiasBehavior::PermitMore, OverfillBehavior::NotPermitted, false);
        assert_eq!(empty.fill_level(), 0);
        assert_eq!(empty.remaining_capacity(), 100);
    }

    #[test]
    fn test_overfill_once_permitted() {
        let capacity = bucket_capacity(10, Duration::from_secs(60)).unwrap();
        let mut b = bucket(10, capacity, BiasBehavior::PermitLess, OverfillBehavior::OncePermitted, false);

        assert!(b.fill(t0(), 1000).unwrap());
        assert_eq!(b.fill_level(), 1000);

        assert!(!b.fill(t0(), 1).unwrap());
        assert_eq!(b.fill_level(), 1000);

        // 400 symbols leak in 40s, leaving the bucket exactly at capacity
        assert!(!b.fill(t0() + Duration::from_secs(40), 1).unwrap());
        assert_eq!(b.fill_level(), 600);

        assert!(b.fill(t0() + Duration::from_secs(41), 1).unwrap());
        assert_eq!(b.fill_level(), 591);
    }

    #[test]
    fn test_overfill_not_permitted() {
        let mut b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false);

        assert!(!b.fill(t0(), 101).unwrap());
        assert_eq!(b.fill_level(), 0);

        assert!(b.fill(t0(), 100).unwrap());
        assert!(!b.fill(t0(), 1).unwrap());
        assert_eq!(b.fill_level(), 100);
    }

    #[test]
    fn test_zero_symbol_count() {
        let mut b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false);
        assert_matches!(b.fill(t0(), 0), Err(LeakyBucketError::ZeroSymbolCount));
        assert_matches!(b.revert_fill(t0(), 0), Err(LeakyBucketError::ZeroSymbolCount));
    }

    #[test]
    fn test_time_moved_backward_leaves_state_untouched() {
        let mut b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false);
        let later = t0() + Duration::from_secs(5);
        assert!(b.fill(later, 50).unwrap());

        let err = b.fill(t0(), 1).unwrap_err();
        assert_eq!(
            err,
            LeakyBucketError::TimeMovedBackward(TimeMovedBackwardError {
                previous_time: later,
                current_time: t0(),
            })
        );
        assert_eq!(b.fill_level(), 50);
        assert_eq!(b.previous_leak_time(), later);

        assert_matches!(
            b.revert_fill(t0(), 1),
            Err(LeakyBucketError::TimeMovedBackward(_))
        );
        assert_eq!(b.fill_level(), 50);
    }

    #[test]
    fn test_revert_fill_clamps_at_zero() {
        let mut b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false);
        assert!(b.fill(t0(), 30).unwrap());

        b.revert_fill(t0(), 20).unwrap();
        assert_eq!(b.fill_level(), 10);

        b.revert_fill(t0(), 20).unwrap();
        assert_eq!(b.fill_level(), 0);
    }

    #[test]
    fn test_partial_second_bias() {
        let quarter = t0() + Duration::from_millis(250);
        let second = t0() + Duration::from_secs(1);

        let mut more = bucket(10, 100, BiasBehavior::PermitMore, OverfillBehavior::NotPermitted, true);
        assert_eq!(more.level_at(quarter).unwrap(), 97);
        more.revert_fill(quarter, 1).unwrap();
        assert_eq!(more.fill_level(), 96);

        let mut less = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, true);
        assert_eq!(less.level_at(quarter).unwrap(), 98);
        less.revert_fill(quarter, 1).unwrap();
        assert_eq!(less.fill_level(), 97);

        // rounding evens out at the second boundary
        assert_eq!(more.level_at(second).unwrap(), 89);
        assert_eq!(less.level_at(second).unwrap(), 89);
    }

    #[test]
    fn test_leak_floors_at_zero() {
        let b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, true);
        assert_eq!(b.level_at(t0() + Duration::from_secs(9)).unwrap(), 10);
        assert!(!b.is_empty_at(t0() + Duration::from_secs(9)).unwrap());
        assert!(b.is_empty_at(t0() + Duration::from_secs(1000)).unwrap());
    }

    #[test]
    fn test_probe_does_not_mutate() {
        let b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, true);
        let later = t0() + Duration::from_secs(3);

        assert_eq!(b.level_at(later).unwrap(), 70);
        assert_eq!(b.fill_level(), 100);
        assert_eq!(b.previous_leak_time(), t0());

        // probing a future time must not make earlier real leaks fail
        assert!(b.clone().fill(t0() + Duration::from_secs(1), 1).is_ok());
    }

    #[test]
    fn test_reconfigure_preserves_absolute_level() {
        let mut b = bucket(10, 100, BiasBehavior::PermitLess, OverfillBehavior::NotPermitted, false);
        assert!(b.fill(t0(), 80).unwrap());

        let later = t0() + Duration::from_secs(2);
        b.reconfigure(later, 5, 50).unwrap();
        assert_eq!(b.fill_level(), 60);
        assert_eq!(b.capacity(), 50);
        assert_eq!(b.leak_rate(), 5);
        assert_eq!(b.remaining_capacity(), 0);

        // new rate applies from here on
        assert_eq!(b.level_at(later + Duration::from_secs(2)).unwrap(), 50);
    }

    #[test]
    fn test_reconfigure_mid_second_stays_exact() {
        let start = t0() + Duration::from_millis(300);
        let mut b = LeakyBucket::new(
            10,
            1_000,
            BiasBehavior::PermitMore,
            OverfillBehavior::NotPermitted,
            true,
            start,
        )
        .unwrap();

        let swap = start + Duration::from_millis(500);
        b.reconfigure(swap, 100, 1_000).unwrap();

        // 0.5s at 10/s, then 1s at 100/s, measured at the same sub-second offset as the swap
        let level = b.level_at(swap + Duration::from_secs(1)).unwrap();
        assert_eq!(level, 1_000 - 5 - 100);
    }

    proptest! {
        #[test]
        fn prop_whole_second_leak_is_exact(
            leak_rate in 1u64..10_000,
            offset_nanos in 0u32..1_000_000_000,
            steps in proptest::collection::vec(0u64..2_000_000_000, 0..20),
            extra_seconds in 0u64..5,
            permit_more in any::<bool>(),
        ) {
            let bias = if permit_more { BiasBehavior::PermitMore } else { BiasBehavior::PermitLess };
            let start = t0() + Duration::from_nanos(u64::from(offset_nanos));
            let elapsed_nanos: u64 = steps.iter().sum();
            let whole_seconds = elapsed_nanos.div_ceil(1_000_000_000) + extra_seconds;
            let capacity = leak_rate * (whole_seconds + 1);

            let mut b = LeakyBucket::new(leak_rate, capacity, bias, OverfillBehavior::NotPermitted, true, start)
                .unwrap();

            let mut now = start;
            for step in steps {
                now += Duration::from_nanos(step);
                // oversized fill is rejected, so only the leak is applied
                prop_assert!(!b.fill(now, u32::MAX).unwrap());
            }

            let end = start + Duration::from_secs(whole_seconds);
            prop_assert_eq!(b.level_at(end).unwrap(), capacity - leak_rate * whole_seconds);
        }

        #[test]
        fn prop_capacity_conservation(
            ops in proptest::collection::vec((any::<bool>(), 1u32..500, 0u64..3_000_000_000), 1..60),
            overfill_once in any::<bool>(),
        ) {
            let overfill = if overfill_once { OverfillBehavior::OncePermitted } else { OverfillBehavior::NotPermitted };
            let capacity = 600;
            let mut b = bucket(10, capacity, BiasBehavior::PermitMore, overfill, false);
            let mut now = t0();

            for (is_fill, symbols, step) in ops {
                now += Duration::from_nanos(step);
                let before = b.level_at(now).unwrap();
                if is_fill {
                    let accepted = b.fill(now, symbols).unwrap();
                    if accepted {
                        prop_assert_eq!(b.fill_level(), before + u64::from(symbols));
                        if b.fill_level() > capacity {
                            prop_assert!(overfill_once);
                            prop_assert!(before < capacity);
                        }
                    } else {
                        prop_assert_eq!(b.fill_level(), before);
                    }
                } else {
                    b.revert_fill(now, symbols).unwrap();
                    prop_assert_eq!(b.fill_level(), before.saturating_sub(u64::from(symbols)));
                }
                prop_assert!(b.fill_level() < capacity + 500);
            }
        }
    }
}
