//! Leaky bucket error types.

use std::time::{Duration, SystemTime};

/// The caller supplied a time earlier than the bucket's previous leak.
///
/// Usually caused by wall-clock adjustments. Retrying with a fresh time is expected to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("time moved backward: previous leak at {previous_time:?}, current time {current_time:?}")]
pub struct TimeMovedBackwardError {
    pub previous_time: SystemTime,
    pub current_time: SystemTime,
}

/// Errors that can occur while operating a [`LeakyBucket`](crate::LeakyBucket).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeakyBucketError {
    #[error(transparent)]
    TimeMovedBackward(#[from] TimeMovedBackwardError),

    #[error("symbol count must be > 0")]
    ZeroSymbolCount,

    #[error("leak rate must be > 0")]
    ZeroLeakRate,

    #[error("bucket capacity must be > 0")]
    ZeroCapacity,

    #[error("bucket capacity for leak rate {leak_rate} over {duration:?} overflows")]
    CapacityOverflow { leak_rate: u64, duration: Duration },

    #[error("time {0:?} is before the unix epoch")]
    TimeBeforeEpoch(SystemTime),
}
