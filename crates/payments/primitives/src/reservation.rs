//! Reservation parameters.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::QuorumId;

/// Invalid reservation parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("symbols per second must be > 0")]
    ZeroSymbolsPerSecond,

    #[error("reservation start {start:?} must be before end {end:?}")]
    InvalidTimeRange { start: SystemTime, end: SystemTime },

    #[error("reservation must permit at least one quorum")]
    NoPermittedQuorums,
}

/// A pre-purchased throughput allowance.
///
/// Immutable once built. Updates replace the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    symbols_per_second: u64,
    start_time: SystemTime,
    end_time: SystemTime,
    permitted_quorums: BTreeSet<QuorumId>,
}

impl Reservation {
    /// Create a validated reservation.
    pub fn new(
        symbols_per_second: u64,
        start_time: SystemTime,
        end_time: SystemTime,
        permitted_quorums: impl IntoIterator<Item = QuorumId>,
    ) -> Result<Self, ReservationError> {
        if symbols_per_second == 0 {
            return Err(ReservationError::ZeroSymbolsPerSecond);
        }
        if start_time >= end_time {
            return Err(ReservationError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            });
        }
        let permitted_quorums: BTreeSet<_> = permitted_quorums.into_iter().collect();
        if permitted_quorums.is_empty() {
            return Err(ReservationError::NoPermittedQuorums);
        }

        Ok(Self {
            symbols_per_second,
            start_time,
            end_time,
            permitted_quorums,
        })
    }

    pub fn symbols_per_second(&self) -> u64 {
        self.symbols_per_second
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }

    pub fn permitted_quorums(&self) -> &BTreeSet<QuorumId> {
        &self.permitted_quorums
    }

    /// Quorums in `requested` that this reservation does not cover.
    pub fn unpermitted_quorums(&self, requested: &[QuorumId]) -> Vec<QuorumId> {
        requested
            .iter()
            .copied()
            .filter(|q| !self.permitted_quorums.contains(q))
            .collect()
    }

    /// Whether `time` lies within `[start_time, end_time]`.
    pub fn is_active_at(&self, time: SystemTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// Reservation as stored on chain: whole-second Unix timestamps and a quorum byte list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationData {
    pub symbols_per_second: u64,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub quorum_numbers: Vec<QuorumId>,
}

impl TryFrom<ReservationData> for Reservation {
    type Error = ReservationError;

    fn try_from(data: ReservationData) -> Result<Self, Self::Error> {
        Reservation::new(
            data.symbols_per_second,
            UNIX_EPOCH + Duration::from_secs(data.start_timestamp),
            UNIX_EPOCH + Duration::from_secs(data.end_timestamp),
            data.quorum_numbers,
        )
    }
}
