//! Payment header attached to dispersal requests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::{SolValue, sol};
use serde::{Deserialize, Serialize};

sol! {
    /// ABI layout hashed for request signing.
    struct PaymentHeader {
        string accountId;
        int64 timestamp;
        uint256 cumulativePayment;
    }
}

/// How a single dispersal was paid for.
///
/// `cumulative_payment` is the only discriminator between mechanisms: `None` means the
/// dispersal was covered by a reservation, `Some` carries the account's new cumulative
/// on-demand payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub account_id: Address,
    /// Dispersal time in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub cumulative_payment: Option<U256>,
}

impl PaymentMetadata {
    pub fn new(account_id: Address, timestamp: i64, cumulative_payment: Option<U256>) -> Self {
        Self {
            account_id,
            timestamp,
            cumulative_payment,
        }
    }

    /// Whether this dispersal was paid on demand.
    pub fn is_on_demand(&self) -> bool {
        self.cumulative_payment.is_some()
    }

    /// Dispersal time as a [`SystemTime`]. Negative timestamps clamp to the epoch.
    pub fn dispersal_time(&self) -> SystemTime {
        let nanos = u64::try_from(self.timestamp).unwrap_or(0);
        UNIX_EPOCH + Duration::from_nanos(nanos)
    }

    /// Keccak-256 of the ABI-encoded header. A reservation payment hashes with a zero amount.
    pub fn hash(&self) -> B256 {
        let header = PaymentHeader {
            accountId: self.account_id.to_checksum(None),
            timestamp: self.timestamp,
            cumulativePayment: self.cumulative_payment.unwrap_or_default(),
        };
        keccak256(header.abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    const ACCOUNT: Address = address!("1234567890123456789012345678901234567890");

    #[test]
    fn test_mechanism_discriminator() {
        let reservation = PaymentMetadata::new(ACCOUNT, 1, None);
        let on_demand = PaymentMetadata::new(ACCOUNT, 1, Some(U256::ZERO));

        assert!(!reservation.is_on_demand());
        assert!(on_demand.is_on_demand());
    }

    #[test]
    fn test_serde_preserves_mechanism() {
        for metadata in [
            PaymentMetadata::new(ACCOUNT, 42, None),
            PaymentMetadata::new(ACCOUNT, 42, Some(U256::from(1000u64))),
        ] {
            let bytes = postcard::to_allocvec(&metadata).unwrap();
            let decoded: PaymentMetadata = postcard::from_bytes(&bytes).unwrap();
            assert_eq!(decoded, metadata);
            assert_eq!(decoded.is_on_demand(), metadata.is_on_demand());
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_binds_fields() {
        let a = PaymentMetadata::new(ACCOUNT, 42, Some(U256::from(1000u64)));
        let b = a.clone();
        assert_eq!(a.hash(), b.hash());

        let later = PaymentMetadata::new(ACCOUNT, 43, Some(U256::from(1000u64)));
        assert_ne!(a.hash(), later.hash());

        let more = PaymentMetadata::new(ACCOUNT, 42, Some(U256::from(1001u64)));
        assert_ne!(a.hash(), more.hash());
    }

    #[test]
    fn test_dispersal_time() {
        let metadata = PaymentMetadata::new(ACCOUNT, 2_500_000_000, None);
        assert_eq!(
            metadata.dispersal_time(),
            UNIX_EPOCH + Duration::from_millis(2_500)
        );

        let negative = PaymentMetadata::new(ACCOUNT, -5, None);
        assert_eq!(negative.dispersal_time(), UNIX_EPOCH);
    }
}
