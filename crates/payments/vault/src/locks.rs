//! Striped per-account locks.

use std::hash::{BuildHasher, RandomState};

use blobmeter_primitives::Address;
use tokio::sync::Mutex;

/// Fixed pool of async mutexes, one picked per account.
///
/// Serializes slow per-account work such as ledger construction without a single global
/// lock. Distinct accounts may share a stripe.
#[derive(Debug)]
pub struct StripedLocks {
    stripes: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl StripedLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    /// The lock guarding `account`.
    #[allow(clippy::indexing_slicing)] // index < len
    pub fn stripe(&self, account: &Address) -> &Mutex<()> {
        let index = self.hasher.hash_one(account) as usize % self.stripes.len();
        &self.stripes[index]
    }

    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }
}
