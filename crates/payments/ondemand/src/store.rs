//! Cumulative payment stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use blobmeter_primitives::{Address, U256};
use parking_lot::Mutex;

use crate::{InsufficientFundsError, StoreError};

/// One account's cumulative on-demand payment.
///
/// `add_cumulative_payment` is a single atomic conditional update: two concurrent adds can
/// never both pass the bound check.
#[async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait CumulativePaymentStore: Send + Sync {
    /// Current cumulative payment, zero if none was recorded.
    async fn get_cumulative_payment(&self) -> Result<U256, StoreError>;

    /// Add `amount`, failing with [`StoreError::InsufficientFunds`] if the result would exceed
    /// `max_cumulative_payment`. Returns the new cumulative payment.
    async fn add_cumulative_payment(
        &self,
        amount: U256,
        max_cumulative_payment: U256,
    ) -> Result<U256, StoreError>;

    /// Subtract `amount`, clamping at zero. Returns the new cumulative payment.
    ///
    /// Durable stores reject this with [`StoreError::DecreaseForbidden`].
    async fn subtract_cumulative_payment(&self, amount: U256) -> Result<U256, StoreError>;
}

/// Hands out the store for each account.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait CumulativePaymentStoreFactory: Send + Sync {
    fn store_for(&self, account: Address) -> Arc<dyn CumulativePaymentStore>;
}

/// Bounded add shared by every store implementation.
pub(crate) fn checked_add(
    current: U256,
    amount: U256,
    max_cumulative_payment: U256,
) -> Result<U256, StoreError> {
    match current.checked_add(amount) {
        Some(new) if new <= max_cumulative_payment => Ok(new),
        _ => Err(InsufficientFundsError {
            current_cumulative_payment: current,
            total_deposits: max_cumulative_payment,
            blob_cost: amount,
        }
        .into()),
    }
}

/// In-memory store that supports decrements. Used by clients, who must be able to give
/// back exactly what a failed dispersal reserved.
#[derive(Debug, Default)]
pub struct InMemoryCumulativePaymentStore {
    value: Mutex<U256>,
}

impl InMemoryCumulativePaymentStore {
    pub fn new(initial: U256) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl CumulativePaymentStore for InMemoryCumulativePaymentStore {
    async fn get_cumulative_payment(&self) -> Result<U256, StoreError> {
        Ok(*self.value.lock())
    }

    async fn add_cumulative_payment(
        &self,
        amount: U256,
        max_cumulative_payment: U256,
    ) -> Result<U256, StoreError> {
        let mut value = self.value.lock();
        *value = checked_add(*value, amount, max_cumulative_payment)?;
        Ok(*value)
    }

    async fn subtract_cumulative_payment(&self, amount: U256) -> Result<U256, StoreError> {
        let mut value = self.value.lock();
        *value = value.saturating_sub(amount);
        Ok(*value)
    }
}

/// Keeps one [`InMemoryCumulativePaymentStore`] per account for the factory's lifetime.
#[derive(Debug, Default)]
pub struct InMemoryStoreFactory {
    stores: Mutex<HashMap<Address, Arc<InMemoryCumulativePaymentStore>>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CumulativePaymentStoreFactory for InMemoryStoreFactory {
    fn store_for(&self, account: Address) -> Arc<dyn CumulativePaymentStore> {
        self.stores.lock().entry(account).or_default().clone()
    }
}
