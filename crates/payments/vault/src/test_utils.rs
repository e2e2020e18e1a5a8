//! In-memory payment vault for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use blobmeter_primitives::{Address, ReservationData, U256};
use parking_lot::Mutex;

use crate::{PaymentVault, VaultError};

#[derive(Debug)]
struct VaultState {
    deposits: HashMap<Address, U256>,
    reservations: HashMap<Address, ReservationData>,
    global_symbols_per_second: u64,
    min_num_symbols: u32,
    price_per_symbol: u64,
    failure: Option<String>,
    calls: usize,
}

impl Default for VaultState {
    fn default() -> Self {
        Self {
            deposits: HashMap::new(),
            reservations: HashMap::new(),
            global_symbols_per_second: 1024,
            min_num_symbols: 1,
            price_per_symbol: 1,
            failure: None,
            calls: 0,
        }
    }
}

/// [`PaymentVault`] backed by in-memory maps, with switchable failure injection.
#[derive(Debug, Default)]
pub struct TestPaymentVault {
    state: Mutex<VaultState>,
}

impl TestPaymentVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total_deposit(&self, account: Address, amount: U256) {
        self.state.lock().deposits.insert(account, amount);
    }

    pub fn set_reservation(&self, account: Address, reservation: Option<ReservationData>) {
        let mut state = self.state.lock();
        match reservation {
            Some(reservation) => state.reservations.insert(account, reservation),
            None => state.reservations.remove(&account),
        };
    }

    pub fn set_price_per_symbol(&self, price: u64) {
        self.state.lock().price_per_symbol = price;
    }

    pub fn set_min_num_symbols(&self, min: u32) {
        self.state.lock().min_num_symbols = min;
    }

    pub fn set_global_symbols_per_second(&self, rate: u64) {
        self.state.lock().global_symbols_per_second = rate;
    }

    /// Make every subsequent call fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        self.state.lock().failure = message.map(str::to_owned);
    }

    /// Number of vault calls made so far.
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    fn with_state<R>(&self, f: impl FnOnce(&VaultState) -> R) -> Result<R, VaultError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(message) = &state.failure {
            return Err(VaultError::Request(message.clone()));
        }
        Ok(f(&state))
    }
}

#[async_trait]
impl PaymentVault for TestPaymentVault {
    async fn total_deposit(&self, account: Address) -> Result<U256, VaultError> {
        self.with_state(|s| s.deposits.get(&account).copied().unwrap_or_default())
    }

    async fn total_deposits(&self, accounts: &[Address]) -> Result<Vec<U256>, VaultError> {
        self.with_state(|s| {
            accounts
                .iter()
                .map(|a| s.deposits.get(a).copied().unwrap_or_default())
                .collect()
        })
    }

    async fn reservation(&self, account: Address) -> Result<Option<ReservationData>, VaultError> {
        self.with_state(|s| s.reservations.get(&account).cloned())
    }

    async fn reservations(
        &self,
        accounts: &[Address],
    ) -> Result<Vec<Option<ReservationData>>, VaultError> {
        self.with_state(|s| accounts.iter().map(|a| s.reservations.get(a).cloned()).collect())
    }

    async fn global_symbols_per_second(&self) -> Result<u64, VaultError> {
        self.with_state(|s| s.global_symbols_per_second)
    }

    async fn min_num_symbols(&self) -> Result<u32, VaultError> {
        self.with_state(|s| s.min_num_symbols)
    }

    async fn price_per_symbol(&self) -> Result<u64, VaultError> {
        self.with_state(|s| s.price_per_symbol)
    }
}
