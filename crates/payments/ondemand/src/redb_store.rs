//! redb-backed cumulative payment storage.
//!
//! One database holds the cumulative payment of every account. Each update runs in a
//! single write transaction, and redb admits one writer at a time, so read-check-write
//! is atomic across tasks and threads.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use blobmeter_primitives::{Address, U256};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::store::checked_add;
use crate::{CumulativePaymentStore, CumulativePaymentStoreFactory, StoreError};

/// Table definition for cumulative payments.
/// Key: 20-byte account address
/// Value: big-endian U256
const CUMULATIVE_PAYMENTS_TABLE: TableDefinition<&[u8; 20], &[u8; 32]> =
    TableDefinition::new("cumulative_payments");

/// Durable, increase-only cumulative payment database.
///
/// Servers use this so that a payment, once accepted, can never be refunded.
#[derive(Clone)]
pub struct RedbPaymentStore {
    db: Arc<Database>,
}

impl RedbPaymentStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CUMULATIVE_PAYMENTS_TABLE)?;
        }
        write_txn.commit()?;

        debug!("Opened redb cumulative payment store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Store handle scoped to one account.
    pub fn account(&self, account: Address) -> RedbAccountPaymentStore {
        RedbAccountPaymentStore {
            db: Arc::clone(&self.db),
            account,
        }
    }

    fn read(db: &Database, account: &Address) -> Result<U256, StoreError> {
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(CUMULATIVE_PAYMENTS_TABLE)?;
        Ok(table
            .get(account_key(account))?
            .map(|value| U256::from_be_bytes(*value.value()))
            .unwrap_or_default())
    }

    fn add(
        db: &Database,
        account: &Address,
        amount: U256,
        max_cumulative_payment: U256,
    ) -> Result<U256, StoreError> {
        let write_txn = db.begin_write()?;
        let new = {
            let mut table = write_txn.open_table(CUMULATIVE_PAYMENTS_TABLE)?;
            let key = account_key(account);
            let current = table
                .get(key)?
                .map(|value| U256::from_be_bytes(*value.value()))
                .unwrap_or_default();
            // an error here drops the transaction uncommitted
            let new = checked_add(current, amount, max_cumulative_payment)?;
            table.insert(key, &new.to_be_bytes::<32>())?;
            new
        };
        write_txn.commit()?;
        Ok(new)
    }
}

impl CumulativePaymentStoreFactory for RedbPaymentStore {
    fn store_for(&self, account: Address) -> Arc<dyn CumulativePaymentStore> {
        Arc::new(self.account(account))
    }
}

fn account_key(account: &Address) -> &[u8; 20] {
    &account.0.0
}

/// One account's view of a [`RedbPaymentStore`].
#[derive(Clone)]
pub struct RedbAccountPaymentStore {
    db: Arc<Database>,
    account: Address,
}

impl RedbAccountPaymentStore {
    pub fn account(&self) -> Address {
        self.account
    }
}

#[async_trait]
impl CumulativePaymentStore for RedbAccountPaymentStore {
    async fn get_cumulative_payment(&self) -> Result<U256, StoreError> {
        let db = Arc::clone(&self.db);
        let account = self.account;
        tokio::task::spawn_blocking(move || RedbPaymentStore::read(&db, &account)).await?
    }

    async fn add_cumulative_payment(
        &self,
        amount: U256,
        max_cumulative_payment: U256,
    ) -> Result<U256, StoreError> {
        let db = Arc::clone(&self.db);
        let account = self.account;
        tokio::task::spawn_blocking(move || {
            RedbPaymentStore::add(&db, &account, amount, max_cumulative_payment)
        })
        .await?
    }

    async fn subtract_cumulative_payment(&self, _amount: U256) -> Result<U256, StoreError> {
        Err(StoreError::DecreaseForbidden)
    }
}
