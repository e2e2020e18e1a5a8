//! Bounded cache of on-demand ledgers.
//!
//! Eviction is harmless here: cumulative payments live in the store, so an evicted account
//! is rebuilt from fresh vault parameters and reattached to the same store on next access.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blobmeter_primitives::{Address, QuorumId, U256};
use blobmeter_vault::{PaymentVault, StripedLocks};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::constants::*;
use crate::metrics::OnDemandCacheMetrics;
use crate::{CumulativePaymentStoreFactory, OnDemandError, OnDemandLedger, OnDemandLedgerConfig};

/// On-demand ledger cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDemandLedgerCacheConfig {
    pub max_ledgers: usize,
    /// Quorums every ledger built by the cache accepts.
    pub supported_quorums: BTreeSet<QuorumId>,
}

impl Default for OnDemandLedgerCacheConfig {
    fn default() -> Self {
        Self {
            max_ledgers: DEFAULT_MAX_LEDGERS,
            supported_quorums: DEFAULT_SUPPORTED_QUORUMS.into_iter().collect(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnDemandCacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// LRU cache of [`OnDemandLedger`]s over a shared cumulative payment store.
///
/// Vault parameters are read once when a ledger is built, never per debit.
pub struct OnDemandLedgerCache {
    config: OnDemandLedgerCacheConfig,
    vault: Arc<dyn PaymentVault>,
    stores: Arc<dyn CumulativePaymentStoreFactory>,
    ledgers: Mutex<LruCache<Address, Arc<OnDemandLedger>>>,
    creation_locks: StripedLocks,
    counters: CacheCounters,
    metrics: OnDemandCacheMetrics,
}

impl OnDemandLedgerCache {
    /// Create an empty cache. A zero capacity is raised to one.
    pub fn new(
        mut config: OnDemandLedgerCacheConfig,
        vault: Arc<dyn PaymentVault>,
        stores: Arc<dyn CumulativePaymentStoreFactory>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.max_ledgers).unwrap_or(NonZeroUsize::MIN);
        config.max_ledgers = capacity.get();

        Self {
            config,
            vault,
            stores,
            ledgers: Mutex::new(LruCache::new(capacity)),
            creation_locks: StripedLocks::new(CREATION_LOCK_STRIPES),
            counters: CacheCounters::default(),
            metrics: OnDemandCacheMetrics::default(),
        }
    }

    /// The ledger for `account`, building it from vault state on a miss.
    pub async fn get_or_create(&self, account: Address) -> Result<Arc<OnDemandLedger>, OnDemandError> {
        if let Some(ledger) = self.lookup(&account) {
            return Ok(ledger);
        }

        let _guard = self.creation_locks.stripe(&account).lock().await;
        // built by another task while this one waited
        if let Some(ledger) = self.ledgers.lock().get(&account).cloned() {
            return Ok(ledger);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let total_deposits = self.vault.total_deposit(account).await?;
        let price_per_symbol = self.vault.price_per_symbol().await?;
        let min_num_symbols = self.vault.min_num_symbols().await?;

        let config = OnDemandLedgerConfig::new(total_deposits, price_per_symbol, min_num_symbols)
            .with_supported_quorums(self.config.supported_quorums.iter().copied());
        let ledger =
            Arc::new(OnDemandLedger::from_store(config, self.stores.store_for(account)).await?);

        self.insert(account, Arc::clone(&ledger));
        debug!(%account, %total_deposits, "created on-demand ledger");
        Ok(ledger)
    }

    /// The cached ledger for `account`, without building one or touching recency.
    pub fn get(&self, account: &Address) -> Option<Arc<OnDemandLedger>> {
        self.ledgers.lock().peek(account).cloned()
    }

    /// Accounts with a cached ledger.
    pub fn accounts_to_update(&self) -> Vec<Address> {
        self.ledgers.lock().iter().map(|(account, _)| *account).collect()
    }

    /// Apply a deposit fetched from the vault. Accounts without a cached ledger are ignored.
    pub fn update_total_deposits(&self, account: Address, total_deposits: U256) {
        if let Some(ledger) = self.get(&account) {
            ledger.update_total_deposits(total_deposits);
        }
    }

    pub fn len(&self) -> usize {
        self.ledgers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &OnDemandLedgerCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> OnDemandCacheStats {
        let ledgers = self.ledgers.lock();
        OnDemandCacheStats {
            size: ledgers.len(),
            capacity: ledgers.cap().get(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, account: &Address) -> Option<Arc<OnDemandLedger>> {
        let ledger = self.ledgers.lock().get(account).cloned();
        if ledger.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        ledger
    }

    fn insert(&self, account: Address, ledger: Arc<OnDemandLedger>) {
        let mut ledgers = self.ledgers.lock();
        if let Some((evicted, _)) = ledgers.push(account, ledger)
            && evicted != account
        {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            self.metrics.evictions_total.increment(1);
            debug!(account = %evicted, "evicted on-demand ledger");
        }
        self.metrics.size.set(ledgers.len() as f64);
    }
}
