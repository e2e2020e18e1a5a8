//! Bounded cache of reservation ledgers.
//!
//! Evicting a ledger whose bucket still holds symbols throws away rate-limiting state: the
//! next ledger built for that account starts empty and under-bills. The cache therefore
//! checks the least recently used ledger before evicting it, and grows instead when that
//! bucket has not drained.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use blobmeter_primitives::{Address, Clock, Reservation};
use blobmeter_ratelimit::{BiasBehavior, OverfillBehavior};
use blobmeter_vault::{PaymentVault, StripedLocks, VaultError};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::constants::*;
use crate::metrics::ReservationCacheMetrics;
use crate::{ReservationLedger, ReservationLedgerConfig, ReservationLedgerError};

/// Reservation ledger cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLedgerCacheConfig {
    /// Initial capacity.
    pub max_ledgers: usize,
    /// Capacity never grows past this.
    pub max_ledgers_ceiling: usize,
    /// Bucket capacity period for every ledger built by the cache.
    pub bucket_capacity_period: Duration,
    pub overfill: OverfillBehavior,
    pub bias: BiasBehavior,
    /// Whether new ledgers start with a full bucket.
    pub start_full: bool,
}

impl Default for ReservationLedgerCacheConfig {
    fn default() -> Self {
        Self {
            max_ledgers: DEFAULT_MAX_LEDGERS,
            max_ledgers_ceiling: DEFAULT_MAX_LEDGERS_CEILING,
            bucket_capacity_period: DEFAULT_BUCKET_CAPACITY_PERIOD,
            overfill: DEFAULT_OVERFILL_BEHAVIOR,
            bias: DEFAULT_SERVER_BIAS,
            start_full: false,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationCacheStats {
    /// Ledgers currently cached.
    pub size: usize,
    /// Current capacity.
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Ledgers removed to make room.
    pub evictions: u64,
    /// Times the eviction candidate still had symbols in its bucket.
    pub premature_evictions: u64,
    /// Times the capacity was increased.
    pub resizes: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    premature_evictions: AtomicU64,
    resizes: AtomicU64,
}

/// LRU cache of [`ReservationLedger`]s, built lazily from the payment vault.
///
/// Construction is serialized per account so concurrent misses build one ledger. Debits
/// on a cached ledger only take that ledger's own lock.
pub struct ReservationLedgerCache {
    config: ReservationLedgerCacheConfig,
    vault: Arc<dyn PaymentVault>,
    clock: Arc<dyn Clock>,
    ledgers: Mutex<LruCache<Address, Arc<ReservationLedger>>>,
    creation_locks: StripedLocks,
    counters: CacheCounters,
    metrics: ReservationCacheMetrics,
}

impl ReservationLedgerCache {
    /// Create an empty cache. A zero capacity is raised to one, and the ceiling is raised
    /// to at least the initial capacity.
    pub fn new(
        mut config: ReservationLedgerCacheConfig,
        vault: Arc<dyn PaymentVault>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.max_ledgers).unwrap_or(NonZeroUsize::MIN);
        config.max_ledgers = capacity.get();
        config.max_ledgers_ceiling = config.max_ledgers_ceiling.max(capacity.get());

        let metrics = ReservationCacheMetrics::default();
        metrics.capacity.set(capacity.get() as f64);

        Self {
            config,
            vault,
            clock,
            ledgers: Mutex::new(LruCache::new(capacity)),
            creation_locks: StripedLocks::new(CREATION_LOCK_STRIPES),
            counters: CacheCounters::default(),
            metrics,
        }
    }

    /// The ledger for `account`, building it from vault state on a miss.
    pub async fn get_or_create(
        &self,
        account: Address,
    ) -> Result<Arc<ReservationLedger>, ReservationLedgerError> {
        if let Some(ledger) = self.lookup(&account) {
            return Ok(ledger);
        }

        let _guard = self.creation_locks.stripe(&account).lock().await;
        // built by another task while this one waited
        if let Some(ledger) = self.ledgers.lock().get(&account).cloned() {
            return Ok(ledger);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let data = self
            .vault
            .reservation(account)
            .await?
            .ok_or(ReservationLedgerError::ReservationNotFound(account))?;
        let reservation = Reservation::try_from(data)
            .map_err(|source| VaultError::InvalidReservation { account, source })?;
        let min_num_symbols = self.vault.min_num_symbols().await?;

        let config = ReservationLedgerConfig::new(
            reservation,
            min_num_symbols,
            self.config.start_full,
            self.config.overfill,
            self.config.bucket_capacity_period,
        )?
        .with_bias(self.config.bias);
        let ledger = Arc::new(ReservationLedger::new(config, self.clock.now())?);

        self.insert(account, Arc::clone(&ledger));
        debug!(%account, "created reservation ledger");
        Ok(ledger)
    }

    /// The cached ledger for `account`, without building one or touching recency.
    pub fn get(&self, account: &Address) -> Option<Arc<ReservationLedger>> {
        self.ledgers.lock().peek(account).cloned()
    }

    /// Accounts with a cached ledger.
    pub fn accounts_to_update(&self) -> Vec<Address> {
        self.ledgers.lock().iter().map(|(account, _)| *account).collect()
    }

    /// Apply a reservation fetched from the vault.
    ///
    /// Accounts without a cached ledger are ignored. `None` means the vault no longer
    /// reports a reservation: the ledger is revoked but stays cached with its bucket, and
    /// leaves the cache only through eviction. Takes the account's creation lock, so an
    /// update never races a ledger being built from older vault state.
    pub async fn update_reservation(
        &self,
        account: Address,
        reservation: Option<Reservation>,
    ) -> Result<(), ReservationLedgerError> {
        let _guard = self.creation_locks.stripe(&account).lock().await;
        let Some(ledger) = self.get(&account) else {
            return Ok(());
        };

        match reservation {
            Some(reservation) => ledger.update_reservation(reservation, self.clock.now()),
            None => {
                if !ledger.is_revoked() {
                    ledger.revoke();
                    info!(%account, "reservation removed from vault, revoked ledger");
                }
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ledgers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity, including any growth.
    pub fn capacity(&self) -> usize {
        self.ledgers.lock().cap().get()
    }

    pub fn config(&self) -> &ReservationLedgerCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> ReservationCacheStats {
        let ledgers = self.ledgers.lock();
        ReservationCacheStats {
            size: ledgers.len(),
            capacity: ledgers.cap().get(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            premature_evictions: self.counters.premature_evictions.load(Ordering::Relaxed),
            resizes: self.counters.resizes.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, account: &Address) -> Option<Arc<ReservationLedger>> {
        let ledger = self.ledgers.lock().get(account).cloned();
        if ledger.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        ledger
    }

    fn insert(&self, account: Address, ledger: Arc<ReservationLedger>) {
        let mut ledgers = self.ledgers.lock();
        if ledgers.len() >= ledgers.cap().get() && !ledgers.contains(&account) {
            self.make_room(&mut ledgers);
        }
        ledgers.put(account, ledger);

        self.metrics.size.set(ledgers.len() as f64);
        self.metrics.capacity.set(ledgers.cap().get() as f64);
    }

    /// Free one slot, either by evicting a drained ledger or by growing the cache.
    fn make_room(&self, ledgers: &mut LruCache<Address, Arc<ReservationLedger>>) {
        let Some((victim, candidate)) = ledgers.peek_lru() else {
            return;
        };
        let victim = *victim;
        // a probe that fails on clock regression counts as unsettled
        let drained = candidate.is_bucket_empty(self.clock.now()).unwrap_or(false);

        if drained {
            ledgers.pop_lru();
            self.record_eviction();
            debug!(account = %victim, "evicted reservation ledger");
            return;
        }

        self.counters.premature_evictions.fetch_add(1, Ordering::Relaxed);
        self.metrics.premature_evictions_total.increment(1);

        let capacity = ledgers.cap().get();
        let ceiling = self.config.max_ledgers_ceiling;
        if capacity < ceiling {
            let grown = capacity.saturating_mul(2).min(ceiling);
            if let Some(grown) = NonZeroUsize::new(grown) {
                ledgers.resize(grown);
            }
            self.counters.resizes.fetch_add(1, Ordering::Relaxed);
            self.metrics.resizes_total.increment(1);
            error!(
                account = %victim,
                old_capacity = capacity,
                new_capacity = grown,
                "reservation ledger with unsettled bucket would be evicted, growing cache"
            );
        } else {
            ledgers.pop_lru();
            self.record_eviction();
            error!(
                account = %victim,
                capacity,
                "reservation cache at ceiling, evicted ledger with unsettled bucket"
            );
        }
    }

    fn record_eviction(&self) {
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        self.metrics.evictions_total.increment(1);
    }
}
