//! Background vault polling.
//!
//! A monitor never creates ledgers. Each round it asks its target which accounts are
//! currently held, fetches fresh parameters for exactly those, and pushes them back
//! through the target's update methods.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobmeter_primitives::Address;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL};
use crate::metrics::VaultMonitorMetrics;
use crate::VaultError;

/// Polling configuration for a [`VaultMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between refresh rounds. Also bounds how long one round may take.
    pub update_interval: Duration,
    /// Accounts per vault call. Zero fetches every account in a single call.
    pub max_batch_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl MonitorConfig {
    pub fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            ..Default::default()
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }
}

/// A ledger family kept in sync by a [`VaultMonitor`].
#[async_trait]
pub trait MonitorTarget: Send + Sync + 'static {
    /// Family name used in logs and metric labels.
    const FAMILY: &'static str;

    /// Accounts whose ledgers are currently held.
    fn accounts_to_update(&self) -> Vec<Address>;

    /// Fetch fresh parameters for `accounts` and apply them.
    ///
    /// Returns the number of accounts whose update failed. Per-account failures are logged by
    /// the implementation and do not fail the batch.
    async fn refresh(&self, accounts: &[Address]) -> Result<usize, VaultError>;
}

/// Outcome of one refresh round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Accounts considered this round.
    pub accounts: usize,
    /// Accounts updated successfully.
    pub updated: usize,
    /// Accounts whose update was rejected.
    pub failed_updates: usize,
    /// Vault calls that failed outright.
    pub failed_batches: usize,
}

/// Run a single refresh round against `target`.
pub async fn refresh_round<T: MonitorTarget>(target: &T, max_batch_size: usize) -> RefreshSummary {
    let accounts = target.accounts_to_update();
    let mut summary = RefreshSummary {
        accounts: accounts.len(),
        ..Default::default()
    };
    if accounts.is_empty() {
        return summary;
    }

    let batch_size = if max_batch_size == 0 {
        accounts.len()
    } else {
        max_batch_size
    };
    for batch in accounts.chunks(batch_size) {
        match target.refresh(batch).await {
            Ok(failed) => {
                summary.failed_updates += failed;
                summary.updated += batch.len().saturating_sub(failed);
            }
            Err(error) => {
                warn!(family = T::FAMILY, %error, batch = batch.len(), "vault fetch failed");
                summary.failed_batches += 1;
            }
        }
    }
    summary
}

/// Handle to a background task refreshing a [`MonitorTarget`] from the vault.
///
/// The task stops when the parent cancellation token fires, when [`stop`](Self::stop) is
/// called, or when the handle is dropped.
#[derive(Debug)]
pub struct VaultMonitor<T> {
    target: Arc<T>,
    config: MonitorConfig,
    metrics: VaultMonitorMetrics,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<T: MonitorTarget> VaultMonitor<T> {
    /// Spawn the monitor onto the current tokio runtime.
    pub fn spawn(target: Arc<T>, config: MonitorConfig, shutdown: &CancellationToken) -> Self {
        let cancel = shutdown.child_token();
        let metrics = VaultMonitorMetrics::new(T::FAMILY);
        let handle = tokio::spawn(run(
            Arc::clone(&target),
            config,
            metrics.clone(),
            cancel.clone(),
        ));

        Self {
            target,
            config,
            metrics,
            cancel,
            handle: Some(handle),
        }
    }

    /// Refresh immediately, outside the regular schedule.
    pub async fn refresh(&self) -> RefreshSummary {
        let summary = refresh_round(&*self.target, self.config.max_batch_size).await;
        record(T::FAMILY, &self.metrics, &summary);
        summary
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Whether the background task has exited.
    pub fn is_stopped(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Signal the background task to stop without waiting for it.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop the background task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(error) = handle.await
        {
            warn!(family = T::FAMILY, %error, "vault monitor task failed");
        }
    }
}

impl<T> Drop for VaultMonitor<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T: MonitorTarget>(
    target: Arc<T>,
    config: MonitorConfig,
    metrics: VaultMonitorMetrics,
    cancel: CancellationToken,
) {
    // interval panics on a zero period
    let period = config.update_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(family = T::FAMILY, interval = ?period, "vault monitor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = timeout(period, refresh_round(&*target, config.max_batch_size)) => {
                        match result {
                            Ok(summary) => record(T::FAMILY, &metrics, &summary),
                            Err(_) => {
                                metrics.refresh_failures_total.increment(1);
                                warn!(family = T::FAMILY, timeout = ?period, "vault refresh timed out");
                            }
                        }
                    }
                }
            }
        }
    }

    info!(family = T::FAMILY, "vault monitor stopped");
}

fn record(family: &'static str, metrics: &VaultMonitorMetrics, summary: &RefreshSummary) {
    metrics.refreshes_total.increment(1);
    if summary.failed_batches > 0 {
        metrics.refresh_failures_total.increment(1);
    }
    metrics
        .account_update_failures_total
        .increment(summary.failed_updates as u64);
    debug!(
        family,
        accounts = summary.accounts,
        updated = summary.updated,
        failed_updates = summary.failed_updates,
        failed_batches = summary.failed_batches,
        "vault refresh complete"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingTarget {
        accounts: Vec<Address>,
        batches: Mutex<Vec<Vec<Address>>>,
        fail_batch: Option<usize>,
        stall: bool,
        started: AtomicUsize,
    }

    #[async_trait]
    impl MonitorTarget for RecordingTarget {
        const FAMILY: &'static str = "test";

        fn accounts_to_update(&self) -> Vec<Address> {
            self.accounts.clone()
        }

        async fn refresh(&self, accounts: &[Address]) -> Result<usize, VaultError> {
            let index = self.started.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            self.batches.lock().push(accounts.to_vec());
            if self.fail_batch == Some(index) {
                return Err(VaultError::Request("boom".into()));
            }
            Ok(0)
        }
    }

    fn accounts(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address::repeat_byte(i)).collect()
    }

    #[tokio::test]
    async fn test_refresh_round_batches() {
        let target = RecordingTarget {
            accounts: accounts(5),
            ..Default::default()
        };

        let summary = refresh_round(&target, 2).await;
        assert_eq!(summary.accounts, 5);
        assert_eq!(summary.updated, 5);

        let sizes: Vec<_> = target.batches.lock().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_refresh_round_unbounded_batch() {
        let target = RecordingTarget {
            accounts: accounts(5),
            ..Default::default()
        };

        refresh_round(&target, 0).await;
        assert_eq!(target.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_round_continues_after_failed_batch() {
        let target = RecordingTarget {
            accounts: accounts(4),
            fail_batch: Some(0),
            ..Default::default()
        };

        let summary = refresh_round(&target, 2).await;
        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.updated, 2);
        assert_eq!(target.batches.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_round_skips_empty() {
        let target = RecordingTarget::default();

        let summary = refresh_round(&target, 2).await;
        assert_eq!(summary, RefreshSummary::default());
        assert_eq!(target.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_ticks_on_interval() {
        let target = Arc::new(RecordingTarget {
            accounts: accounts(1),
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let monitor = VaultMonitor::spawn(
            Arc::clone(&target),
            MonitorConfig::new(Duration::from_secs(30)),
            &shutdown,
        );

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(target.started.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(target.started.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(target.started.load(Ordering::SeqCst), 3);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_refresh_times_out() {
        let target = Arc::new(RecordingTarget {
            accounts: accounts(1),
            stall: true,
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let monitor = VaultMonitor::spawn(
            Arc::clone(&target),
            MonitorConfig::new(Duration::from_secs(10)),
            &shutdown,
        );

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(target.started.load(Ordering::SeqCst) >= 2);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_monitor() {
        let target = Arc::new(RecordingTarget::default());
        let shutdown = CancellationToken::new();
        let monitor = VaultMonitor::spawn(target, MonitorConfig::default(), &shutdown);

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(monitor.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh() {
        let target = Arc::new(RecordingTarget {
            accounts: accounts(3),
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let monitor = VaultMonitor::spawn(
            Arc::clone(&target),
            MonitorConfig::default().with_max_batch_size(0),
            &shutdown,
        );

        let summary = monitor.refresh().await;
        assert_eq!(summary.updated, 3);
        assert_eq!(target.batches.lock().len(), 1);
    }
}
