//! Vault monitor defaults.

use std::time::Duration;

/// Default polling interval for vault monitors.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of accounts fetched per vault call. Zero fetches all accounts in one call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;
