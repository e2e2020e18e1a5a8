//! Reservation accounting defaults.

use std::time::Duration;

use blobmeter_ratelimit::{BiasBehavior, OverfillBehavior};

/// Initial number of ledgers held by a server-side cache.
pub const DEFAULT_MAX_LEDGERS: usize = 1024;

/// Hard limit the cache may grow to when it would otherwise drop unsettled buckets.
pub const DEFAULT_MAX_LEDGERS_CEILING: usize = 65_536;

/// Bucket capacity period used by servers.
pub const DEFAULT_BUCKET_CAPACITY_PERIOD: Duration = Duration::from_secs(120);

/// Overfill policy used by servers and clients alike.
pub const DEFAULT_OVERFILL_BEHAVIOR: OverfillBehavior = OverfillBehavior::OncePermitted;

/// Servers round leakage in the account's favour.
pub const DEFAULT_SERVER_BIAS: BiasBehavior = BiasBehavior::PermitMore;

/// Clients round leakage against themselves so they never outrun the server.
pub const DEFAULT_CLIENT_BIAS: BiasBehavior = BiasBehavior::PermitLess;

/// Stripes used to serialize ledger construction.
pub(crate) const CREATION_LOCK_STRIPES: usize = 64;
