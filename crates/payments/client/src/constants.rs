//! Client ledger defaults.

use std::time::Duration;

use crate::ClientLedgerMode;

/// Size of one symbol on the wire.
pub const BYTES_PER_SYMBOL: u64 = 32;

pub const DEFAULT_CLIENT_LEDGER_MODE: ClientLedgerMode = ClientLedgerMode::ReservationAndOnDemand;

/// How often a client refreshes its reservation and deposit from the vault.
pub const DEFAULT_VAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Client buckets are smaller than server buckets so a client never outruns the server's view.
pub const DEFAULT_CLIENT_BUCKET_CAPACITY_PERIOD: Duration = Duration::from_secs(60);
