//! On-demand accounting defaults.

use blobmeter_primitives::QuorumId;

/// Number of on-demand ledgers kept in memory by a server-side cache.
pub const DEFAULT_MAX_LEDGERS: usize = 1024;

/// Quorums on-demand payments may target unless configured otherwise.
pub const DEFAULT_SUPPORTED_QUORUMS: [QuorumId; 2] = [0, 1];

/// Stripes used to serialize ledger construction.
pub(crate) const CREATION_LOCK_STRIPES: usize = 64;
