//! Integer leaky bucket used to meter reservation throughput.
//!
//! Symbols leak out of the bucket at a constant rate, freeing capacity for new fills.
//! All arithmetic is integral so that clients and servers metering the same account
//! never drift apart through accumulated rounding error.

mod bucket;
mod error;

pub use bucket::{BiasBehavior, LeakyBucket, OverfillBehavior, bucket_capacity};
pub use error::{LeakyBucketError, TimeMovedBackwardError};
