//! In-process lock striping for keyed record operations
//!
//! Provides the lock registry that serializes read-modify-write cycles on
//! the same logical record. Locks are striped: each record type gets a
//! fixed-size array of mutexes, and an id hashes to one stripe. Memory is
//! bounded by the stripe count, not by the number of distinct ids, at the
//! cost of occasional false contention between ids that share a stripe.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod registry;

pub use registry::{LockRegistry, LockToken, StripeGuard, LOCK_STRIPES};
