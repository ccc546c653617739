//! Keyed upsert-transform engine
//!
//! Orchestrates the find-or-create, transform, write-back protocol over an
//! abstract record store, serializing concurrent operations on the same
//! logical record through an in-process striped lock registry. Offers a
//! single-item path with strict per-key mutual exclusion and two bulk
//! paths with differing consistency and failure-isolation guarantees.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bulk;
pub mod engine;

pub use bulk::Transfiguration;
pub use engine::Engine;
