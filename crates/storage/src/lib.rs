//! In-memory store adapter
//!
//! A reference `Store` implementation backed by concurrent hash tables,
//! with buffered-write session semantics: writes accumulate in the session
//! while a transaction is open and hit the shared tables only on commit.
//! Dropping a session mid-transaction discards the buffer, like a rollback.
//!
//! Used for embedding and for exercising the engine without a network
//! store; a relational adapter implements the same traits against a real
//! driver.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::{MemorySession, MemoryStore, MemoryStoreError};
