//! Lodestone - concurrency-safe keyed upsert-transform engine
//!
//! Lodestone loads, mutates, and saves keyed records against a pluggable
//! store while guaranteeing that no two concurrent operations on the same
//! logical record race each other into a duplicate insert or a lost update.
//!
//! # Quick Start
//!
//! ```
//! use lodestone::{Engine, Ident, MemoryStore, Record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Ledger {
//!     id: u64,
//!     balance: i64,
//! }
//!
//! impl Record for Ledger {
//!     const TYPE: &'static str = "Ledger";
//!     type Id = u64;
//!
//!     fn id(&self) -> &u64 {
//!         &self.id
//!     }
//!
//!     fn new_with_id(id: u64) -> Self {
//!         Ledger { id, balance: 0 }
//!     }
//! }
//!
//! # fn main() -> lodestone::Result<()> {
//! let engine = Engine::new(MemoryStore::new("demo"));
//!
//! // Find-or-create, transform, write back - race-free per key.
//! let row = engine.find_apply_and_merge(&Ident::<Ledger>::new(1), |mut r: Ledger| {
//!     r.balance += 100;
//!     Ok(r)
//! })?;
//! assert_eq!(row.balance, 100);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The [`Engine`] orchestrates every operation; it resolves a per-key lock
//! token from a striped registry, then runs the read-modify-write inside
//! one store transaction. The store behind the engine is any
//! [`Store`] implementation - the bundled [`MemoryStore`] or a relational
//! adapter.

// Re-export the public API from the member crates
pub use lodestone_core::{
    Error, Ident, Query, Record, RecordStream, Result, Store, StoreSession, TransformError,
};
pub use lodestone_engine::{Engine, Transfiguration};
pub use lodestone_storage::{MemorySession, MemoryStore, MemoryStoreError};
