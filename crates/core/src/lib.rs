//! Core types and traits for Lodestone
//!
//! This crate defines the foundational types used throughout the system:
//! - Record: typed record contract with per-type default construction
//! - Ident: (record type, primary id) identity key
//! - Query: opaque descriptor for bulk/query-scoped operations
//! - Error: error type hierarchy
//! - Traits: store abstraction (Store, StoreSession)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ident;
pub mod query;
pub mod record;
pub mod traits;

pub use error::{Error, Result, TransformError};
pub use ident::Ident;
pub use query::Query;
pub use record::Record;
pub use traits::{RecordStream, Store, StoreSession};
