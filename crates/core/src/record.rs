//! Record contract
//!
//! A record is any value addressable by an identity key. Every record type
//! declares its logical type name, its primary id type, and a canonical
//! "empty/default" construction rule given only an id. The construction rule
//! is a typed factory registered at compile time via the trait impl, so no
//! runtime reflection is involved anywhere.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// A keyed record managed by the engine.
///
/// Adapters move records across the store boundary by value, so records must
/// be serializable and owned (`'static`). The id must hash and compare,
/// since it selects the lock stripe and addresses the row.
///
/// # Example
///
/// ```
/// use lodestone_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Ledger {
///     id: u64,
///     balance: i64,
/// }
///
/// impl Record for Ledger {
///     const TYPE: &'static str = "Ledger";
///     type Id = u64;
///
///     fn id(&self) -> &u64 {
///         &self.id
///     }
///
///     fn new_with_id(id: u64) -> Self {
///         Ledger { id, balance: 0 }
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// Logical type name; doubles as the table/collection name for adapters.
    const TYPE: &'static str;

    /// Primary id type.
    type Id: Hash + Eq + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// The record's primary id.
    fn id(&self) -> &Self::Id;

    /// Default-construct a brand-new record with the given id set.
    ///
    /// Called when an operation targets an id that has no row yet. All other
    /// fields take their canonical empty/default values.
    fn new_with_id(id: Self::Id) -> Self;
}
