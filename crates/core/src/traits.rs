//! Store abstraction
//!
//! This module defines the `Store` and `StoreSession` traits that let a
//! relational adapter, the in-memory adapter, or any other backend sit
//! behind the engine without breaking the upper layers.
//!
//! A `Store` hands out sessions; a session is one unit of work with
//! explicit begin/commit/rollback boundaries. The engine never holds a
//! session across more than one transaction, and never holds one across a
//! lock boundary longer than the single round trip the protocol requires.

use crate::error::Result;
use crate::query::Query;
use crate::record::Record;

/// Lazily-pulled, finite, forward-only record cursor.
///
/// Implementations decode rows as the iterator is advanced; the full result
/// set is never materialized client-side. The cursor owns whatever handle it
/// needs, so the session remains usable (e.g. for upserting transformed rows
/// back) while the cursor is being drained.
pub type RecordStream<R> = Box<dyn Iterator<Item = Result<R>> + Send>;

/// A record store that can open unit-of-work sessions.
///
/// Thread safety: a store is shared across engine callers and must be safe
/// to open sessions from concurrently (`Send + Sync`). Sessions themselves
/// are single-owner.
pub trait Store: Send + Sync + 'static {
    /// Session type handed to engine operations.
    type Session: StoreSession;

    /// Logical name of this store, used in error context.
    fn name(&self) -> &str;

    /// Open a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error if no session can be acquired (e.g. pool exhausted).
    fn open_session(&self) -> Result<Self::Session>;
}

/// One unit of work against a store.
///
/// Row operations may run outside a transaction (plain reads) or inside one
/// (anything that writes). Dropping a session with an open transaction must
/// behave like `rollback`.
pub trait StoreSession {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or cannot start.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails; on
    /// failure the transaction's effects are discarded.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction, discarding buffered effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback itself fails.
    fn rollback(&mut self) -> Result<()>;

    /// Look up a record by id. Absence is `Ok(None)`.
    ///
    /// Inside a transaction, the session's own uncommitted writes are
    /// visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the row cannot be decoded.
    fn find_by_id<R: Record>(&mut self, id: &R::Id) -> Result<Option<R>>;

    /// Insert-or-update a record, returning the post-write record.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the write fails.
    fn upsert<R: Record>(&mut self, record: R) -> Result<R>;

    /// Delete a record by id. Returns `false` when no row existed.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the delete fails.
    fn delete_by_id<R: Record>(&mut self, id: &R::Id) -> Result<bool>;

    /// Execute `query` as a streaming cursor over records of type `R`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot run or the adapter does not
    /// support the descriptor.
    fn stream_query<R: Record>(&mut self, query: &Query) -> Result<RecordStream<R>>;

    /// Execute a bulk update query server-side, returning affected rows.
    ///
    /// `type_name` scopes the query to one record type's rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot run or the adapter does not
    /// support the descriptor.
    fn run_update_query(&mut self, type_name: &'static str, query: &Query) -> Result<usize>;
}
