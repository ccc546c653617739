//! Bulk engine operations
//!
//! Two bulk modes with deliberately different guarantees:
//!
//! - **Independent item list** (`find_apply_and_merge_all`): each item runs
//!   the full single-item protocol under its own fresh lock acquisition and
//!   transaction. Failures are isolated: a bad item becomes an entry in the
//!   returned error list and the batch continues.
//! - **Query-scoped streaming sweep** (`apply_and_merge_all`): one
//!   long-lived transaction, rows pulled incrementally from a server-side
//!   cursor, each transformed row upserted back into the same transaction,
//!   one commit at the end. No per-id locks are taken on this path: it is
//!   built for maintenance sweeps that run without concurrent per-id
//!   writers, and callers own that assumption.

use crate::engine::Engine;
use lodestone_core::{Error, Ident, Query, Record, Result, Store, StoreSession, TransformError};
use tracing::{debug, warn};

/// A key bound to the pure transform to apply to that record.
///
/// The transform must not assume the record exists; the engine hands it
/// either the loaded record or a freshly default-constructed one.
pub struct Transfiguration<R: Record> {
    key: Ident<R>,
    transform: Box<dyn FnOnce(R) -> std::result::Result<R, TransformError> + Send>,
}

impl<R: Record> Transfiguration<R> {
    /// Bind `transform` to the record identified by `key`.
    pub fn new<F>(key: Ident<R>, transform: F) -> Self
    where
        F: FnOnce(R) -> std::result::Result<R, TransformError> + Send + 'static,
    {
        Transfiguration {
            key,
            transform: Box::new(transform),
        }
    }

    /// The identity key this transform applies to.
    pub fn key(&self) -> &Ident<R> {
        &self.key
    }
}

impl<R: Record> std::fmt::Debug for Transfiguration<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfiguration")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Engine<S> {
    /// Apply each transfiguration in order, isolating failures.
    ///
    /// Every item gets its own lock acquisition and transaction, exactly as
    /// [`Engine::find_apply_and_merge`] would. A failure on one item is
    /// appended to the returned list and processing continues with the
    /// next; the batch never aborts early. An empty result list means every
    /// item applied.
    pub fn find_apply_and_merge_all<R: Record>(
        &self,
        items: impl IntoIterator<Item = Transfiguration<R>>,
    ) -> Vec<Error> {
        let mut failures = Vec::new();
        for item in items {
            let Transfiguration { key, transform } = item;
            if let Err(err) = self.find_apply_and_merge(&key, transform) {
                warn!(key = %key, error = %err, "bulk item failed; continuing");
                failures.push(err);
            }
        }
        failures
    }

    /// Transform every record matched by `query` inside one transaction.
    ///
    /// Rows stream through a forward-only cursor; each transformed row is
    /// upserted back into the same transaction, and the transaction commits
    /// once at the end. Returns the number of records transformed.
    ///
    /// This path takes no per-id locks. It is intended for maintenance
    /// sweeps (reconciliation passes over a whole type) that run without
    /// concurrent per-id traffic; a sweep racing the locked single-item
    /// paths on the same records can lose updates.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Store`] if the driving query cannot run. A
    /// row-level decode, transform, or upsert failure aborts and rolls back
    /// the whole transaction; there is no piecemeal rollback of rows
    /// already transformed.
    pub fn apply_and_merge_all<R, F>(&self, query: &Query, transform: F) -> Result<usize>
    where
        R: Record,
        F: FnMut(R) -> std::result::Result<R, TransformError>,
    {
        let mut session = self.store.open_session()?;
        let outcome = self.sweep_in_session::<R, F>(&mut session, query, transform);
        if outcome.is_err() {
            self.rollback_best_effort(&mut session, R::TYPE.to_string());
        }
        outcome
    }

    /// Push a bulk update down to the store, returning affected rows.
    ///
    /// Thin transactional pass-through to the adapter's update-query
    /// support; adapters without server-side updates reject the descriptor.
    pub fn run_update<R: Record>(&self, query: &Query) -> Result<usize> {
        let mut session = self.store.open_session()?;
        let outcome = (|| {
            session.begin()?;
            let affected = session.run_update_query(R::TYPE, query)?;
            session.commit()?;
            debug!(type_name = R::TYPE, affected, "update query applied");
            Ok(affected)
        })();
        if outcome.is_err() {
            self.rollback_best_effort(&mut session, R::TYPE.to_string());
        }
        outcome
    }

    fn sweep_in_session<R, F>(
        &self,
        session: &mut S::Session,
        query: &Query,
        mut transform: F,
    ) -> Result<usize>
    where
        R: Record,
        F: FnMut(R) -> std::result::Result<R, TransformError>,
    {
        session.begin()?;
        let stream = session.stream_query::<R>(query)?;

        let mut count = 0usize;
        for row in stream {
            let record = row?;
            let rendered = format!("{}:{:?}", R::TYPE, record.id());
            let transformed = transform(record).map_err(|cause| {
                Error::store_keyed("transform", self.store.name(), rendered, cause)
            })?;
            session.upsert(transformed)?;
            count += 1;
        }

        session.commit()?;
        debug!(type_name = R::TYPE, count, "streaming sweep committed");
        Ok(count)
    }
}
