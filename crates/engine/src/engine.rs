//! Single-item engine operations
//!
//! The find-apply-merge protocol for one record:
//!
//! 1. Resolve the lock token for the key via the striped registry.
//! 2. Acquire it (blocking, in-process critical section).
//! 3. Open a session and begin a transaction.
//! 4. Read the record by key; default-construct it when absent.
//! 5. Apply the transform to the loaded-or-new record.
//! 6. Write the result back as an upsert through the session.
//! 7. Commit.
//! 8. The guard drops on every exit path, releasing the lock.
//! 9. Return the post-write record.
//!
//! Steps 4-6 are a read-modify-write. Two threads racing on the same
//! not-yet-existing id would both observe "absent" and both insert; the
//! store's own transaction isolation does not serialize that across
//! sessions for a row that does not exist yet. The per-key lock does. The
//! critical section spans exactly one store round trip and the transform
//! itself; nothing else runs inside it.

use lodestone_concurrency::LockRegistry;
use lodestone_core::{Error, Ident, Record, Result, Store, StoreSession, TransformError};
use tracing::{debug, error, trace};

/// Keyed upsert-transform engine over a store.
///
/// One engine per store; callers share it across threads. The store is an
/// explicit constructor argument, never ambient process-wide state.
pub struct Engine<S: Store> {
    pub(crate) store: S,
    pub(crate) locks: LockRegistry,
}

impl<S: Store> Engine<S> {
    /// Build an engine over `store`.
    pub fn new(store: S) -> Self {
        Engine {
            store,
            locks: LockRegistry::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up a record by key. Absence is `Ok(None)`.
    ///
    /// Pure reads take no lock: they cannot cause duplicate-insert races.
    pub fn get<R: Record>(&self, key: &Ident<R>) -> Result<Option<R>> {
        let mut session = self.store.open_session()?;
        session
            .find_by_id::<R>(key.id())
            .map_err(|e| e.with_key(key.to_string()))
    }

    /// Fetch the record for `key`, creating and persisting the type's
    /// default record with that id when no row exists yet.
    ///
    /// The read of an existing row is unlocked; only the create branch runs
    /// the full locked protocol. Calling this twice with no intervening
    /// write returns the same record and persists it once.
    pub fn get_or_create<R: Record>(&self, key: &Ident<R>) -> Result<R> {
        if let Some(found) = self.get(key)? {
            return Ok(found);
        }
        // Row may appear between the unlocked read and here; the locked
        // path re-reads under the lock, so the create is still race-free.
        self.find_apply_and_merge(key, Ok)
    }

    /// Run the locked find-or-create, transform, write-back protocol.
    ///
    /// `transform` receives the loaded record, or a freshly
    /// default-constructed one when no row exists; it never sees an absent
    /// record. Returns the post-write record.
    ///
    /// # Errors
    ///
    /// Any store failure or transform failure propagates as
    /// [`Error::Store`] carrying the operation, key, and store name. The
    /// transaction is rolled back and the lock released regardless.
    pub fn find_apply_and_merge<R, F>(&self, key: &Ident<R>, transform: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(R) -> std::result::Result<R, TransformError>,
    {
        let token = self.locks.lock_for::<R>(key.id());
        trace!(key = %key, stripe = token.stripe(), "acquiring record lock");
        let _guard = token.acquire();

        let mut session = self
            .store
            .open_session()
            .map_err(|e| e.with_key(key.to_string()))?;

        let outcome = self.merge_in_session(&mut session, key, transform);
        if outcome.is_err() {
            self.rollback_best_effort(&mut session, key.to_string());
        }
        outcome
    }

    /// Delete the record for `key`. Deleting an absent key is a no-op.
    ///
    /// Locked and transactional like a merge: deletion is a write racing
    /// against concurrent merges on the same key.
    pub fn delete_by_id<R: Record>(&self, key: &Ident<R>) -> Result<()> {
        let token = self.locks.lock_for::<R>(key.id());
        let _guard = token.acquire();

        let mut session = self
            .store
            .open_session()
            .map_err(|e| e.with_key(key.to_string()))?;

        let outcome = (|| {
            session.begin()?;
            let existed = session.delete_by_id::<R>(key.id())?;
            session.commit()?;
            debug!(key = %key, existed, "record deleted");
            Ok(())
        })()
        .map_err(|e: Error| e.with_key(key.to_string()));

        if outcome.is_err() {
            self.rollback_best_effort(&mut session, key.to_string());
        }
        outcome
    }

    /// Steps 3-9 of the merge protocol, inside the held lock.
    fn merge_in_session<R, F>(
        &self,
        session: &mut S::Session,
        key: &Ident<R>,
        transform: F,
    ) -> Result<R>
    where
        R: Record,
        F: FnOnce(R) -> std::result::Result<R, TransformError>,
    {
        let attach = |e: Error| e.with_key(key.to_string());

        session.begin().map_err(attach)?;

        let existing = session.find_by_id::<R>(key.id()).map_err(attach)?;
        let created = existing.is_none();
        let record = match existing {
            Some(found) => found,
            None => R::new_with_id(key.id().clone()),
        };

        let transformed = transform(record).map_err(|cause| {
            Error::store_keyed("transform", self.store.name(), key.to_string(), cause)
        })?;

        let written = session.upsert(transformed).map_err(attach)?;
        session.commit().map_err(attach)?;

        debug!(key = %key, created, "record merged");
        Ok(written)
    }

    pub(crate) fn rollback_best_effort(&self, session: &mut S::Session, key: String) {
        if let Err(rollback_err) = session.rollback() {
            error!(key = %key, error = %rollback_err, "rollback failed after merge error");
        }
    }
}
