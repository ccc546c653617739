//! Concurrent in-memory tables with buffered transactional sessions
//!
//! ## Layout
//!
//! - One `DashMap` table per record type, keyed by the MessagePack-encoded
//!   id, holding MessagePack-encoded rows.
//! - Sessions buffer upserts and deletes while a transaction is open;
//!   `find_by_id` observes the session's own pending writes before the
//!   committed tables; `commit` applies the buffer under a store-wide
//!   commit lock so a multi-row transaction lands atomically.
//!
//! ## Capabilities
//!
//! `Query::All` streams a type's rows through a forward-only cursor that
//! snapshots the matching ids at query time and decodes rows one by one as
//! it is pulled. `Query::Raw` and `run_update_query` are rejected: raw
//! query text only means something to a relational adapter.

use dashmap::DashMap;
use lodestone_core::{Error, Query, Record, RecordStream, Result, Store, StoreSession};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, trace};

/// Adapter-level failure causes, wrapped into [`Error::Store`] at the
/// trait boundary so callers never see adapter internals directly.
#[derive(Debug, ThisError)]
pub enum MemoryStoreError {
    /// The adapter cannot execute this query descriptor.
    #[error("unsupported query descriptor: {0}")]
    UnsupportedQuery(String),

    /// A write operation ran with no open transaction.
    #[error("no open transaction")]
    NoTransaction,

    /// `begin` was called while a transaction was already open.
    #[error("transaction already open")]
    TransactionAlreadyOpen,

    /// A value could not be encoded for storage.
    #[error("encode failed: {0}")]
    Encode(String),
}

type Row = Vec<u8>;
type IdBytes = Vec<u8>;
type Table = DashMap<IdBytes, Row>;

struct Inner {
    tables: DashMap<&'static str, Table>,
    /// Serializes commit application so a buffered transaction lands as a
    /// unit with respect to other committers.
    commit_lock: Mutex<()>,
}

impl Inner {
    fn table(&self, type_name: &'static str) -> dashmap::mapref::one::Ref<'_, &'static str, Table> {
        if let Some(t) = self.tables.get(type_name) {
            return t;
        }
        self.tables.entry(type_name).or_default().downgrade()
    }
}

/// In-memory record store.
///
/// Cheap to clone-share via [`Store::open_session`]; all sessions observe
/// the same committed tables.
pub struct MemoryStore {
    name: String,
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store with the given logical name.
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore {
            name: name.into(),
            inner: Arc::new(Inner {
                tables: DashMap::new(),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Number of committed rows for a record type.
    pub fn row_count<R: Record>(&self) -> usize {
        self.inner
            .tables
            .get(R::TYPE)
            .map(|t| t.len())
            .unwrap_or(0)
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&self) -> Result<MemorySession> {
        Ok(MemorySession {
            store_name: self.name.clone(),
            inner: Arc::clone(&self.inner),
            txn: None,
        })
    }
}

enum Pending {
    Upsert {
        table: &'static str,
        id: IdBytes,
        row: Row,
    },
    Delete {
        table: &'static str,
        id: IdBytes,
    },
}

/// One unit of work against a [`MemoryStore`].
///
/// Dropping the session with an open transaction discards the buffered
/// writes, equivalent to `rollback`.
pub struct MemorySession {
    store_name: String,
    inner: Arc<Inner>,
    txn: Option<Vec<Pending>>,
}

impl MemorySession {
    fn encode<T: Serialize>(&self, op: &'static str, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| {
            Error::store(
                op,
                self.store_name.clone(),
                MemoryStoreError::Encode(e.to_string()),
            )
        })
    }

    fn decode_row<R: Record>(row: &[u8]) -> Result<R> {
        decode::<R>(R::TYPE, row)
    }

    /// The latest pending effect for (table, id), if any.
    fn pending_for(&self, table: &'static str, id: &[u8]) -> Option<&Pending> {
        self.txn.as_ref().and_then(|buf| {
            buf.iter().rev().find(|p| match p {
                Pending::Upsert { table: t, id: i, .. } | Pending::Delete { table: t, id: i } => {
                    *t == table && i.as_slice() == id
                }
            })
        })
    }

    fn committed_row(&self, table: &'static str, id: &[u8]) -> Option<Row> {
        self.inner
            .tables
            .get(table)
            .and_then(|t| t.get(id).map(|r| r.value().clone()))
    }
}

fn decode<R: DeserializeOwned>(type_name: &'static str, row: &[u8]) -> Result<R> {
    rmp_serde::from_slice(row).map_err(|e| Error::construction(type_name, e.to_string()))
}

impl StoreSession for MemorySession {
    fn begin(&mut self) -> Result<()> {
        if self.txn.is_some() {
            return Err(Error::store(
                "begin",
                self.store_name.clone(),
                MemoryStoreError::TransactionAlreadyOpen,
            ));
        }
        trace!(store = %self.store_name, "transaction begun");
        self.txn = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let buffer = self.txn.take().ok_or_else(|| {
            Error::store(
                "commit",
                self.store_name.clone(),
                MemoryStoreError::NoTransaction,
            )
        })?;

        let writes = buffer.len();
        let _commit = self.inner.commit_lock.lock();
        for pending in buffer {
            match pending {
                Pending::Upsert { table, id, row } => {
                    self.inner.table(table).insert(id, row);
                }
                Pending::Delete { table, id } => {
                    self.inner.table(table).remove(&id);
                }
            }
        }
        debug!(store = %self.store_name, writes, "transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let discarded = self.txn.take().map(|b| b.len()).unwrap_or(0);
        trace!(store = %self.store_name, discarded, "transaction rolled back");
        Ok(())
    }

    fn find_by_id<R: Record>(&mut self, id: &R::Id) -> Result<Option<R>> {
        let id_bytes = self.encode("find_by_id", id)?;
        match self.pending_for(R::TYPE, &id_bytes) {
            Some(Pending::Upsert { row, .. }) => {
                let row = row.clone();
                Ok(Some(Self::decode_row::<R>(&row)?))
            }
            Some(Pending::Delete { .. }) => Ok(None),
            None => match self.committed_row(R::TYPE, &id_bytes) {
                Some(row) => Ok(Some(Self::decode_row::<R>(&row)?)),
                None => Ok(None),
            },
        }
    }

    fn upsert<R: Record>(&mut self, record: R) -> Result<R> {
        let id = self.encode("upsert", record.id())?;
        let row = self.encode("upsert", &record)?;
        let buf = self.txn.as_mut().ok_or_else(|| {
            Error::store(
                "upsert",
                self.store_name.clone(),
                MemoryStoreError::NoTransaction,
            )
        })?;
        buf.push(Pending::Upsert {
            table: R::TYPE,
            id,
            row,
        });
        Ok(record)
    }

    fn delete_by_id<R: Record>(&mut self, id: &R::Id) -> Result<bool> {
        let id_bytes = self.encode("delete_by_id", id)?;
        if self.txn.is_none() {
            return Err(Error::store(
                "delete_by_id",
                self.store_name.clone(),
                MemoryStoreError::NoTransaction,
            ));
        }

        let existed = match self.pending_for(R::TYPE, &id_bytes) {
            Some(Pending::Upsert { .. }) => true,
            Some(Pending::Delete { .. }) => false,
            None => self.committed_row(R::TYPE, &id_bytes).is_some(),
        };

        if let Some(buf) = self.txn.as_mut() {
            buf.push(Pending::Delete {
                table: R::TYPE,
                id: id_bytes,
            });
        }
        Ok(existed)
    }

    fn stream_query<R: Record>(&mut self, query: &Query) -> Result<RecordStream<R>> {
        match query {
            Query::All => {
                // Snapshot the matching ids up front; rows decode lazily as
                // the cursor is pulled, so concurrent inserts after this
                // point are not swept and rows removed mid-stream are
                // skipped.
                let ids: Vec<IdBytes> = self
                    .inner
                    .tables
                    .get(R::TYPE)
                    .map(|t| t.iter().map(|entry| entry.key().clone()).collect())
                    .unwrap_or_default();
                trace!(store = %self.store_name, type_name = R::TYPE, rows = ids.len(), "query cursor opened");
                Ok(Box::new(Cursor::<R> {
                    inner: Arc::clone(&self.inner),
                    ids: ids.into_iter(),
                    _type: std::marker::PhantomData,
                }))
            }
            Query::Raw(text) => Err(Error::store(
                "stream_query",
                self.store_name.clone(),
                MemoryStoreError::UnsupportedQuery(text.clone()),
            )),
        }
    }

    fn run_update_query(&mut self, type_name: &'static str, query: &Query) -> Result<usize> {
        let rendered = match query {
            Query::All => format!("{type_name}: all"),
            Query::Raw(text) => format!("{type_name}: {text}"),
        };
        Err(Error::store(
            "run_update_query",
            self.store_name.clone(),
            MemoryStoreError::UnsupportedQuery(rendered),
        ))
    }
}

struct Cursor<R: Record> {
    inner: Arc<Inner>,
    ids: std::vec::IntoIter<IdBytes>,
    _type: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> Iterator for Cursor<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Result<R>> {
        loop {
            let id = self.ids.next()?;
            let row = self
                .inner
                .tables
                .get(R::TYPE)
                .and_then(|t| t.get(&id).map(|r| r.value().clone()));
            match row {
                Some(row) => return Some(decode::<R>(R::TYPE, &row)),
                // Row deleted since the cursor opened; skip it.
                None => continue,
            }
        }
    }
}
