//! Error types for the upsert-transform engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The taxonomy is deliberately narrow:
//! - Absence on a pure lookup is `Ok(None)`, never an error.
//! - Any underlying store failure (I/O, constraint violation, transaction
//!   failure) surfaces as `Error::Store`, carrying the operation name, the
//!   logical store name, the identity key when one applies, and the cause.
//! - `Error::Construction` covers a record type whose construction/codec
//!   rule cannot produce a record — a programmer error, not a store fault.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause type for fallible transform functions.
///
/// Transforms return `Result<R, TransformError>`; a failure is wrapped into
/// [`Error::Store`] with the operation and key attached, so callers diagnose
/// it the same way as a store fault.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the upsert-transform engine
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying store failure (I/O, constraint violation, transaction failure)
    #[error("store error during {op} on '{store}'{}: {source}", key_suffix(.key))]
    Store {
        /// Operation that failed (e.g. "find_apply_and_merge", "commit")
        op: &'static str,
        /// Logical name of the store the operation ran against
        store: String,
        /// Identity key involved, rendered as `Type:id`, when one applies
        key: Option<String>,
        /// Underlying cause; driver internals stay behind this boundary
        #[source]
        source: TransformError,
    },

    /// Failure to produce a record of a type (row decode / construction rule)
    #[error("cannot construct record of type '{type_name}': {detail}")]
    Construction {
        /// Logical record type name
        type_name: &'static str,
        /// What went wrong in the type's construction/codec rule
        detail: String,
    },
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" for {k}"),
        None => String::new(),
    }
}

impl Error {
    /// Wrap a store failure with operation and store context, no key.
    pub fn store(
        op: &'static str,
        store: impl Into<String>,
        source: impl Into<TransformError>,
    ) -> Self {
        Error::Store {
            op,
            store: store.into(),
            key: None,
            source: source.into(),
        }
    }

    /// Wrap a store failure with operation, store, and identity key context.
    pub fn store_keyed(
        op: &'static str,
        store: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<TransformError>,
    ) -> Self {
        Error::Store {
            op,
            store: store.into(),
            key: Some(key.into()),
            source: source.into(),
        }
    }

    /// Construction failure for a record type.
    pub fn construction(type_name: &'static str, detail: impl Into<String>) -> Self {
        Error::Construction {
            type_name,
            detail: detail.into(),
        }
    }

    /// Attach an identity key to a store error that lacks one.
    ///
    /// Construction errors pass through unchanged.
    pub fn with_key(self, rendered: impl Into<String>) -> Self {
        match self {
            Error::Store {
                op,
                store,
                key: None,
                source,
            } => Error::Store {
                op,
                store,
                key: Some(rendered.into()),
                source,
            },
            other => other,
        }
    }
}
