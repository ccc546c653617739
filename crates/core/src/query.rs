//! Query descriptors for bulk operations
//!
//! A query descriptor is an opaque, pre-validated parameter handed to the
//! store adapter. The core never builds query text out of caller-provided
//! identifiers; a `Raw` descriptor is passed through verbatim for the
//! adapter to interpret (or reject).

/// Descriptor selecting the records a bulk operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Every record of the target type.
    All,
    /// Adapter-interpreted query text, treated as opaque by the core.
    ///
    /// Adapters that cannot execute raw text reject it with a store error
    /// naming the descriptor.
    Raw(String),
}

impl Query {
    /// Build a raw descriptor from adapter-ready query text.
    pub fn raw(text: impl Into<String>) -> Self {
        Query::Raw(text.into())
    }
}
