//! Identity keys
//!
//! An identity key is the immutable (record type, primary id) pair that
//! names one logical record. The type half is carried statically, so two
//! keys of different record types can never compare equal or collide; the
//! id half carries the hash. Keys are constructed on demand, never
//! persisted, never mutated.

use crate::record::Record;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Identity key for one logical record of type `R`.
///
/// Equality and hashing derive from the id alone; the record type is part
/// of the key at the type level. Rendered as `Type:id` for diagnostics.
pub struct Ident<R: Record> {
    id: R::Id,
    _type: PhantomData<fn() -> R>,
}

impl<R: Record> Ident<R> {
    /// Build the identity key for `id`.
    pub fn new(id: R::Id) -> Self {
        Ident {
            id,
            _type: PhantomData,
        }
    }

    /// The primary id half of the key.
    pub fn id(&self) -> &R::Id {
        &self.id
    }

    /// Consume the key, yielding the id.
    pub fn into_id(self) -> R::Id {
        self.id
    }

    /// Logical record type name of the key.
    pub fn type_name(&self) -> &'static str {
        R::TYPE
    }
}

impl<R: Record> Clone for Ident<R> {
    fn clone(&self) -> Self {
        Ident::new(self.id.clone())
    }
}

impl<R: Record> PartialEq for Ident<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: Record> Eq for Ident<R> {}

impl<R: Record> Hash for Ident<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<R: Record> fmt::Debug for Ident<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ident")
            .field("type", &R::TYPE)
            .field("id", &self.id)
            .finish()
    }
}

impl<R: Record> fmt::Display for Ident<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", R::TYPE, self.id)
    }
}
