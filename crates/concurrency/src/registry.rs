//! Striped lock registry
//!
//! Maps an identity key to the in-process lock token that guards it.
//!
//! ## Design
//!
//! - Per-type stripe arrays: a key of type `R` can only contend with other
//!   keys of type `R`, never across types.
//! - Fixed stripe count (17, prime): memory is bounded regardless of how
//!   many distinct ids pass through; a prime count spreads systematic
//!   patterns from poor id hashes.
//! - `lock_for` never blocks and never fails; it only resolves which token
//!   guards a key. Acquisition is a separate, blocking step that returns an
//!   RAII guard, so release happens on every exit path.
//! - Stripe-array creation is race-free: a lock-free `DashMap::get` fast
//!   path, then `entry().or_insert_with` (atomic get-or-insert) on miss.
//!   Two threads racing the first access of a type get the same array.
//!
//! The mapping from (type, id) to token is stable for the process lifetime:
//! same hasher, same stripe count, same array.

use dashmap::DashMap;
use lodestone_core::Record;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHasher;
use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Number of lock stripes per record type.
///
/// Prime, to reduce systematic collisions from poorly-distributed id
/// hashes. Ids that collide modulo this count serialize against each other
/// unnecessarily; that false contention is the accepted cost of bounded
/// memory.
pub const LOCK_STRIPES: usize = 17;

/// One record type's stripe array.
struct StripeSet {
    locks: [Mutex<()>; LOCK_STRIPES],
}

impl StripeSet {
    fn new() -> Self {
        StripeSet {
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }
}

/// Guard for one held stripe; dropping it releases the stripe.
pub struct StripeGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Opaque mutual-exclusion handle for one (type, id) bucket.
///
/// Resolving a token is free and non-blocking; [`LockToken::acquire`]
/// blocks until the stripe is held.
pub struct LockToken {
    stripes: Arc<StripeSet>,
    index: usize,
}

impl LockToken {
    /// Block until the stripe is held, returning an RAII guard.
    ///
    /// Two tokens for the same (type, stripe) serialize in acquisition
    /// order, with whatever fairness `parking_lot` provides.
    pub fn acquire(&self) -> StripeGuard<'_> {
        StripeGuard {
            _guard: self.stripes.locks[self.index].lock(),
        }
    }

    /// Stripe index this token resolved to (diagnostics/tests).
    pub fn stripe(&self) -> usize {
        self.index
    }
}

/// Per-type striped lock registry.
///
/// Shared, lazily-initialized, append-only state: a type's stripe array is
/// allocated on first access and lives for the process lifetime.
pub struct LockRegistry {
    stripes: DashMap<TypeId, Arc<StripeSet>>,
}

impl LockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        LockRegistry {
            stripes: DashMap::new(),
        }
    }

    /// Resolve the lock token guarding `(R, id)`.
    ///
    /// Never fails, never blocks on other holders; it does not acquire the
    /// lock.
    pub fn lock_for<R: Record>(&self, id: &R::Id) -> LockToken {
        let stripes = self.stripes_for(TypeId::of::<R>());
        LockToken {
            index: stripe_index(id),
            stripes,
        }
    }

    /// Number of types that have allocated stripe arrays.
    pub fn type_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripes_for(&self, type_id: TypeId) -> Arc<StripeSet> {
        // Fast path: lock-free read for an already-seen type.
        if let Some(existing) = self.stripes.get(&type_id) {
            return Arc::clone(existing.value());
        }
        // Miss: atomic get-or-insert; losers of the race get the winner's
        // array, so the (type, id) -> token mapping stays stable.
        Arc::clone(
            self.stripes
                .entry(type_id)
                .or_insert_with(|| Arc::new(StripeSet::new()))
                .value(),
        )
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn stripe_index<I: Hash>(id: &I) -> usize {
    let mut hasher = FxHasher::default();
    id.hash(&mut hasher);
    (hasher.finish() % LOCK_STRIPES as u64) as usize
}
