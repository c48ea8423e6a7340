//! Host callback record registered at init time
//!
//! The collector manages identities, not memory. When a cycle is reclaimed
//! the host is notified through `reclaim` and frees (or queues) the object
//! itself. The optional `refcount` query lets the collector refresh its
//! refcount snapshot at the start of a collection instead of relying solely
//! on `refcount_changed` notifications.

use crate::record::ObjectId;

/// Reclamation callback: the host frees the object or enqueues it for
/// freeing. Invoked once per reclaimed identity, after the collector has
/// dropped its record and released the internal lock.
pub type ReclaimFn = Box<dyn Fn(ObjectId) + Send + Sync>;

/// Refcount query: returns the host's current reference count for an object.
pub type RefcountFn = Box<dyn Fn(ObjectId) -> i64 + Send + Sync>;

/// Finalizer notification: invoked for each object leaving the
/// uncollectable set when it is explicitly cleared.
pub type FinalizeFn = Box<dyn Fn(ObjectId) + Send + Sync>;

/// The pluggable callback set the host registers at init.
///
/// Every hook is optional; the default record is all no-ops. Hooks must not
/// reenter the facade while a collection is active: a nested `collect`
/// observes the in-progress flag and fails, and other mutating calls may
/// race with the collection that invoked the hook.
#[derive(Default)]
pub struct HostHooks {
    /// Called for each reclaimed identity.
    pub reclaim: Option<ReclaimFn>,
    /// Queried per object at the start of a collection, when present.
    pub refcount: Option<RefcountFn>,
    /// Called for each identity released by `clear_uncollectable`.
    pub finalize: Option<FinalizeFn>,
}

impl HostHooks {
    /// An empty hook record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reclamation callback.
    pub fn with_reclaim(mut self, f: impl Fn(ObjectId) + Send + Sync + 'static) -> Self {
        self.reclaim = Some(Box::new(f));
        self
    }

    /// Register the refcount query.
    pub fn with_refcount(mut self, f: impl Fn(ObjectId) -> i64 + Send + Sync + 'static) -> Self {
        self.refcount = Some(Box::new(f));
        self
    }

    /// Register the finalizer notification.
    pub fn with_finalize(mut self, f: impl Fn(ObjectId) + Send + Sync + 'static) -> Self {
        self.finalize = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for HostHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHooks")
            .field("reclaim", &self.reclaim.is_some())
            .field("refcount", &self.refcount.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}
