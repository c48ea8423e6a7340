//! Process-wide facade
//!
//! The stable operation set the host runtime calls. One service instance
//! lives behind a process-wide mutex; every operation serializes on it.
//! Reclamation and finalizer callbacks run after the lock is released, so a
//! callback that reenters `collect` observes the in-progress flag instead of
//! deadlocking.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{GcError, GcResult};
use crate::flags::DebugFlags;
use crate::generations::DEFAULT_THRESHOLDS;
use crate::hooks::HostHooks;
use crate::record::{GENERATION_COUNT, Generation, ObjectId};
use crate::service::GcService;
use crate::stats::{CollectorMetrics, GcStats};

static STATE: Mutex<Option<GcService>> = Mutex::new(None);

fn with_service<T>(f: impl FnOnce(&mut GcService) -> GcResult<T>) -> GcResult<T> {
    let mut state = STATE.lock();
    let service = state.as_mut().ok_or(GcError::Internal)?;
    f(service)
}

fn read_service<T>(default: T, f: impl FnOnce(&GcService) -> T) -> T {
    let state = STATE.lock();
    state.as_ref().map_or(default, f)
}

fn reject_null(id: ObjectId) -> GcResult<()> {
    if id.is_null() {
        Err(GcError::Internal)
    } else {
        Ok(())
    }
}

/// Run a collection selected by `select`, handling the reentrancy flag and
/// the post-unlock reclamation callbacks. Returns the number of reclaimed
/// objects; `Ok(0)` when `select` declines.
fn collect_with(select: impl FnOnce(&GcService) -> Option<Generation>) -> GcResult<usize> {
    let (reclaimed, hooks) = {
        let mut state = STATE.lock();
        let service = state.as_mut().ok_or(GcError::Internal)?;
        if service.collecting {
            return Err(GcError::CollectionInProgress);
        }
        let Some(target) = select(service) else {
            return Ok(0);
        };
        service.collecting = true;
        let outcome = service.collect(target);
        (outcome.reclaimed, Arc::clone(&service.hooks))
    };

    // The records are already gone; hand the identities to the host with
    // the lock released so its reclaim path can call back into the facade.
    if let Some(reclaim) = hooks.reclaim.as_ref() {
        for &id in &reclaimed {
            reclaim(id);
        }
    }

    let mut state = STATE.lock();
    if let Some(service) = state.as_mut() {
        service.collecting = false;
    }
    Ok(reclaimed.len())
}

// ---------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------

/// Initialize the process-wide collector with default (no-op) host hooks.
/// Idempotent; a second call leaves existing state untouched.
pub fn init() -> GcResult<()> {
    init_with_hooks(HostHooks::new())
}

/// Initialize the process-wide collector with the given host hooks.
/// Idempotent; if the collector is already initialized the hooks are ignored.
pub fn init_with_hooks(hooks: HostHooks) -> GcResult<()> {
    let mut state = STATE.lock();
    if state.is_none() {
        *state = Some(GcService::new(hooks));
        tracing::debug!(target: "marten::gc", "collector initialized");
    }
    Ok(())
}

/// Tear down the collector, dropping every record. Idempotent.
pub fn cleanup() -> GcResult<()> {
    let mut state = STATE.lock();
    if state.take().is_some() {
        tracing::debug!(target: "marten::gc", "collector torn down");
    }
    Ok(())
}

/// Whether `init` has run and `cleanup` has not.
pub fn is_initialized() -> bool {
    STATE.lock().is_some()
}

/// Enable threshold-driven collection.
pub fn enable() -> GcResult<()> {
    with_service(|service| {
        service.enabled = true;
        Ok(())
    })
}

/// Disable threshold-driven collection. Explicit `collect` calls still work.
pub fn disable() -> GcResult<()> {
    with_service(|service| {
        service.enabled = false;
        Ok(())
    })
}

/// Whether threshold-driven collection is enabled.
pub fn is_enabled() -> bool {
    read_service(false, |service| service.enabled)
}

/// Enable tracking through the `object_created` hook.
pub fn enable_automatic_tracking() -> GcResult<()> {
    with_service(|service| {
        service.auto_track = true;
        Ok(())
    })
}

/// Disable tracking through the `object_created` hook.
pub fn disable_automatic_tracking() -> GcResult<()> {
    with_service(|service| {
        service.auto_track = false;
        Ok(())
    })
}

/// Whether the `object_created` hook tracks new objects.
pub fn is_automatic_tracking_enabled() -> bool {
    read_service(false, |service| service.auto_track)
}

// ---------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------

/// Register an object identity with the collector, entering generation 0.
pub fn track(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.track(id))
}

/// Remove an object identity and every edge touching it.
pub fn untrack(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.untrack(id))
}

/// Whether `id` has a live record. Null and unknown identities read false.
pub fn is_tracked(id: ObjectId) -> bool {
    read_service(false, |service| service.is_tracked(id))
}

/// Host hook for object creation. Tracks the object when automatic tracking
/// is on, then runs a threshold-driven collection if one is due.
pub fn object_created(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    let tracked = with_service(|service| {
        if !service.auto_track {
            return Ok(false);
        }
        service.track(id)?;
        Ok(true)
    })?;
    if tracked {
        match collect_with(|service| {
            if service.enabled {
                service.pending_generation()
            } else {
                None
            }
        }) {
            // A creation hook fired from inside a reclamation callback must
            // not fail the creation itself.
            Ok(_) | Err(GcError::CollectionInProgress) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Host hook for object destruction. Untracks the object if it is tracked;
/// unknown identities are tolerated.
pub fn object_destroyed(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| {
        if service.is_tracked(id) {
            service.untrack(id)?;
        }
        Ok(())
    })
}

/// Host notification that an object's refcount changed. The new value is
/// authoritative; notifications for untracked identities are tolerated.
pub fn refcount_changed(id: ObjectId, _old_count: i64, new_count: i64) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| {
        service.refcount_changed(id, new_count);
        Ok(())
    })
}

/// Last refcount the host declared for `id`, 0 when untracked.
pub fn declared_refcount(id: ObjectId) -> i64 {
    read_service(0, |service| service.declared_refcount(id))
}

// ---------------------------------------------------------------
// Reference graph
// ---------------------------------------------------------------

/// Record a reference `from -> to`. Idempotent; unknown endpoints are
/// ignored so the host may notify out of order.
pub fn add_reference(from: ObjectId, to: ObjectId) -> GcResult<()> {
    reject_null(from)?;
    reject_null(to)?;
    with_service(|service| {
        service.add_reference(from, to);
        Ok(())
    })
}

/// Erase a reference `from -> to`. Missing edges are a no-op.
pub fn remove_reference(from: ObjectId, to: ObjectId) -> GcResult<()> {
    reject_null(from)?;
    reject_null(to)?;
    with_service(|service| {
        service.remove_reference(from, to);
        Ok(())
    })
}

/// Identities `id` references. Empty when `id` is unknown.
pub fn referents(id: ObjectId) -> Vec<ObjectId> {
    read_service(Vec::new(), |service| service.referents(id))
}

/// Identities referencing `id`. Empty when `id` is unknown.
pub fn referrers(id: ObjectId) -> Vec<ObjectId> {
    read_service(Vec::new(), |service| service.referrers(id))
}

/// Every tracked identity, in registry order.
pub fn tracked_objects() -> Vec<ObjectId> {
    read_service(Vec::new(), |service| service.tracked_objects())
}

/// Identities currently in the uncollectable set.
pub fn garbage() -> Vec<ObjectId> {
    read_service(Vec::new(), |service| service.garbage())
}

// ---------------------------------------------------------------
// Object metadata
// ---------------------------------------------------------------

/// Declare whether `id` has a finalizer.
pub fn set_finalizer(id: ObjectId, has_finalizer: bool) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.set_finalizer(id, has_finalizer))
}

/// Whether the host declared a finalizer for `id`.
pub fn has_finalizer(id: ObjectId) -> bool {
    read_service(false, |service| service.has_finalizer(id))
}

/// Report the object's size for statistics.
pub fn set_object_size(id: ObjectId, size: usize) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.set_object_size(id, size))
}

/// Host-reported object size, 0 when unknown or untracked.
pub fn object_size(id: ObjectId) -> usize {
    read_service(0, |service| service.object_size(id))
}

/// Report the object's type name for debug output.
pub fn set_type_name(id: ObjectId, name: &str) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.set_type_name(id, name))
}

/// Host-reported type name, if any.
pub fn type_name(id: ObjectId) -> Option<String> {
    read_service(None, |service| service.type_name(id))
}

// ---------------------------------------------------------------
// Collection
// ---------------------------------------------------------------

/// Collect one generation (and every younger one). Returns the number of
/// reclaimed objects.
pub fn collect_generation(generation: i32) -> GcResult<usize> {
    let target = Generation::from_index(generation).ok_or(GcError::InvalidGeneration)?;
    collect_with(|_| Some(target))
}

/// Run a full collection (generation 2).
pub fn collect() -> GcResult<usize> {
    collect_with(|_| Some(Generation::Old))
}

/// Whether the allocation counters call for a collection.
pub fn needs_collection() -> bool {
    read_service(false, |service| service.pending_generation().is_some())
}

/// Collect the highest generation over threshold, if any and if automatic
/// collection is enabled. Returns the number of reclaimed objects.
pub fn collect_if_needed() -> GcResult<usize> {
    collect_with(|service| {
        if service.enabled {
            service.pending_generation()
        } else {
            None
        }
    })
}

/// Allocation counters per generation since each generation's last
/// collection.
pub fn collection_counts() -> [u32; GENERATION_COUNT] {
    read_service([0; GENERATION_COUNT], |service| service.collection_counts())
}

// ---------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------

/// Set the collection threshold for a generation.
pub fn set_threshold(generation: i32, threshold: u32) -> GcResult<()> {
    let generation = Generation::from_index(generation).ok_or(GcError::InvalidGeneration)?;
    with_service(|service| {
        service.set_threshold(generation, threshold);
        Ok(())
    })
}

/// Collection threshold for a generation, or -1 when the index is invalid.
pub fn get_threshold(generation: i32) -> i64 {
    let Some(generation) = Generation::from_index(generation) else {
        return -1;
    };
    read_service(i64::from(DEFAULT_THRESHOLDS[generation.index()]), |service| {
        i64::from(service.threshold(generation))
    })
}

// ---------------------------------------------------------------
// Debug flags
// ---------------------------------------------------------------

/// Store the debug flag word interpreted by the debug printer.
pub fn set_debug(flags: u32) -> GcResult<()> {
    with_service(|service| {
        service.debug = DebugFlags::from_bits_retain(flags);
        Ok(())
    })
}

/// Current debug flag word.
pub fn debug_flags() -> u32 {
    read_service(0, |service| service.debug.bits())
}

/// Log a one-line summary of the collector state.
pub fn debug_state() -> GcResult<()> {
    let summary = state_string();
    tracing::info!(target: "marten::gc", state = %summary, "collector state");
    Ok(())
}

// ---------------------------------------------------------------
// Statistics and observability
// ---------------------------------------------------------------

/// Statistics snapshot: totals, per-generation counts, uncollectable count.
pub fn get_stats() -> GcStats {
    read_service(GcStats::default(), |service| service.stats())
}

/// Cumulative collection metrics.
pub fn metrics() -> CollectorMetrics {
    read_service(CollectorMetrics::default(), |service| service.metrics())
}

/// Number of tracked objects.
pub fn get_count() -> usize {
    read_service(0, |service| service.count())
}

/// Number of objects in a generation, or -1 when the index is invalid.
pub fn generation_count(generation: i32) -> i64 {
    let Some(generation) = Generation::from_index(generation) else {
        return -1;
    };
    read_service(0, |service| service.generation_count(generation) as i64)
}

/// Number of objects in the uncollectable set.
pub fn uncollectable_count() -> usize {
    read_service(0, |service| service.uncollectable_count())
}

/// Human-readable one-line summary of the collector state.
pub fn state_string() -> String {
    let state = STATE.lock();
    match state.as_ref() {
        Some(service) => service.state_string(),
        None => format!(
            "initialized=0 enabled=0 tracked=0 gens=[0,0,0] unc=0 thr=[{},{},{}]",
            DEFAULT_THRESHOLDS[0], DEFAULT_THRESHOLDS[1], DEFAULT_THRESHOLDS[2],
        ),
    }
}

/// Human-readable record summary for a tracked identity.
pub fn tracked_info(id: ObjectId) -> GcResult<String> {
    reject_null(id)?;
    with_service(|service| service.tracked_info(id))
}

// ---------------------------------------------------------------
// Uncollectable set
// ---------------------------------------------------------------

/// Quarantine `id`: the cycle collector will never reclaim it.
pub fn mark_uncollectable(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.mark_uncollectable(id))
}

/// Release `id` from the uncollectable set.
pub fn unmark_uncollectable(id: ObjectId) -> GcResult<()> {
    reject_null(id)?;
    with_service(|service| service.unmark_uncollectable(id))
}

/// Whether `id` is in the uncollectable set.
pub fn is_uncollectable(id: ObjectId) -> bool {
    read_service(false, |service| service.is_uncollectable(id))
}

/// Empty the uncollectable set, invoking the host `finalize` hook for each
/// released identity. The objects stay tracked.
pub fn clear_uncollectable() -> GcResult<()> {
    let (released, hooks) = {
        let mut state = STATE.lock();
        let service = state.as_mut().ok_or(GcError::Internal)?;
        let released = service.take_uncollectable();
        (released, Arc::clone(&service.hooks))
    };
    if let Some(finalize) = hooks.finalize.as_ref() {
        for &id in &released {
            finalize(id);
        }
    }
    Ok(())
}

/// Drop every record, emptying the registry and all generations.
pub fn clear_registry() -> GcResult<()> {
    with_service(|service| {
        service.clear_registry();
        Ok(())
    })
}
