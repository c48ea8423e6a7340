//! Trial-deletion cycle collector
//!
//! The collector works on the union of the target generation and every
//! younger one. Declared refcounts are copied into per-record scratch
//! counters, references internal to that working set are subtracted, and
//! whatever still has a positive count must be held from outside; everything
//! it can reach is revived. What remains is cycle-trapped garbage, except
//! that objects with finalizers (and anything they reach) are quarantined in
//! the uncollectable set instead of reclaimed, because a finalizer may
//! resurrect them.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::flags::DebugFlags;
use crate::generations::GenerationBook;
use crate::hooks::HostHooks;
use crate::record::{Generation, Handle, ObjectId};
use crate::registry::ObjectRegistry;

/// Result of a single collection pass.
pub(crate) struct CollectionOutcome {
    /// Identities removed from the registry, pending host reclamation.
    pub reclaimed: Vec<ObjectId>,
    /// Objects quarantined in the uncollectable set by this pass.
    pub newly_uncollectable: usize,
    /// Survivors moved to an older generation.
    pub promoted: usize,
    /// Size of the working set examined.
    pub examined: usize,
}

/// Run one trial-deletion pass over generations `0..=target`.
///
/// Records flagged uncollectable are not part of the working set: their
/// outgoing references are never subtracted, so anything they point at keeps
/// its external count and survives.
pub(crate) fn collect_cycles(
    registry: &mut ObjectRegistry,
    book: &mut GenerationBook,
    uncollectable: &mut FxHashSet<Handle>,
    hooks: &HostHooks,
    flags: DebugFlags,
    target: Generation,
) -> CollectionOutcome {
    // Snapshot the working set in registry order and refresh refcounts.
    let work: Vec<Handle> = registry
        .handles()
        .filter(|&handle| {
            registry
                .get(handle)
                .is_some_and(|record| record.generation <= target && !record.uncollectable)
        })
        .collect();
    let in_work: FxHashSet<Handle> = work.iter().copied().collect();

    for &handle in &work {
        if let Some(record) = registry.get_mut(handle) {
            if let Some(refcount) = hooks.refcount.as_ref() {
                record.declared_refcount = refcount(record.id);
            }
            record.gc_refs = record.declared_refcount;
        }
    }

    // Subtract references internal to the working set. Whatever stays
    // positive is held from outside.
    for &handle in &work {
        let internal: Vec<Handle> = match registry.get(handle) {
            Some(record) => record
                .outgoing
                .iter()
                .copied()
                .filter(|referent| in_work.contains(referent))
                .collect(),
            None => continue,
        };
        for referent in internal {
            if let Some(record) = registry.get_mut(referent) {
                record.gc_refs -= 1;
            }
        }
    }

    // Externally held objects revive everything they can reach.
    let mut reachable: FxHashSet<Handle> = FxHashSet::default();
    let mut queue: VecDeque<Handle> = VecDeque::new();
    for &handle in &work {
        if registry.get(handle).is_some_and(|record| record.gc_refs > 0) {
            reachable.insert(handle);
            queue.push_back(handle);
        }
    }
    while let Some(handle) = queue.pop_front() {
        let Some(record) = registry.get(handle) else {
            continue;
        };
        for &referent in &record.outgoing {
            if in_work.contains(&referent) && reachable.insert(referent) {
                queue.push_back(referent);
            }
        }
    }

    // Unreachable objects with finalizers, plus everything reachable from
    // them within the candidate set, move to the uncollectable set in place.
    let candidates: Vec<Handle> = work
        .iter()
        .copied()
        .filter(|handle| !reachable.contains(handle))
        .collect();
    let candidate_set: FxHashSet<Handle> = candidates.iter().copied().collect();
    let mut pinned: FxHashSet<Handle> = FxHashSet::default();
    let mut pin_queue: VecDeque<Handle> = VecDeque::new();
    for &handle in &candidates {
        if registry
            .get(handle)
            .is_some_and(|record| record.has_finalizer)
        {
            pinned.insert(handle);
            pin_queue.push_back(handle);
        }
    }
    while let Some(handle) = pin_queue.pop_front() {
        let Some(record) = registry.get(handle) else {
            continue;
        };
        for &referent in &record.outgoing {
            if candidate_set.contains(&referent) && pinned.insert(referent) {
                pin_queue.push_back(referent);
            }
        }
    }

    let mut newly_uncollectable = 0;
    for &handle in &candidates {
        if !pinned.contains(&handle) {
            continue;
        }
        if let Some(record) = registry.get_mut(handle) {
            record.uncollectable = true;
            uncollectable.insert(handle);
            newly_uncollectable += 1;
            if flags.contains(DebugFlags::PRINT_UNCOLLECTABLE) {
                tracing::info!(
                    target: "marten::gc",
                    id = record.id.raw(),
                    "object moved to uncollectable set"
                );
            }
        }
    }

    // Reclaim the remaining candidates. Edge stripping on removal keeps the
    // survivors' graphs consistent.
    let mut reclaimed = Vec::new();
    for &handle in &candidates {
        if pinned.contains(&handle) {
            continue;
        }
        let Some(record) = registry.remove_handle(handle) else {
            continue;
        };
        book.remove(handle, record.generation);
        if flags.contains(DebugFlags::PRINT_RECLAIMED) {
            tracing::info!(
                target: "marten::gc",
                id = record.id.raw(),
                generation = record.generation.index(),
                "object reclaimed"
            );
        }
        reclaimed.push(record.id);
    }

    // Survivors age by one generation; the collected range starts counting
    // from zero again.
    let destination = target.older();
    let mut promoted = 0;
    for &handle in &work {
        if !reachable.contains(&handle) {
            continue;
        }
        let Some(record) = registry.get_mut(handle) else {
            continue;
        };
        let from = record.generation;
        if from != destination {
            record.generation = destination;
            book.promote(handle, from, destination);
            promoted += 1;
        }
    }
    book.reset_counters_through(target);

    CollectionOutcome {
        reclaimed,
        newly_uncollectable,
        promoted,
        examined: work.len(),
    }
}
