//! The collector service
//!
//! One value owns everything: registry, generation book, uncollectable set,
//! host hooks, trigger state, and metrics. The facade keeps a single
//! process-wide instance behind a mutex; every method here runs with that
//! lock held.

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::collect::{CollectionOutcome, collect_cycles};
use crate::error::{GcError, GcResult};
use crate::flags::DebugFlags;
use crate::generations::GenerationBook;
use crate::hooks::HostHooks;
use crate::record::{GENERATION_COUNT, Generation, Handle, ObjectId};
use crate::registry::ObjectRegistry;
use crate::stats::{CollectorMetrics, GcStats};

pub(crate) struct GcService {
    registry: ObjectRegistry,
    book: GenerationBook,
    /// Handles currently quarantined. Mirrors the per-record flag for O(1)
    /// counting and clearing.
    uncollectable: FxHashSet<Handle>,
    /// Host callback record, shared so the facade can invoke callbacks
    /// after releasing the service lock.
    pub(crate) hooks: Arc<HostHooks>,
    /// Gates threshold-driven collection.
    pub(crate) enabled: bool,
    /// Gates the object-creation hook.
    pub(crate) auto_track: bool,
    pub(crate) debug: DebugFlags,
    /// Reentrancy guard. Spans the whole collect call, including the
    /// reclamation callbacks the facade runs after unlocking.
    pub(crate) collecting: bool,
    metrics: CollectorMetrics,
}

impl GcService {
    pub fn new(hooks: HostHooks) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            book: GenerationBook::new(),
            uncollectable: FxHashSet::default(),
            hooks: Arc::new(hooks),
            enabled: true,
            auto_track: true,
            debug: DebugFlags::empty(),
            collecting: false,
            metrics: CollectorMetrics::default(),
        }
    }

    // ---------------------------------------------------------------
    // Tracking
    // ---------------------------------------------------------------

    pub fn track(&mut self, id: ObjectId) -> GcResult<()> {
        let handle = self.registry.insert(id)?;
        self.book.place_new(handle);
        Ok(())
    }

    pub fn untrack(&mut self, id: ObjectId) -> GcResult<()> {
        let (handle, record) = self.registry.remove(id)?;
        self.book.remove(handle, record.generation);
        self.uncollectable.remove(&handle);
        Ok(())
    }

    pub fn is_tracked(&self, id: ObjectId) -> bool {
        self.registry.contains(id)
    }

    pub fn refcount_changed(&mut self, id: ObjectId, new_count: i64) {
        // Advisory; notifications may arrive before track or after untrack.
        if let Some(handle) = self.registry.lookup(id) {
            if let Some(record) = self.registry.get_mut(handle) {
                record.declared_refcount = new_count;
            }
        }
    }

    pub fn declared_refcount(&self, id: ObjectId) -> i64 {
        self.record(id).map_or(0, |record| record.declared_refcount)
    }

    // ---------------------------------------------------------------
    // Reference graph
    // ---------------------------------------------------------------

    pub fn add_reference(&mut self, from: ObjectId, to: ObjectId) {
        self.registry.add_edge(from, to);
    }

    pub fn remove_reference(&mut self, from: ObjectId, to: ObjectId) {
        self.registry.remove_edge(from, to);
    }

    pub fn referents(&self, id: ObjectId) -> Vec<ObjectId> {
        self.registry.referents(id)
    }

    pub fn referrers(&self, id: ObjectId) -> Vec<ObjectId> {
        self.registry.referrers(id)
    }

    pub fn tracked_objects(&self) -> Vec<ObjectId> {
        self.registry
            .handles()
            .filter_map(|handle| self.registry.get(handle).map(|record| record.id))
            .collect()
    }

    // ---------------------------------------------------------------
    // Object metadata
    // ---------------------------------------------------------------

    pub fn set_finalizer(&mut self, id: ObjectId, has_finalizer: bool) -> GcResult<()> {
        self.record_mut(id)?.has_finalizer = has_finalizer;
        Ok(())
    }

    pub fn has_finalizer(&self, id: ObjectId) -> bool {
        self.record(id).is_some_and(|record| record.has_finalizer)
    }

    pub fn set_object_size(&mut self, id: ObjectId, size: usize) -> GcResult<()> {
        self.record_mut(id)?.size_hint = size;
        Ok(())
    }

    pub fn object_size(&self, id: ObjectId) -> usize {
        self.record(id).map_or(0, |record| record.size_hint)
    }

    pub fn set_type_name(&mut self, id: ObjectId, name: &str) -> GcResult<()> {
        self.record_mut(id)?.type_name = Some(name.to_owned());
        Ok(())
    }

    pub fn type_name(&self, id: ObjectId) -> Option<String> {
        self.record(id).and_then(|record| record.type_name.clone())
    }

    // ---------------------------------------------------------------
    // Collection
    // ---------------------------------------------------------------

    /// Run one collection with the lock held. The caller owns the
    /// `collecting` flag and the post-unlock reclamation callbacks.
    pub fn collect(&mut self, target: Generation) -> CollectionOutcome {
        let start = Instant::now();
        tracing::debug!(
            target: "marten::gc",
            generation = target.index(),
            tracked = self.registry.len(),
            "collection starting"
        );

        let outcome = collect_cycles(
            &mut self.registry,
            &mut self.book,
            &mut self.uncollectable,
            &self.hooks,
            self.debug,
            target,
        );

        let elapsed = start.elapsed();
        self.metrics.collections += 1;
        self.metrics.objects_reclaimed += outcome.reclaimed.len() as u64;
        self.metrics.objects_promoted += outcome.promoted as u64;
        self.metrics.last_reclaimed = outcome.reclaimed.len();
        self.metrics.last_duration = elapsed;

        if self.debug.contains(DebugFlags::PRINT_COLLECT) {
            tracing::info!(
                target: "marten::gc",
                generation = target.index(),
                examined = outcome.examined,
                reclaimed = outcome.reclaimed.len(),
                uncollectable = outcome.newly_uncollectable,
                promoted = outcome.promoted,
                pause_us = elapsed.as_micros() as u64,
                "collection complete"
            );
        } else {
            tracing::debug!(
                target: "marten::gc",
                generation = target.index(),
                reclaimed = outcome.reclaimed.len(),
                "collection complete"
            );
        }

        outcome
    }

    pub fn pending_generation(&self) -> Option<Generation> {
        self.book.pending_generation()
    }

    pub fn collection_counts(&self) -> [u32; GENERATION_COUNT] {
        self.book.counters()
    }

    // ---------------------------------------------------------------
    // Thresholds
    // ---------------------------------------------------------------

    pub fn set_threshold(&mut self, generation: Generation, threshold: u32) {
        self.book.set_threshold(generation, threshold);
    }

    pub fn threshold(&self, generation: Generation) -> u32 {
        self.book.threshold(generation)
    }

    // ---------------------------------------------------------------
    // Uncollectable set
    // ---------------------------------------------------------------

    pub fn mark_uncollectable(&mut self, id: ObjectId) -> GcResult<()> {
        let handle = self.registry.lookup(id).ok_or(GcError::NotTracked)?;
        if let Some(record) = self.registry.get_mut(handle) {
            record.uncollectable = true;
        }
        self.uncollectable.insert(handle);
        if self.debug.contains(DebugFlags::PRINT_UNCOLLECTABLE) {
            tracing::info!(target: "marten::gc", id = id.raw(), "object marked uncollectable");
        }
        Ok(())
    }

    pub fn unmark_uncollectable(&mut self, id: ObjectId) -> GcResult<()> {
        let handle = self.registry.lookup(id).ok_or(GcError::NotTracked)?;
        if let Some(record) = self.registry.get_mut(handle) {
            record.uncollectable = false;
        }
        self.uncollectable.remove(&handle);
        if self.debug.contains(DebugFlags::PRINT_UNCOLLECTABLE) {
            tracing::info!(target: "marten::gc", id = id.raw(), "object unmarked uncollectable");
        }
        Ok(())
    }

    pub fn is_uncollectable(&self, id: ObjectId) -> bool {
        self.record(id).is_some_and(|record| record.uncollectable)
    }

    /// Empty the uncollectable set, returning the released identities so
    /// the facade can run finalizer notifications after unlocking. The
    /// objects stay tracked and become ordinary collection candidates.
    pub fn take_uncollectable(&mut self) -> Vec<ObjectId> {
        let handles: Vec<Handle> = self.uncollectable.drain().collect();
        let mut released = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(record) = self.registry.get_mut(handle) {
                record.uncollectable = false;
                released.push(record.id);
            }
        }
        if self.debug.contains(DebugFlags::PRINT_UNCOLLECTABLE) {
            for id in &released {
                tracing::info!(target: "marten::gc", id = id.raw(), "object released from uncollectable set");
            }
        }
        released
    }

    pub fn garbage(&self) -> Vec<ObjectId> {
        self.uncollectable
            .iter()
            .filter_map(|&handle| self.registry.get(handle).map(|record| record.id))
            .collect()
    }

    pub fn uncollectable_count(&self) -> usize {
        self.uncollectable.len()
    }

    // ---------------------------------------------------------------
    // Statistics and observability
    // ---------------------------------------------------------------

    pub fn stats(&self) -> GcStats {
        GcStats {
            total_tracked: self.registry.len(),
            per_generation: self.book.counts(),
            uncollectable: self.uncollectable.len(),
        }
    }

    pub fn metrics(&self) -> CollectorMetrics {
        self.metrics
    }

    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn generation_count(&self, generation: Generation) -> usize {
        self.book.counts()[generation.index()]
    }

    pub fn state_string(&self) -> String {
        let counts = self.book.counts();
        format!(
            "initialized=1 enabled={} tracked={} gens=[{},{},{}] unc={} thr=[{},{},{}]",
            self.enabled as u8,
            self.registry.len(),
            counts[0],
            counts[1],
            counts[2],
            self.uncollectable.len(),
            self.book.threshold(Generation::Young),
            self.book.threshold(Generation::Middle),
            self.book.threshold(Generation::Old),
        )
    }

    pub fn tracked_info(&self, id: ObjectId) -> GcResult<String> {
        let record = self.record(id).ok_or(GcError::NotTracked)?;
        Ok(format!(
            "id={:#x} gen={} rc={} fin={} unc={} out={}",
            record.id.raw(),
            record.generation.index(),
            record.declared_refcount,
            record.has_finalizer as u8,
            record.uncollectable as u8,
            record.outgoing.len(),
        ))
    }

    /// Empty the registry, the generation buckets, and the uncollectable
    /// set. Thresholds and flags survive.
    pub fn clear_registry(&mut self) {
        self.registry.clear();
        self.book.clear();
        self.uncollectable.clear();
    }

    fn record(&self, id: ObjectId) -> Option<&crate::record::ObjectRecord> {
        self.registry.lookup(id).and_then(|handle| self.registry.get(handle))
    }

    fn record_mut(&mut self, id: ObjectId) -> GcResult<&mut crate::record::ObjectRecord> {
        let handle = self.registry.lookup(id).ok_or(GcError::NotTracked)?;
        self.registry.get_mut(handle).ok_or(GcError::Internal)
    }
}
