//! Object registry and reference graph
//!
//! Records live in a slab arena addressed by dense handles; the host
//! identity resolves to a handle through a hash lookup. Handles are reused
//! through a free list. Edges are stored as handle pairs in both directions
//! so that removing a record strips every incoming edge in O(deg).

use rustc_hash::FxHashMap;

use crate::error::{GcError, GcResult};
use crate::record::{Handle, ObjectId, ObjectRecord};

/// Central registry of tracked-object records.
pub(crate) struct ObjectRegistry {
    /// Record slots. `None` marks a free slot awaiting reuse.
    slots: Vec<Option<ObjectRecord>>,
    /// Free slot indices, reused before the slab grows.
    free: Vec<Handle>,
    /// Host identity to handle lookup.
    by_id: FxHashMap<ObjectId, Handle>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: FxHashMap::default(),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn lookup(&self, id: ObjectId) -> Option<Handle> {
        self.by_id.get(&id).copied()
    }

    pub fn get(&self, handle: Handle) -> Option<&ObjectRecord> {
        self.slots.get(handle).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ObjectRecord> {
        self.slots.get_mut(handle).and_then(|slot| slot.as_mut())
    }

    /// Live handles in ascending slot order.
    ///
    /// This is the registry's stable iteration order; the cycle collector
    /// materializes its working list from it.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
    }

    /// Insert a fresh record for `id`.
    pub fn insert(&mut self, id: ObjectId) -> GcResult<Handle> {
        if self.by_id.contains_key(&id) {
            return Err(GcError::AlreadyTracked);
        }
        let record = ObjectRecord::new(id);
        let handle = match self.free.pop() {
            Some(handle) => {
                self.slots[handle] = Some(record);
                handle
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        };
        self.by_id.insert(id, handle);
        Ok(handle)
    }

    /// Remove the record at `handle`, stripping both edge directions.
    ///
    /// Returns the removed record so callers can finish generation
    /// bookkeeping from its metadata.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<ObjectRecord> {
        let record = self.slots.get_mut(handle).and_then(|slot| slot.take())?;
        self.by_id.remove(&record.id);
        self.free.push(handle);
        for &referent in &record.outgoing {
            if let Some(other) = self.slots.get_mut(referent).and_then(|slot| slot.as_mut()) {
                other.incoming.remove(&handle);
            }
        }
        for &referrer in &record.incoming {
            if let Some(other) = self.slots.get_mut(referrer).and_then(|slot| slot.as_mut()) {
                other.outgoing.remove(&handle);
            }
        }
        Some(record)
    }

    /// Remove the record for `id`.
    pub fn remove(&mut self, id: ObjectId) -> GcResult<(Handle, ObjectRecord)> {
        let handle = self.lookup(id).ok_or(GcError::NotTracked)?;
        let record = self.remove_handle(handle).ok_or(GcError::Internal)?;
        Ok((handle, record))
    }

    /// Record an edge `from -> to`. Idempotent; unknown endpoints are
    /// ignored so the host may notify out of order.
    pub fn add_edge(&mut self, from: ObjectId, to: ObjectId) {
        let (Some(from), Some(to)) = (self.lookup(from), self.lookup(to)) else {
            return;
        };
        if let Some(record) = self.get_mut(from) {
            record.outgoing.insert(to);
        }
        if let Some(record) = self.get_mut(to) {
            record.incoming.insert(from);
        }
    }

    /// Erase an edge `from -> to`. Missing edges and unknown endpoints are
    /// no-ops.
    pub fn remove_edge(&mut self, from: ObjectId, to: ObjectId) {
        let (Some(from), Some(to)) = (self.lookup(from), self.lookup(to)) else {
            return;
        };
        if let Some(record) = self.get_mut(from) {
            record.outgoing.remove(&to);
        }
        if let Some(record) = self.get_mut(to) {
            record.incoming.remove(&from);
        }
    }

    /// Identities `id` references, if `id` is tracked.
    pub fn referents(&self, id: ObjectId) -> Vec<ObjectId> {
        self.neighbors(id, |record| &record.outgoing)
    }

    /// Identities referencing `id`, if `id` is tracked.
    pub fn referrers(&self, id: ObjectId) -> Vec<ObjectId> {
        self.neighbors(id, |record| &record.incoming)
    }

    fn neighbors(
        &self,
        id: ObjectId,
        side: impl Fn(&ObjectRecord) -> &rustc_hash::FxHashSet<Handle>,
    ) -> Vec<ObjectId> {
        let Some(record) = self.lookup(id).and_then(|handle| self.get(handle)) else {
            return Vec::new();
        };
        side(record)
            .iter()
            .filter_map(|&handle| self.get(handle).map(|other| other.id))
            .collect()
    }

    /// Drop every record and reset the arena.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: usize) -> ObjectId {
        ObjectId::new(raw)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.insert(id(0x10)).unwrap();
        assert!(registry.contains(id(0x10)));
        assert_eq!(registry.lookup(id(0x10)), Some(handle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_insert_rejected() {
        let mut registry = ObjectRegistry::new();
        registry.insert(id(0x10)).unwrap();
        assert_eq!(registry.insert(id(0x10)), Err(GcError::AlreadyTracked));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_missing() {
        let mut registry = ObjectRegistry::new();
        assert!(matches!(registry.remove(id(0x10)), Err(GcError::NotTracked)));
    }

    #[test]
    fn test_handle_reuse() {
        let mut registry = ObjectRegistry::new();
        let first = registry.insert(id(0x10)).unwrap();
        registry.remove(id(0x10)).unwrap();
        let second = registry.insert(id(0x20)).unwrap();
        assert_eq!(first, second);
        assert!(!registry.contains(id(0x10)));
        assert!(registry.contains(id(0x20)));
    }

    #[test]
    fn test_edges_are_idempotent() {
        let mut registry = ObjectRegistry::new();
        let a = registry.insert(id(0xa)).unwrap();
        let b = registry.insert(id(0xb)).unwrap();
        registry.add_edge(id(0xa), id(0xb));
        registry.add_edge(id(0xa), id(0xb));
        assert_eq!(registry.get(a).unwrap().outgoing.len(), 1);
        assert_eq!(registry.get(b).unwrap().incoming.len(), 1);
        registry.remove_edge(id(0xa), id(0xb));
        registry.remove_edge(id(0xa), id(0xb));
        assert!(registry.get(a).unwrap().outgoing.is_empty());
        assert!(registry.get(b).unwrap().incoming.is_empty());
    }

    #[test]
    fn test_unknown_endpoints_ignored() {
        let mut registry = ObjectRegistry::new();
        registry.insert(id(0xa)).unwrap();
        registry.add_edge(id(0xa), id(0xdead));
        registry.add_edge(id(0xdead), id(0xa));
        let handle = registry.lookup(id(0xa)).unwrap();
        assert!(registry.get(handle).unwrap().outgoing.is_empty());
        assert!(registry.get(handle).unwrap().incoming.is_empty());
    }

    #[test]
    fn test_remove_strips_both_directions() {
        let mut registry = ObjectRegistry::new();
        let a = registry.insert(id(0xa)).unwrap();
        let c = registry.insert(id(0xc)).unwrap();
        registry.insert(id(0xb)).unwrap();
        registry.add_edge(id(0xa), id(0xb));
        registry.add_edge(id(0xb), id(0xc));
        registry.remove(id(0xb)).unwrap();
        assert!(registry.get(a).unwrap().outgoing.is_empty());
        assert!(registry.get(c).unwrap().incoming.is_empty());
    }

    #[test]
    fn test_referents_and_referrers() {
        let mut registry = ObjectRegistry::new();
        registry.insert(id(0xa)).unwrap();
        registry.insert(id(0xb)).unwrap();
        registry.insert(id(0xc)).unwrap();
        registry.add_edge(id(0xa), id(0xb));
        registry.add_edge(id(0xc), id(0xb));
        let mut referrers = registry.referrers(id(0xb));
        referrers.sort();
        assert_eq!(referrers, vec![id(0xa), id(0xc)]);
        assert_eq!(registry.referents(id(0xa)), vec![id(0xb)]);
        assert!(registry.referents(id(0xdead)).is_empty());
    }

    #[test]
    fn test_self_edge() {
        let mut registry = ObjectRegistry::new();
        let a = registry.insert(id(0xa)).unwrap();
        registry.add_edge(id(0xa), id(0xa));
        assert!(registry.get(a).unwrap().outgoing.contains(&a));
        registry.remove(id(0xa)).unwrap();
        assert_eq!(registry.len(), 0);
    }
}
