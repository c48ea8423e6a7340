//! Generation book: age buckets, allocation counters, and thresholds

use rustc_hash::FxHashSet;

use crate::record::{GENERATION_COUNT, Generation, Handle};

/// Default collection thresholds for generations 0, 1, and 2.
pub const DEFAULT_THRESHOLDS: [u32; GENERATION_COUNT] = [700, 10, 10];

/// Three ordered member buckets plus the trigger arithmetic.
///
/// Moving a handle between buckets never touches references; the book only
/// answers "who is in which generation" and "is a collection due".
pub(crate) struct GenerationBook {
    members: [FxHashSet<Handle>; GENERATION_COUNT],
    /// Tracked additions into each generation since its last collection.
    alloc_counter: [u32; GENERATION_COUNT],
    threshold: [u32; GENERATION_COUNT],
}

impl GenerationBook {
    pub fn new() -> Self {
        Self {
            members: Default::default(),
            alloc_counter: [0; GENERATION_COUNT],
            threshold: DEFAULT_THRESHOLDS,
        }
    }

    /// Enter a freshly tracked handle into generation 0.
    pub fn place_new(&mut self, handle: Handle) {
        self.members[Generation::Young.index()].insert(handle);
        self.alloc_counter[Generation::Young.index()] += 1;
    }

    /// Move a survivor from `from` to `to`, counting the arrival.
    pub fn promote(&mut self, handle: Handle, from: Generation, to: Generation) {
        if from == to {
            return;
        }
        self.members[from.index()].remove(&handle);
        self.members[to.index()].insert(handle);
        self.alloc_counter[to.index()] += 1;
    }

    /// Drop a handle from its generation.
    pub fn remove(&mut self, handle: Handle, generation: Generation) {
        self.members[generation.index()].remove(&handle);
    }

    /// Live members per generation.
    pub fn counts(&self) -> [usize; GENERATION_COUNT] {
        [
            self.members[0].len(),
            self.members[1].len(),
            self.members[2].len(),
        ]
    }

    /// Allocation counters per generation.
    pub fn counters(&self) -> [u32; GENERATION_COUNT] {
        self.alloc_counter
    }

    /// Reset the counters of every generation up to and including `target`,
    /// after that range has been collected.
    pub fn reset_counters_through(&mut self, target: Generation) {
        for index in 0..=target.index() {
            self.alloc_counter[index] = 0;
        }
    }

    pub fn threshold(&self, generation: Generation) -> u32 {
        self.threshold[generation.index()]
    }

    pub fn set_threshold(&mut self, generation: Generation, threshold: u32) {
        self.threshold[generation.index()] = threshold;
    }

    /// The generation a threshold-driven collection should target, if any.
    ///
    /// Generation 0 is due once its counter exceeds its threshold; older
    /// generations escalate the target only while every younger counter is
    /// also over its threshold.
    pub fn pending_generation(&self) -> Option<Generation> {
        if self.alloc_counter[0] <= self.threshold[0] {
            return None;
        }
        let mut due = Generation::Young;
        for candidate in [Generation::Middle, Generation::Old] {
            if self.alloc_counter[candidate.index()] > self.threshold[candidate.index()] {
                due = candidate;
            } else {
                break;
            }
        }
        Some(due)
    }

    /// Empty every bucket and zero the counters. Thresholds are kept.
    pub fn clear(&mut self) {
        for bucket in &mut self.members {
            bucket.clear();
        }
        self.alloc_counter = [0; GENERATION_COUNT];
    }
}
