//! Collector statistics records

use std::time::Duration;

use crate::record::GENERATION_COUNT;

/// Fixed statistics snapshot exposed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Number of live records in the registry.
    pub total_tracked: usize,
    /// Live records per generation. Sums to `total_tracked`.
    pub per_generation: [usize; GENERATION_COUNT],
    /// Records currently in the uncollectable set.
    pub uncollectable: usize,
}

/// Cumulative collection metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorMetrics {
    /// Number of collections run.
    pub collections: u64,
    /// Objects reclaimed across all collections.
    pub objects_reclaimed: u64,
    /// Objects promoted across all collections.
    pub objects_promoted: u64,
    /// Objects reclaimed by the last collection.
    pub last_reclaimed: usize,
    /// Wall-clock duration of the last collection.
    pub last_duration: Duration,
}
