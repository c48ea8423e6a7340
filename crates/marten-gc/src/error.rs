//! Collector error codes

use thiserror::Error;

/// Errors returned by collector operations.
///
/// The taxonomy is closed: every facade call either succeeds or reports one
/// of these codes by value. There is no out-of-band error channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GcError {
    /// The identity already has a live record in the registry.
    #[error("object is already tracked")]
    AlreadyTracked,
    /// The operation requires a live record and none exists.
    #[error("object is not tracked")]
    NotTracked,
    /// A collection is active; the collector is non-reentrant.
    #[error("collection already in progress")]
    CollectionInProgress,
    /// Generation index outside `0..=2`.
    #[error("invalid generation")]
    InvalidGeneration,
    /// Null identity, uninitialized collector, or broken internal state.
    #[error("internal collector error")]
    Internal,
}

/// Result alias used throughout the collector.
pub type GcResult<T> = Result<T, GcError>;
