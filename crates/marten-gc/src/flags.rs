//! Debug flag word interpreted by the tracing-based debug printer

use bitflags::bitflags;

bitflags! {
    /// Opaque debug bitmask stored by `set_debug`.
    ///
    /// The flags only control which events the debug printer emits; they
    /// never change collection behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u32 {
        /// Emit a summary line for every collection.
        const PRINT_COLLECT = 1 << 0;
        /// Emit a line for every reclaimed identity.
        const PRINT_RECLAIMED = 1 << 1;
        /// Emit a line for every transition into or out of the
        /// uncollectable set.
        const PRINT_UNCOLLECTABLE = 1 << 2;
    }
}
