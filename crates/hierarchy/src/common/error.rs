//! Setup-time error definitions.
//!
//! All failures in this crate happen at setup: geometry and topology
//! validation, and backing-region allocation. The request path never
//! returns errors; contract violations there are debug-asserted and the
//! out-of-range DRAM paths degrade to zero-reads and dropped writes.

use thiserror::Error;

/// Error raised while building a cache chain or its memory subsystem.
///
/// Construction is transactional: on error, everything allocated so far is
/// released by drop semantics and the previous configuration (if any)
/// stays in place.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A dimension that must be a power of two is not.
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// A cache cannot hold even a single set of the requested shape.
    #[error("cache of {size} bytes cannot hold {assoc} ways of {block_size}-byte blocks")]
    CacheTooSmall {
        /// Requested total size in bytes.
        size: u64,
        /// Requested associativity.
        assoc: u8,
        /// Requested block size in bytes.
        block_size: u32,
    },

    /// Block sizes shrink going down the chain, so a full-block refill
    /// would span multiple lower-level blocks.
    #[error("block size shrinks from {upper} to {lower} bytes going down the chain")]
    BlockSizeShrinks {
        /// Block size of the upper level.
        upper: u32,
        /// Block size of the level below it.
        lower: u32,
    },

    /// A topology dimension exceeds what its pins can carry.
    #[error("{field} exceeds the supported maximum of {max}")]
    DimensionTooLarge {
        /// Name of the offending topology field.
        field: &'static str,
        /// Largest accepted value.
        max: u64,
    },

    /// The row width cannot hold a full burst.
    #[error("column width of {column_width} bytes is narrower than one burst ({burst_bytes} bytes)")]
    ColumnTooNarrow {
        /// Configured row width in bytes.
        column_width: u32,
        /// Bytes transferred by one full burst.
        burst_bytes: u64,
    },

    /// The coordinate mapping does not name each coordinate exactly once.
    #[error("topological order must name each coordinate exactly once")]
    BadCoordOrder,

    /// The guest-visible window does not fit the configured topology.
    #[error("mapped window of {requested} bytes exceeds the {available}-byte topology")]
    WindowExceedsTopology {
        /// Requested window size in bytes.
        requested: u64,
        /// Total capacity of the topology in bytes.
        available: u64,
    },

    /// A channel backing region could not be allocated.
    #[error("failed to allocate a {size}-byte channel region")]
    RegionAllocation {
        /// Requested region size in bytes.
        size: usize,
        /// The underlying allocator error.
        source: std::io::Error,
    },
}
