//! Metrics collection for the hierarchy.
//!
//! This module tracks the observable counters of the simulator. It provides:
//! 1. **Cache metrics:** Hit/miss pairs per level, aggregated in the fixed
//!    guest-visible order.
//! 2. **Channel statistics:** Per-channel DDR command counts, including the
//!    out-of-range diagnostics.
//! 3. **Level tags:** Identification of a cache's position in the chain for
//!    tracing and metrics slotting.
//!
//! All counters are plain 64-bit integers incremented on the request path;
//! readers tolerate possibly-stale values.

/// Position of a cache in the chain.
///
/// Used for tracing output and to slot the cache's counters into the fixed
/// metrics order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    /// L1 instruction cache.
    L1i,
    /// L1 data cache.
    L1d,
    /// Unified L2 cache.
    L2,
    /// Unified L3 cache.
    L3,
}

impl CacheLevel {
    /// Returns the guest-visible metrics slot for this level.
    ///
    /// The fixed order is [L1-I, L1-D, L2, L3].
    pub fn slot(self) -> usize {
        match self {
            Self::L1i => 0,
            Self::L1d => 1,
            Self::L2 => 2,
            Self::L3 => 3,
        }
    }

    /// Returns a short label for tracing.
    pub fn label(self) -> &'static str {
        match self {
            Self::L1i => "l1i",
            Self::L1d => "l1d",
            Self::L2 => "l2",
            Self::L3 => "l3",
        }
    }
}

/// Hit/miss counters of a single cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Accesses satisfied by this level.
    pub hits: u64,
    /// Accesses that had to consult the level below.
    pub misses: u64,
}

impl CacheMetrics {
    /// Total accesses that reached this level.
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Number of guest-visible metric slots.
pub const METRIC_SLOTS: usize = 4;

/// Aggregated chain metrics in the fixed order [L1-I, L1-D, L2, L3].
///
/// Disabled levels report zero counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainMetrics {
    /// Per-level hit/miss pairs.
    pub levels: [CacheMetrics; METRIC_SLOTS],
}

impl ChainMetrics {
    /// Counters of the L1 instruction cache.
    pub fn l1i(&self) -> CacheMetrics {
        self.levels[CacheLevel::L1i.slot()]
    }

    /// Counters of the L1 data cache.
    pub fn l1d(&self) -> CacheMetrics {
        self.levels[CacheLevel::L1d.slot()]
    }

    /// Counters of the L2 cache.
    pub fn l2(&self) -> CacheMetrics {
        self.levels[CacheLevel::L2.slot()]
    }

    /// Counters of the L3 cache.
    pub fn l3(&self) -> CacheMetrics {
        self.levels[CacheLevel::L3.slot()]
    }
}

/// DDR command statistics of one memory channel.
///
/// The counters make the channel its own instrument: tests count Activates
/// and burst words here instead of patching the command path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Activate commands interpreted.
    pub activates: u64,
    /// Read commands (first word of a burst).
    pub reads: u64,
    /// Read burst continuations.
    pub read_bursts: u64,
    /// Write commands (first word of a burst).
    pub writes: u64,
    /// Write burst continuations.
    pub write_bursts: u64,
    /// Precharge commands (no-ops in the functional model).
    pub precharges: u64,
    /// Reads whose computed offset fell outside the backing region.
    pub oob_reads: u64,
    /// Writes dropped because their offset fell outside the backing region.
    pub oob_writes: u64,
}

impl ChannelStats {
    /// Total data words moved, in either direction.
    pub fn data_words(&self) -> u64 {
        self.reads + self.read_bursts + self.writes + self.write_bursts
    }
}
