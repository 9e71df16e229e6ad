//! Configuration for the memory-hierarchy simulator.
//!
//! This module defines the flat setup record consumed by the chain builder
//! and everything underneath it. It provides:
//! 1. **Defaults:** Baseline geometry and topology constants.
//! 2. **Structures:** Per-level cache geometry, memory/topology configuration,
//!    and the top-level [`ChainConfig`].
//! 3. **Enums:** Write policy, replacement policy, and the DRAM coordinate
//!    identifiers, each with a raw-byte decoder for the sideband registers.
//!
//! Configuration is supplied either as a plain struct or deserialized from
//! JSON; use `ChainConfig::default()` for a bare-controller setup.

use serde::Deserialize;

/// Default configuration constants.
///
/// These values define the baseline setup when a field is not explicitly
/// overridden in a deserialized configuration.
mod defaults {
    use super::Coord;

    /// Default cache size in bytes (4 KiB).
    pub const CACHE_SIZE: u64 = 4096;

    /// Default cache block size in bytes (64 bytes).
    pub const CACHE_BLOCK: u32 = 64;

    /// Default cache associativity (1 way = direct-mapped).
    pub const CACHE_ASSOC: u8 = 1;

    /// Default size of the guest-visible memory window (32 KiB).
    pub const MEM_SIZE: u64 = 0x8000;

    /// Default offset of the guest-visible memory window.
    pub const MEM_OFFSET: u64 = 0;

    /// Default number of DRAM channels.
    pub const CHANNELS: u8 = 2;

    /// Default number of ranks per channel.
    pub const RANKS: u8 = 4;

    /// Default number of banks per rank.
    pub const BANKS: u8 = 8;

    /// Default number of rows per bank.
    pub const ROWS: u32 = 1024;

    /// Default row width in bytes.
    pub const COLUMN_WIDTH: u32 = 1024;

    /// Default linear-to-coordinate mapping, lowest significance first.
    pub const COORD_ORDER: [Coord; 5] = [
        Coord::Column,
        Coord::Row,
        Coord::Bank,
        Coord::Rank,
        Coord::Channel,
    ];

    /// Default DDR burst length in bus words.
    pub const BURST_LENGTH: u64 = 4;
}

/// Cache write policies.
///
/// The policy is chain-wide: a single bit forwarded unchanged down the
/// chain with every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WritePolicy {
    /// Modified blocks are held dirty and flushed only on eviction.
    #[default]
    #[serde(alias = "WriteBack")]
    WriteBack,
    /// Every write is immediately forwarded to the lower level; blocks are
    /// never dirty.
    #[serde(alias = "WriteThrough")]
    WriteThrough,
}

impl WritePolicy {
    /// Decodes the sideband register encoding: 0 selects write-back, any
    /// other value write-through.
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Self::WriteBack
        } else {
            Self::WriteThrough
        }
    }
}

/// Cache replacement policies.
///
/// Selects which block to evict when a new block must be installed in a
/// full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Evicts a pseudo-randomly chosen block, using the per-set LCG.
    #[serde(alias = "Random")]
    Random,
    /// Evicts the block with the oldest generation stamp.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Evicts the block with the newest generation stamp. Effective for
    /// cyclic access patterns larger than the cache.
    #[serde(alias = "Mru")]
    Mru,
}

impl ReplacementPolicy {
    /// Decodes the sideband register encoding (RANDOM=0, LRU=1, MRU=2).
    ///
    /// Returns `None` for any other value; the caller ignores the write.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Random),
            1 => Some(Self::Lru),
            2 => Some(Self::Mru),
            _ => None,
        }
    }
}

/// DRAM coordinate identifiers.
///
/// The topology names these five dimensions in a permutation that defines
/// the linear-to-coordinate mapping, lowest significance first. The raw
/// values are fixed so they can cross the guest/simulator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Coord {
    /// DRAM channel; each channel owns its own backing region and wires.
    Channel,
    /// Chip-select rank within a channel.
    Rank,
    /// Bank within a rank.
    Bank,
    /// Row within a bank.
    Row,
    /// Byte offset within a row.
    Column,
}

impl Coord {
    /// Decodes the fixed encoding (Channel=0, Rank=1, Bank=2, Row=3,
    /// Column=4). Returns `None` for any other value.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Channel),
            1 => Some(Self::Rank),
            2 => Some(Self::Bank),
            3 => Some(Self::Row),
            4 => Some(Self::Column),
            _ => None,
        }
    }
}

/// Geometry of a single cache level.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheLevelConfig {
    /// Enable this cache level.
    #[serde(default)]
    pub enable: bool,

    /// Total cache size in bytes (power of two).
    #[serde(default = "CacheLevelConfig::default_size")]
    pub size: u64,

    /// Associativity, in ways (power of two).
    #[serde(default = "CacheLevelConfig::default_assoc")]
    pub assoc: u8,

    /// Block size in bytes (power of two).
    #[serde(default = "CacheLevelConfig::default_block_size")]
    pub block_size: u32,
}

impl CacheLevelConfig {
    /// Returns the default cache size in bytes.
    fn default_size() -> u64 {
        defaults::CACHE_SIZE
    }

    /// Returns the default associativity.
    fn default_assoc() -> u8 {
        defaults::CACHE_ASSOC
    }

    /// Returns the default block size in bytes.
    fn default_block_size() -> u32 {
        defaults::CACHE_BLOCK
    }
}

impl Default for CacheLevelConfig {
    /// Creates a disabled level with the default geometry.
    fn default() -> Self {
        Self {
            enable: false,
            size: defaults::CACHE_SIZE,
            assoc: defaults::CACHE_ASSOC,
            block_size: defaults::CACHE_BLOCK,
        }
    }
}

/// DRAM topology: dimension counts and the coordinate mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    /// Number of channels (power of two, at most 256).
    #[serde(default = "TopologyConfig::default_channels")]
    pub channels: u8,

    /// Ranks per channel (power of two, at most 256).
    #[serde(default = "TopologyConfig::default_ranks")]
    pub ranks: u8,

    /// Banks per rank (power of two, at most 256).
    #[serde(default = "TopologyConfig::default_banks")]
    pub banks: u8,

    /// Rows per bank (power of two, at most 65536 so a row index fits the
    /// A pins).
    #[serde(default = "TopologyConfig::default_rows")]
    pub rows: u32,

    /// Row width in bytes (power of two, at least one burst, at most 65536
    /// so a column fits the A pins).
    #[serde(default = "TopologyConfig::default_column_width")]
    pub column_width: u32,

    /// Linear-to-coordinate mapping, lowest significance first. Must name
    /// each coordinate exactly once.
    #[serde(default = "TopologyConfig::default_order")]
    pub order: [Coord; 5],
}

impl TopologyConfig {
    /// Returns the default channel count.
    fn default_channels() -> u8 {
        defaults::CHANNELS
    }

    /// Returns the default rank count.
    fn default_ranks() -> u8 {
        defaults::RANKS
    }

    /// Returns the default bank count.
    fn default_banks() -> u8 {
        defaults::BANKS
    }

    /// Returns the default row count.
    fn default_rows() -> u32 {
        defaults::ROWS
    }

    /// Returns the default row width in bytes.
    fn default_column_width() -> u32 {
        defaults::COLUMN_WIDTH
    }

    /// Returns the default coordinate mapping.
    fn default_order() -> [Coord; 5] {
        defaults::COORD_ORDER
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            channels: defaults::CHANNELS,
            ranks: defaults::RANKS,
            banks: defaults::BANKS,
            rows: defaults::ROWS,
            column_width: defaults::COLUMN_WIDTH,
            order: defaults::COORD_ORDER,
        }
    }
}

/// Memory subsystem configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Size of the guest-visible memory window in bytes.
    #[serde(default = "MemoryConfig::default_mem_size")]
    pub mem_size: u64,

    /// Guest address of the first byte of the window.
    #[serde(default = "MemoryConfig::default_mem_offset")]
    pub mem_offset: u64,

    /// DRAM topology.
    #[serde(default)]
    pub topology: TopologyConfig,

    /// DDR burst length in 8-byte bus words (power of two).
    #[serde(default = "MemoryConfig::default_burst_length")]
    pub burst_length: u64,
}

impl MemoryConfig {
    /// Returns the default window size.
    fn default_mem_size() -> u64 {
        defaults::MEM_SIZE
    }

    /// Returns the default window offset.
    fn default_mem_offset() -> u64 {
        defaults::MEM_OFFSET
    }

    /// Returns the default burst length.
    fn default_burst_length() -> u64 {
        defaults::BURST_LENGTH
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            mem_size: defaults::MEM_SIZE,
            mem_offset: defaults::MEM_OFFSET,
            topology: TopologyConfig::default(),
            burst_length: defaults::BURST_LENGTH,
        }
    }
}

/// The flat setup record for a complete chain.
///
/// # Examples
///
/// Deserializing from JSON:
///
/// ```
/// use memhier_core::config::{ChainConfig, ReplacementPolicy, WritePolicy};
///
/// let json = r#"{
///     "enable": true,
///     "l1_enable": true,
///     "write_policy": "WRITEBACK",
///     "replacement_policy": "LRU",
///     "dl1": { "enable": true, "size": 32768, "assoc": 4, "block_size": 64 },
///     "il1": { "enable": true, "size": 32768, "assoc": 4, "block_size": 64 },
///     "l2":  { "enable": true, "size": 131072, "assoc": 8, "block_size": 64 },
///     "memory": { "mem_size": 32768, "mem_offset": 0 }
/// }"#;
///
/// let config: ChainConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.write_policy, WritePolicy::WriteBack);
/// assert_eq!(config.replacement_policy, ReplacementPolicy::Lru);
/// assert_eq!(config.l2.size, 131072);
/// assert!(!config.l3.enable);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// Enables the whole cache unit. When false every level is bypassed and
    /// the entry points degenerate to the memory controller.
    #[serde(default)]
    pub enable: bool,

    /// Enables both the instruction and the data L1 cache.
    #[serde(default)]
    pub l1_enable: bool,

    /// Chain-wide write policy.
    #[serde(default)]
    pub write_policy: WritePolicy,

    /// Replacement policy applied to every level.
    #[serde(default)]
    pub replacement_policy: ReplacementPolicy,

    /// L1 instruction cache geometry.
    #[serde(default)]
    pub il1: CacheLevelConfig,

    /// L1 data cache geometry.
    #[serde(default)]
    pub dl1: CacheLevelConfig,

    /// Unified L2 cache geometry.
    #[serde(default)]
    pub l2: CacheLevelConfig,

    /// Unified L3 cache geometry.
    #[serde(default)]
    pub l3: CacheLevelConfig,

    /// Memory subsystem configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
}
