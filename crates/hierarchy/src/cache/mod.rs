//! Set-associative cache engine.
//!
//! This module implements the single, reusable cache unit every level of
//! the chain is built from. It provides:
//! 1. **Lookup:** Set/tag indexing with per-level hit/miss accounting.
//! 2. **Refill:** Full-block fetches from the lower level on miss.
//! 3. **Write handling:** Write-back (write-allocate) and write-through
//!    (write-no-allocate) semantics, selected per access.
//! 4. **Replacement:** LRU, MRU and RANDOM victim selection, the latter
//!    driven by a deterministic per-set LCG.
//!
//! The engine holds real data: each block owns exactly `block_size` bytes
//! and a read served from a valid block never consults the lower level.

use crate::chain::Backend;
use crate::common::{SetupError, block_base};
use crate::config::{CacheLevelConfig, ReplacementPolicy};
use crate::stats::{CacheLevel, CacheMetrics};

/// LCG multiplier for the per-set PRNG.
const RNG_A: u64 = 75;
/// LCG increment for the per-set PRNG.
const RNG_C: u64 = 74;
/// LCG modulus for the per-set PRNG (2¹⁶ + 1).
const RNG_M: u64 = (1 << 16) + 1;
/// Seed shared by every set, for reproducible RANDOM eviction.
const RNG_SEED: u64 = 12321;

/// Deterministic per-set linear-congruential generator.
///
/// Each set owns its own state so RANDOM eviction in one set never
/// perturbs another set's sequence.
#[derive(Debug, Clone)]
struct SetRng {
    state: u64,
}

impl SetRng {
    fn new() -> Self {
        Self { state: RNG_SEED }
    }

    /// Advances the generator and returns the new state.
    fn advance(&mut self) -> u64 {
        self.state = (RNG_A * self.state + RNG_C) % RNG_M;
        self.state
    }
}

/// One cache block: tag, flags, recency stamp, and its data bytes.
#[derive(Debug)]
struct Block {
    tag: u64,
    valid: bool,
    dirty: bool,
    // 128 bits so the recency stamp cannot wrap within any realistic run.
    generation: u128,
    data: Box<[u8]>,
}

impl Block {
    fn new(block_size: u32) -> Self {
        Self {
            tag: 0,
            valid: false,
            dirty: false,
            generation: 0,
            data: vec![0u8; block_size as usize].into_boxed_slice(),
        }
    }
}

/// A set: `assoc` blocks, a recency counter, and the set's own PRNG.
///
/// The set knows its own index; eviction never reconstructs it from the
/// position of the set in the containing allocation.
#[derive(Debug)]
struct CacheSet {
    index: usize,
    blocks: Vec<Block>,
    generation_counter: u128,
    rng: SetRng,
}

impl CacheSet {
    fn new(index: usize, assoc: u8, block_size: u32) -> Self {
        Self {
            index,
            blocks: (0..assoc).map(|_| Block::new(block_size)).collect(),
            generation_counter: 0,
            rng: SetRng::new(),
        }
    }
}

/// Observable state of one block, for invariant checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockState {
    /// Index of the set holding the block.
    pub set: usize,
    /// Way index within the set.
    pub way: usize,
    /// Stored tag (meaningful only when `valid`).
    pub tag: u64,
    /// Whether the block holds a live line.
    pub valid: bool,
    /// Whether the block differs from its image in the lower levels.
    pub dirty: bool,
}

/// A set-associative cache with configurable geometry and policies.
///
/// The cache is policy-agnostic about writes: the chain passes the
/// write-through bit with every write, so the same engine serves both
/// write policies.
#[derive(Debug)]
pub struct Cache {
    level: CacheLevel,
    sets: Vec<CacheSet>,
    policy: ReplacementPolicy,
    block_size: u32,
    assoc: u8,
    number_of_sets: u64,
    block_size_log2: u32,
    metrics: CacheMetrics,
}

impl Cache {
    /// Builds a cache from the requested geometry.
    ///
    /// All blocks start invalid and clean. Every dimension must be a power
    /// of two and the size must hold at least one full set.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] describing the first geometry violation.
    pub fn new(
        level: CacheLevel,
        config: &CacheLevelConfig,
        policy: ReplacementPolicy,
    ) -> Result<Self, SetupError> {
        let CacheLevelConfig {
            size,
            assoc,
            block_size,
            ..
        } = *config;

        if !size.is_power_of_two() {
            return Err(SetupError::NotPowerOfTwo {
                field: "cache size",
                value: size,
            });
        }
        if !assoc.is_power_of_two() {
            return Err(SetupError::NotPowerOfTwo {
                field: "associativity",
                value: u64::from(assoc),
            });
        }
        if !block_size.is_power_of_two() {
            return Err(SetupError::NotPowerOfTwo {
                field: "block size",
                value: u64::from(block_size),
            });
        }

        let set_bytes = u64::from(assoc) * u64::from(block_size);
        if size < set_bytes {
            return Err(SetupError::CacheTooSmall {
                size,
                assoc,
                block_size,
            });
        }

        let number_of_sets = size / set_bytes;
        let sets = (0..number_of_sets)
            .map(|i| CacheSet::new(i as usize, assoc, block_size))
            .collect();

        tracing::debug!(
            cache = level.label(),
            size,
            assoc,
            block_size,
            sets = number_of_sets,
            "cache initialized"
        );

        Ok(Self {
            level,
            sets,
            policy,
            block_size,
            assoc,
            number_of_sets,
            block_size_log2: block_size.ilog2(),
            metrics: CacheMetrics::default(),
        })
    }

    /// Reads `dst.len()` bytes at `address`, refilling from `lower` on miss.
    ///
    /// The requested range must lie within a single block; callers split
    /// accesses that cross a block boundary.
    pub fn read(&mut self, lower: &mut dyn Backend, dst: &mut [u8], address: u64) {
        self.check_contained(address, dst.len());

        let set_index = self.set_index(address);
        let tag = address >> self.block_size_log2;

        let way = match self.lookup(set_index, tag) {
            Some(way) => way,
            None => {
                let way = self.allocate(lower, set_index, tag);
                let base = block_base(self.block_size_log2, address);
                lower.read(&mut self.sets[set_index].blocks[way].data, base);
                way
            }
        };

        let offset = self.block_offset(address);
        let block = &self.sets[set_index].blocks[way];
        dst.copy_from_slice(&block.data[offset..offset + dst.len()]);
    }

    /// Writes `src.len()` bytes at `address`.
    ///
    /// With `write_through` false (write-back) the write allocates: a
    /// missing block is refilled from below before being modified and left
    /// dirty. With `write_through` true a present block is updated and the
    /// full block is forwarded down; a missing block is bypassed entirely
    /// and the narrow write forwarded unchanged (write-no-allocate).
    pub fn write(&mut self, lower: &mut dyn Backend, src: &[u8], address: u64, write_through: bool) {
        self.check_contained(address, src.len());

        let set_index = self.set_index(address);
        let tag = address >> self.block_size_log2;

        let mut way = self.lookup(set_index, tag);
        if way.is_none() && !write_through {
            let allocated = self.allocate(lower, set_index, tag);
            let base = block_base(self.block_size_log2, address);
            lower.read(&mut self.sets[set_index].blocks[allocated].data, base);
            way = Some(allocated);
        }

        match way {
            Some(way) => {
                let offset = self.block_offset(address);
                let block = &mut self.sets[set_index].blocks[way];
                block.data[offset..offset + src.len()].copy_from_slice(src);

                if write_through {
                    // The whole block goes down, so it is clean again.
                    let base = block_base(self.block_size_log2, address);
                    lower.write(&block.data, base, true);
                    block.dirty = false;
                } else {
                    block.dirty = true;
                }
            }
            None => {
                // Write-through with no block here: the write percolates
                // down unchanged without disturbing this level.
                lower.write(src, address, true);
            }
        }
    }

    /// Writes back every dirty block and invalidates the whole cache.
    pub fn flush(&mut self, lower: &mut dyn Backend) {
        let block_size_log2 = self.block_size_log2;
        for set in &mut self.sets {
            for block in &mut set.blocks {
                free_and_flush(block, block_size_log2, lower);
            }
        }
    }

    /// Returns whether `address` currently hits in this cache.
    ///
    /// Purely observational: no counters move and no recency is stamped.
    pub fn contains(&self, address: u64) -> bool {
        let set_index = self.set_index(address);
        let tag = address >> self.block_size_log2;
        self.sets[set_index]
            .blocks
            .iter()
            .any(|b| b.valid && b.tag == tag)
    }

    /// Returns the hit/miss counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }

    /// Returns this cache's position in the chain.
    pub fn level(&self) -> CacheLevel {
        self.level
    }

    /// Returns the block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Returns the associativity in ways.
    pub fn assoc(&self) -> u8 {
        self.assoc
    }

    /// Returns the number of sets.
    pub fn number_of_sets(&self) -> u64 {
        self.number_of_sets
    }

    /// Returns the observable state of every block, for invariant checks.
    pub fn snapshot(&self) -> Vec<BlockState> {
        self.sets
            .iter()
            .flat_map(|set| {
                set.blocks.iter().enumerate().map(|(way, b)| BlockState {
                    set: set.index,
                    way,
                    tag: b.tag,
                    valid: b.valid,
                    dirty: b.dirty,
                })
            })
            .collect()
    }

    fn set_index(&self, address: u64) -> usize {
        ((address >> self.block_size_log2) % self.number_of_sets) as usize
    }

    fn block_offset(&self, address: u64) -> usize {
        (address & u64::from(self.block_size - 1)) as usize
    }

    fn check_contained(&self, address: u64, len: usize) {
        debug_assert!(
            self.block_offset(address) + len <= self.block_size as usize,
            "access of {len} bytes at {address:#x} crosses a {}-byte block boundary",
            self.block_size
        );
    }

    /// Scans the set for a valid block with `tag`, accounting the access.
    ///
    /// A hit stamps the block's generation so LRU tracks true recency
    /// rather than allocation order.
    fn lookup(&mut self, set_index: usize, tag: u64) -> Option<usize> {
        let set = &mut self.sets[set_index];
        match set.blocks.iter().position(|b| b.valid && b.tag == tag) {
            Some(way) => {
                self.metrics.hits += 1;
                set.generation_counter += 1;
                set.blocks[way].generation = set.generation_counter;
                Some(way)
            }
            None => {
                self.metrics.misses += 1;
                None
            }
        }
    }

    /// Claims a block for `tag`, evicting per the replacement policy when
    /// the set is full. The returned block is valid, clean, and stamped.
    fn allocate(&mut self, lower: &mut dyn Backend, set_index: usize, tag: u64) -> usize {
        let block_size_log2 = self.block_size_log2;
        let policy = self.policy;
        let assoc = u64::from(self.assoc);
        let level = self.level;

        let set = &mut self.sets[set_index];
        let way = match set.blocks.iter().position(|b| !b.valid) {
            Some(free) => free,
            None => {
                let victim = match policy {
                    ReplacementPolicy::Lru => lru_victim(&set.blocks),
                    ReplacementPolicy::Mru => mru_victim(&set.blocks),
                    ReplacementPolicy::Random => (set.rng.advance() % assoc) as usize,
                };
                tracing::trace!(
                    cache = level.label(),
                    set = set.index,
                    way = victim,
                    dirty = set.blocks[victim].dirty,
                    "evicting block"
                );
                free_and_flush(&mut set.blocks[victim], block_size_log2, lower);
                victim
            }
        };

        {
            let block = &mut set.blocks[way];
            block.tag = tag;
            block.valid = true;
            block.dirty = false;
        }
        set.generation_counter += 1;
        set.blocks[way].generation = set.generation_counter;
        way
    }
}

/// Writes a dirty block back to the lower level and invalidates it.
///
/// The block's base address is rebuilt from its tag, which carries the full
/// high-order portion of the original address. Eviction write-backs are
/// never write-through: the line may still live in a lower cache.
fn free_and_flush(block: &mut Block, block_size_log2: u32, lower: &mut dyn Backend) {
    if block.dirty {
        let base = block.tag << block_size_log2;
        lower.write(&block.data, base, false);
    }
    // The data bytes stay as they are: an invalid block is never read
    // before a refill overwrites it.
    block.valid = false;
    block.dirty = false;
}

/// Picks the block with the minimum generation, ties to the lowest way.
fn lru_victim(blocks: &[Block]) -> usize {
    let mut victim = 0;
    let mut min_generation = blocks[0].generation;
    for (way, block) in blocks.iter().enumerate().skip(1) {
        if block.generation < min_generation {
            victim = way;
            min_generation = block.generation;
        }
    }
    victim
}

/// Picks the block with the maximum generation, ties to the lowest way.
fn mru_victim(blocks: &[Block]) -> usize {
    let mut victim = 0;
    let mut max_generation = blocks[0].generation;
    for (way, block) in blocks.iter().enumerate().skip(1) {
        if block.generation > max_generation {
            victim = way;
            max_generation = block.generation;
        }
    }
    victim
}
