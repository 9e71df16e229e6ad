//! Cache chain assembly.
//!
//! This module composes cache levels into the pipeline terminated by the
//! memory controller. It provides:
//! 1. **The `Backend` seam:** The lower-level read/write pair every level
//!    is written against, implemented by the controller and by the chain
//!    walker itself.
//! 2. **Assembly:** Wiring I-L1, D-L1, L2 and L3 according to which levels
//!    are enabled, with the controller as the floor.
//! 3. **Entry points:** Separate instruction and data ports that share the
//!    levels below L1.
//! 4. **Metrics:** Aggregation of per-level hit/miss counters in the fixed
//!    guest-visible order.
//!
//! The lower-level reference is a borrowed handle over the chain's own
//! storage, so its lifetime is bounded by the chain and nothing on the
//! request path allocates.

use crate::cache::Cache;
use crate::common::SetupError;
use crate::config::{ChainConfig, WritePolicy};
use crate::mem::MemoryController;
use crate::stats::{CacheLevel, ChainMetrics};

/// The lower-level interface a cache is composed against.
///
/// Implemented by the memory controller (the floor of every chain) and by
/// the chain walker that forwards to the next enabled level.
pub trait Backend {
    /// Reads `dst.len()` bytes at `address`.
    fn read(&mut self, dst: &mut [u8], address: u64);

    /// Writes `src.len()` bytes at `address`.
    ///
    /// `write_through` carries the chain's write policy; eviction
    /// write-backs pass `false` regardless of the policy.
    fn write(&mut self, src: &[u8], address: u64, write_through: bool);
}

/// Entry point selector: the instruction or the data side of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// The instruction fetch path, entering at I-L1.
    Instruction,
    /// The data path, entering at D-L1.
    Data,
}

/// The remainder of a chain below some level: zero or more caches and the
/// controller. Reads and writes enter at the first remaining cache, or at
/// the controller once the caches are exhausted.
struct Tail<'a> {
    caches: &'a mut [Cache],
    memory: &'a mut MemoryController,
}

impl Backend for Tail<'_> {
    fn read(&mut self, dst: &mut [u8], address: u64) {
        if let Some((first, rest)) = self.caches.split_first_mut() {
            let mut lower = Tail {
                caches: rest,
                memory: &mut *self.memory,
            };
            first.read(&mut lower, dst, address);
        } else {
            self.memory.read(dst, address);
        }
    }

    fn write(&mut self, src: &[u8], address: u64, write_through: bool) {
        if let Some((first, rest)) = self.caches.split_first_mut() {
            let mut lower = Tail {
                caches: rest,
                memory: &mut *self.memory,
            };
            first.write(&mut lower, src, address, write_through);
        } else {
            self.memory.write(src, address, write_through);
        }
    }
}

/// The assembled hierarchy: L1 pair, shared lower levels, controller.
#[derive(Debug)]
pub struct CacheChain {
    il1: Option<Cache>,
    dl1: Option<Cache>,
    /// Levels below L1 in order (L2 then L3), shared by both ports.
    shared: Vec<Cache>,
    memory: MemoryController,
    write_policy: WritePolicy,
}

impl CacheChain {
    /// Builds a chain from the flat configuration record.
    ///
    /// The `l1_enable` flag enables the I-L1/D-L1 pair together; L2 and L3
    /// follow their own enable bits; a cleared global `enable` bypasses
    /// every level. Replacing an existing chain with the result releases
    /// the old storage by drop.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] on invalid geometry, a block size that
    /// shrinks going down the chain, or allocation failure.
    pub fn new(config: &ChainConfig) -> Result<Self, SetupError> {
        let memory = MemoryController::new(&config.memory)?;
        let policy = config.replacement_policy;

        let l1_on = config.enable && config.l1_enable;
        let l2_on = config.enable && config.l2.enable;
        let l3_on = config.enable && config.l3.enable;

        let il1 = if l1_on {
            Some(Cache::new(CacheLevel::L1i, &config.il1, policy)?)
        } else {
            None
        };
        let dl1 = if l1_on {
            Some(Cache::new(CacheLevel::L1d, &config.dl1, policy)?)
        } else {
            None
        };

        let mut shared = Vec::new();
        if l2_on {
            shared.push(Cache::new(CacheLevel::L2, &config.l2, policy)?);
        }
        if l3_on {
            shared.push(Cache::new(CacheLevel::L3, &config.l3, policy)?);
        }

        // A refill transfers one full upper block; it must land inside a
        // single lower block, so block sizes may only grow going down.
        if let Some(lowest) = shared.first() {
            for l1 in il1.iter().chain(&dl1) {
                if l1.block_size() > lowest.block_size() {
                    return Err(SetupError::BlockSizeShrinks {
                        upper: l1.block_size(),
                        lower: lowest.block_size(),
                    });
                }
            }
        }
        for pair in shared.windows(2) {
            if pair[0].block_size() > pair[1].block_size() {
                return Err(SetupError::BlockSizeShrinks {
                    upper: pair[0].block_size(),
                    lower: pair[1].block_size(),
                });
            }
        }

        tracing::debug!(
            l1 = l1_on,
            l2 = l2_on,
            l3 = l3_on,
            write_policy = ?config.write_policy,
            replacement_policy = ?policy,
            "cache chain assembled"
        );

        Ok(Self {
            il1,
            dl1,
            shared,
            memory,
            write_policy: config.write_policy,
        })
    }

    /// Reads `dst.len()` bytes at `address` through one port.
    ///
    /// The range must not cross a block boundary of the entry cache; the
    /// adapter splits guest accesses that do.
    pub fn read(&mut self, port: Port, dst: &mut [u8], address: u64) {
        let Self {
            il1,
            dl1,
            shared,
            memory,
            ..
        } = self;
        let entry = match port {
            Port::Instruction => il1.as_mut(),
            Port::Data => dl1.as_mut(),
        };
        let mut tail = Tail {
            caches: shared.as_mut_slice(),
            memory,
        };
        match entry {
            Some(cache) => cache.read(&mut tail, dst, address),
            None => tail.read(dst, address),
        }
    }

    /// Writes `src.len()` bytes at `address` through one port.
    ///
    /// The chain's write policy supplies the write-through bit, forwarded
    /// unchanged down the chain.
    pub fn write(&mut self, port: Port, src: &[u8], address: u64) {
        let write_through = self.write_policy == WritePolicy::WriteThrough;
        let Self {
            il1,
            dl1,
            shared,
            memory,
            ..
        } = self;
        let entry = match port {
            Port::Instruction => il1.as_mut(),
            Port::Data => dl1.as_mut(),
        };
        let mut tail = Tail {
            caches: shared.as_mut_slice(),
            memory,
        };
        match entry {
            Some(cache) => cache.write(&mut tail, src, address, write_through),
            None => tail.write(src, address, write_through),
        }
    }

    /// Flushes every level top-down: dirty blocks are written back and all
    /// blocks invalidated, so DRAM afterwards holds every written byte.
    pub fn flush(&mut self) {
        let Self {
            il1,
            dl1,
            shared,
            memory,
            ..
        } = self;
        for l1 in il1.iter_mut().chain(dl1.iter_mut()) {
            let mut tail = Tail {
                caches: shared.as_mut_slice(),
                memory: &mut *memory,
            };
            l1.flush(&mut tail);
        }
        for i in 0..shared.len() {
            let (head, rest) = shared.split_at_mut(i + 1);
            let mut tail = Tail {
                caches: rest,
                memory: &mut *memory,
            };
            head[i].flush(&mut tail);
        }
    }

    /// Aggregates per-level counters in the fixed order
    /// [I-L1, D-L1, L2, L3]; disabled levels stay zero.
    pub fn metrics(&self) -> ChainMetrics {
        let mut metrics = ChainMetrics::default();
        for cache in self.il1.iter().chain(&self.dl1).chain(&self.shared) {
            metrics.levels[cache.level().slot()] = cache.metrics();
        }
        metrics
    }

    /// Returns the cache at `level`, if that level is enabled.
    pub fn cache(&self, level: CacheLevel) -> Option<&Cache> {
        match level {
            CacheLevel::L1i => self.il1.as_ref(),
            CacheLevel::L1d => self.dl1.as_ref(),
            CacheLevel::L2 | CacheLevel::L3 => {
                self.shared.iter().find(|cache| cache.level() == level)
            }
        }
    }

    /// Returns the block size of the entry cache of a port, or `None` when
    /// the port goes straight to the controller.
    pub fn entry_block_size(&self, port: Port) -> Option<u32> {
        let entry = match port {
            Port::Instruction => self.il1.as_ref(),
            Port::Data => self.dl1.as_ref(),
        };
        entry.or_else(|| self.shared.first()).map(Cache::block_size)
    }

    /// Returns the chain's write policy.
    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Returns the terminal memory controller.
    pub fn memory(&self) -> &MemoryController {
        &self.memory
    }

    /// Returns the terminal memory controller for mutation.
    pub fn memory_mut(&mut self) -> &mut MemoryController {
        &mut self.memory
    }
}
