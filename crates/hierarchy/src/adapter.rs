//! Bit-level MMIO façade and sideband register decoders.
//!
//! This is the boundary the external device model talks to. It provides:
//! 1. **Memory window:** Guest reads/fetches/writes of up to one bus word,
//!    bounds-checked, split at entry-block boundaries, and converted
//!    between register values and wire bytes.
//! 2. **Config region:** The register layout that stages a configuration
//!    request and applies or flushes it.
//! 3. **Metrics region:** Read-only hit/miss pairs in the fixed level
//!    order.
//! 4. **Fault region:** Channel selection and pokes into the packed fault
//!    record of the selected channel.
//!
//! Malformed sideband writes are silently ignored (with a log line); the
//! request path never panics.

use crate::chain::{CacheChain, Port};
use crate::common::{BUS_WIDTH, SetupError, word_from_bytes, word_to_bytes};
use crate::config::{ChainConfig, ReplacementPolicy, WritePolicy};
use crate::mem::FaultModel;

/// Byte offset of the packed fault record within the fault region.
const FAULT_RECORD_BASE: u64 = 8;

/// The guest-facing adapter over one cache chain.
///
/// Owns the live chain plus the staged configuration request the config
/// region writes into. Applying the request drops the old chain (releasing
/// every backing region) before the new one is allocated; if the new
/// configuration is rejected the device stays inactive until reconfigured.
#[derive(Debug)]
pub struct MmioAdapter {
    chain: Option<CacheChain>,
    request: ChainConfig,
    selected_fault_channel: u8,
    mem_offset: u64,
    mem_size: u64,
}

impl MmioAdapter {
    /// Builds an adapter with an initial configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] when the initial configuration is invalid.
    pub fn new(config: ChainConfig) -> Result<Self, SetupError> {
        let chain = CacheChain::new(&config)?;
        let mem_offset = config.memory.mem_offset;
        let mem_size = config.memory.mem_size;
        Ok(Self {
            chain: Some(chain),
            request: config,
            selected_fault_channel: 0,
            mem_offset,
            mem_size,
        })
    }

    /// Guest data read of `size` bytes (at most one bus word).
    ///
    /// Out-of-window addresses read as zero.
    pub fn read(&mut self, address: u64, size: usize) -> u64 {
        let mut bytes = [0u8; BUS_WIDTH];
        let size = size.min(BUS_WIDTH);
        self.port_read(Port::Data, address, &mut bytes[..size]);
        word_from_bytes(&bytes)
    }

    /// Guest instruction fetch of `size` bytes (at most one bus word).
    pub fn fetch(&mut self, address: u64, size: usize) -> u64 {
        let mut bytes = [0u8; BUS_WIDTH];
        let size = size.min(BUS_WIDTH);
        self.port_read(Port::Instruction, address, &mut bytes[..size]);
        word_from_bytes(&bytes)
    }

    /// Guest data write of `size` bytes (at most one bus word).
    ///
    /// Out-of-window writes are dropped.
    pub fn write(&mut self, address: u64, value: u64, size: usize) {
        let bytes = word_to_bytes(value);
        let size = size.min(BUS_WIDTH);
        self.port_write(Port::Data, address, &bytes[..size]);
    }

    /// Read from the config region; it is write-only and returns zero.
    pub fn config_read(&self, _reg: u64, _size: usize) -> u64 {
        0
    }

    /// Write to the config region.
    ///
    /// Offsets 0–16 stage global fields or trigger apply/flush; the four
    /// 32-byte windows at 32/64/96/128 stage per-level geometry. Anything
    /// else is ignored.
    pub fn config_write(&mut self, reg: u64, value: u64, size: usize) {
        let value = truncate(value, size);
        match reg {
            0 => self.request.enable = (value & 0xff) == 1,
            1 => self.request.l1_enable = (value & 0xff) == 1,
            2 => self.apply(),
            3 => {
                if let Some(chain) = self.chain.as_mut() {
                    chain.flush();
                }
            }
            4 => self.request.memory.mem_size = value,
            8 => self.request.memory.mem_offset = value,
            12 => self.request.write_policy = WritePolicy::from_raw(value as u8),
            16 => match ReplacementPolicy::from_raw(value as u8) {
                Some(policy) => self.request.replacement_policy = policy,
                None => {
                    tracing::warn!(value, "unknown replacement policy, write ignored");
                }
            },
            32..=63 => level_field_write(&mut self.request.il1, reg - 32, value),
            64..=95 => level_field_write(&mut self.request.dl1, reg - 64, value),
            96..=127 => level_field_write(&mut self.request.l2, reg - 96, value),
            128..=159 => level_field_write(&mut self.request.l3, reg - 128, value),
            _ => tracing::debug!(reg, "config write to unmapped register ignored"),
        }
    }

    /// Read from the metrics region: `[hits, misses]` per level in the
    /// fixed order [I-L1, D-L1, L2, L3]. Other offsets read zero.
    pub fn metrics_read(&self, reg: u64, _size: usize) -> u64 {
        let Some(chain) = self.chain.as_ref() else {
            return 0;
        };
        let metrics = chain.metrics();
        let Some(level) = metrics.levels.get((reg / 16) as usize) else {
            return 0;
        };
        match reg % 16 {
            0 => level.hits,
            8 => level.misses,
            _ => 0,
        }
    }

    /// Read from the fault region; it is write-only and returns zero.
    pub fn fault_read(&self, _reg: u64, _size: usize) -> u64 {
        0
    }

    /// Write to the fault region.
    ///
    /// A 1-byte write at offset 0 selects the channel; offsets 8..32 poke
    /// the packed 24-byte fault record of the selected channel.
    pub fn fault_write(&mut self, reg: u64, value: u64, size: usize) {
        if size == 1 && reg == 0 {
            self.selected_fault_channel = value as u8;
            return;
        }

        let record_len = FaultModel::IMAGE_LEN as u64;
        if reg < FAULT_RECORD_BASE || reg + size as u64 > FAULT_RECORD_BASE + record_len {
            tracing::debug!(reg, size, "fault-config write outside the record ignored");
            return;
        }
        let Some(chain) = self.chain.as_mut() else {
            tracing::warn!("fault-config write before a valid configuration");
            return;
        };
        let channel = usize::from(self.selected_fault_channel);
        let Some(fault) = chain.memory_mut().fault_model_mut(channel) else {
            tracing::warn!(channel, "fault-config write to nonexistent channel ignored");
            return;
        };

        let offset = (reg - FAULT_RECORD_BASE) as usize;
        let len = size.min(BUS_WIDTH);
        let mut image = fault.to_image();
        image[offset..offset + len].copy_from_slice(&value.to_le_bytes()[..len]);
        *fault = FaultModel::from_image(&image);
    }

    /// Returns the live chain, if the device is configured.
    pub fn chain(&self) -> Option<&CacheChain> {
        self.chain.as_ref()
    }

    /// Returns the live chain for mutation, if the device is configured.
    pub fn chain_mut(&mut self) -> Option<&mut CacheChain> {
        self.chain.as_mut()
    }

    /// Returns the staged configuration request.
    pub fn request(&self) -> &ChainConfig {
        &self.request
    }

    /// Rebuilds the chain from the staged request.
    ///
    /// The old chain's storage is released before the new allocation; a
    /// rejected request leaves the device inactive and logs the reason.
    fn apply(&mut self) {
        self.chain = None;
        match CacheChain::new(&self.request) {
            Ok(chain) => {
                self.mem_offset = self.request.memory.mem_offset;
                self.mem_size = self.request.memory.mem_size;
                self.chain = Some(chain);
            }
            Err(err) => {
                tracing::error!(%err, "chain reconfiguration failed, device inactive");
            }
        }
    }

    fn in_window(&self, address: u64, len: usize) -> bool {
        address >= self.mem_offset && address + len as u64 <= self.mem_offset + self.mem_size
    }

    fn port_read(&mut self, port: Port, address: u64, dst: &mut [u8]) {
        if !self.in_window(address, dst.len()) {
            tracing::warn!(address, len = dst.len(), "read outside the memory window");
            return;
        }
        let offset = self.mem_offset;
        let Some(chain) = self.chain.as_mut() else {
            tracing::warn!("memory read before a valid configuration");
            return;
        };

        let mut linear = address - offset;
        match chain.entry_block_size(port) {
            Some(block) => {
                // Guest accesses may straddle a block boundary; the core
                // requires single-block ranges, so split here.
                let block = u64::from(block);
                let mut done = 0usize;
                while done < dst.len() {
                    let room = (block - (linear % block)) as usize;
                    let step = room.min(dst.len() - done);
                    chain.read(port, &mut dst[done..done + step], linear);
                    linear += step as u64;
                    done += step;
                }
            }
            // Straight to the controller, which services any span.
            None => chain.read(port, dst, linear),
        }
    }

    fn port_write(&mut self, port: Port, address: u64, src: &[u8]) {
        if !self.in_window(address, src.len()) {
            tracing::warn!(address, len = src.len(), "write outside the memory window dropped");
            return;
        }
        let offset = self.mem_offset;
        let Some(chain) = self.chain.as_mut() else {
            tracing::warn!("memory write before a valid configuration");
            return;
        };

        let mut linear = address - offset;
        match chain.entry_block_size(port) {
            Some(block) => {
                let block = u64::from(block);
                let mut done = 0usize;
                while done < src.len() {
                    let room = (block - (linear % block)) as usize;
                    let step = room.min(src.len() - done);
                    chain.write(port, &src[done..done + step], linear);
                    linear += step as u64;
                    done += step;
                }
            }
            None => chain.write(port, src, linear),
        }
    }
}

/// Masks a register value down to the guest access width.
fn truncate(value: u64, size: usize) -> u64 {
    match size {
        1 => value & 0xff,
        2 => value & 0xffff,
        4 => value & 0xffff_ffff,
        _ => value,
    }
}

/// Decodes one write into a 32-byte per-level config window.
///
/// Field layout mirrors the packed request record: enable@0, size@8,
/// assoc@16, `block_size`@24. Unaligned offsets are ignored.
fn level_field_write(level: &mut crate::config::CacheLevelConfig, offset: u64, value: u64) {
    match offset {
        0 => level.enable = (value & 0xff) == 1,
        8 => level.size = value,
        16 => level.assoc = value as u8,
        24 => level.block_size = value as u32,
        _ => tracing::debug!(offset, "unaligned cache-config write ignored"),
    }
}
