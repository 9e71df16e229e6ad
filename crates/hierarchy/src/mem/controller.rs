//! Memory controller: topology, address decoding, and command driving.
//!
//! The controller is the floor of the cache chain. It provides:
//! 1. **Topology:** Validated dimension counts and the permutation mapping
//!    a linear address onto (channel, rank, bank, row, column).
//! 2. **Segmentation:** Splitting arbitrary transfers at burst boundaries
//!    and at the contiguity bound of the mapping.
//! 3. **Command sequences:** Activate-on-bank-switch plus word-by-word
//!    Read/Write bursts, every message and every returned data word passed
//!    through the owning channel's fault model.
//!
//! The chain's full-block traffic arrives 8-byte aligned in word
//! multiples; narrow residues forwarded by the write-through no-allocate
//! path are serviced with a fetch-merge-write of the containing bus word.

use super::channel::MemoryChannel;
use super::ddr::{DdrCommand, DdrMessage};
use super::fault::FaultModel;
use crate::chain::Backend;
use crate::common::{BUS_WIDTH, SetupError};
use crate::config::{Coord, MemoryConfig, TopologyConfig};
use crate::stats::ChannelStats;

/// Largest row or column dimension: indices must fit the 16 A pins.
const MAX_A_DIMENSION: u64 = 1 << 16;

/// Validated DRAM topology with derived widths.
#[derive(Debug, Clone)]
pub struct Topology {
    channels: u8,
    ranks: u8,
    banks: u8,
    rows: u32,
    column_width: u32,
    order: [Coord; 5],

    channels_log2: u32,
    ranks_log2: u32,
    banks_log2: u32,
    rows_log2: u32,
    column_width_log2: u32,
}

impl Topology {
    /// Validates a topology configuration and derives the bit widths.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] for dimensions that are not powers of two,
    /// dimensions too large for their pins, or an order that is not a
    /// permutation of the five coordinates.
    pub fn new(config: &TopologyConfig) -> Result<Self, SetupError> {
        let TopologyConfig {
            channels,
            ranks,
            banks,
            rows,
            column_width,
            order,
        } = *config;

        for (field, value) in [
            ("channels", u64::from(channels)),
            ("ranks", u64::from(ranks)),
            ("banks", u64::from(banks)),
            ("rows", u64::from(rows)),
            ("column width", u64::from(column_width)),
        ] {
            if !value.is_power_of_two() {
                return Err(SetupError::NotPowerOfTwo { field, value });
            }
        }
        if u64::from(rows) > MAX_A_DIMENSION {
            return Err(SetupError::DimensionTooLarge {
                field: "rows",
                max: MAX_A_DIMENSION,
            });
        }
        if u64::from(column_width) > MAX_A_DIMENSION {
            return Err(SetupError::DimensionTooLarge {
                field: "column width",
                max: MAX_A_DIMENSION,
            });
        }

        let mut seen = [false; 5];
        for coord in order {
            let slot = coord as usize;
            if seen[slot] {
                return Err(SetupError::BadCoordOrder);
            }
            seen[slot] = true;
        }

        Ok(Self {
            channels,
            ranks,
            banks,
            rows,
            column_width,
            order,
            channels_log2: channels.ilog2(),
            ranks_log2: ranks.ilog2(),
            banks_log2: banks.ilog2(),
            rows_log2: rows.ilog2(),
            column_width_log2: column_width.ilog2(),
        })
    }

    /// Number of channels.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Ranks per channel.
    pub fn ranks(&self) -> u8 {
        self.ranks
    }

    /// Banks per rank.
    pub fn banks(&self) -> u8 {
        self.banks
    }

    /// Rows per bank.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Row width in bytes.
    pub fn column_width(&self) -> u32 {
        self.column_width
    }

    /// The linear-to-coordinate mapping, lowest significance first.
    pub fn order(&self) -> [Coord; 5] {
        self.order
    }

    /// Bytes held by one channel.
    pub fn channel_bytes(&self) -> u64 {
        u64::from(self.ranks) * u64::from(self.banks) * u64::from(self.rows)
            * u64::from(self.column_width)
    }

    /// Bytes held by the whole topology.
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.channels) * self.channel_bytes()
    }

    /// Bit width of one coordinate.
    fn coord_log2(&self, coord: Coord) -> u32 {
        match coord {
            Coord::Channel => self.channels_log2,
            Coord::Rank => self.ranks_log2,
            Coord::Bank => self.banks_log2,
            Coord::Row => self.rows_log2,
            Coord::Column => self.column_width_log2,
        }
    }
}

/// Per-coordinate shift/mask pairs for address decoding.
#[derive(Debug, Clone, Copy, Default)]
struct CoordOffsets {
    channel_off: u32,
    rank_off: u32,
    bank_off: u32,
    row_off: u32,
    column_off: u32,

    channel_mask: u64,
    rank_mask: u64,
    bank_mask: u64,
    row_mask: u64,
    column_mask: u64,
}

impl CoordOffsets {
    /// Walks the coordinate order, accumulating a running bit offset.
    fn derive(topology: &Topology) -> Self {
        let mut offsets = Self::default();
        let mut shift = 0u32;
        for coord in topology.order {
            match coord {
                Coord::Channel => offsets.channel_off = shift,
                Coord::Rank => offsets.rank_off = shift,
                Coord::Bank => offsets.bank_off = shift,
                Coord::Row => offsets.row_off = shift,
                Coord::Column => offsets.column_off = shift,
            }
            shift += topology.coord_log2(coord);
        }

        offsets.channel_mask = (1u64 << topology.channels_log2) - 1;
        offsets.rank_mask = (1u64 << topology.ranks_log2) - 1;
        offsets.bank_mask = (1u64 << topology.banks_log2) - 1;
        offsets.row_mask = (1u64 << topology.rows_log2) - 1;
        offsets.column_mask = (1u64 << topology.column_width_log2) - 1;
        offsets
    }
}

/// Decoded coordinates of one linear address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Coords {
    channel: u8,
    rank: u8,
    bank: u8,
    row: u32,
    column: u64,
}

/// One channel as the controller sees it: the channel simulator, its fault
/// model, and the bank the controller believes is activated.
///
/// The controller-side bank record is deliberately separate from the
/// channel's own register: faults on the BA pins can make the two
/// disagree, which is exactly the class of glitch being modelled.
#[derive(Debug)]
struct Lane {
    fault: FaultModel,
    active_bank: Option<u8>,
    channel: MemoryChannel,
}

/// The memory controller terminating the cache chain.
#[derive(Debug)]
pub struct MemoryController {
    topology: Topology,
    offsets: CoordOffsets,
    lanes: Vec<Lane>,
    burst_length: u64,
}

impl MemoryController {
    /// Builds the controller: validates the configuration, derives the
    /// decode table, and allocates one pattern-filled lane per channel.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] on invalid geometry or when a channel
    /// region cannot be allocated.
    pub fn new(config: &MemoryConfig) -> Result<Self, SetupError> {
        let topology = Topology::new(&config.topology)?;

        if !config.burst_length.is_power_of_two() {
            return Err(SetupError::NotPowerOfTwo {
                field: "burst length",
                value: config.burst_length,
            });
        }
        let burst_bytes = BUS_WIDTH as u64 * config.burst_length;
        if u64::from(topology.column_width()) < burst_bytes {
            return Err(SetupError::ColumnTooNarrow {
                column_width: topology.column_width(),
                burst_bytes,
            });
        }
        if config.mem_size > topology.total_bytes() {
            return Err(SetupError::WindowExceedsTopology {
                requested: config.mem_size,
                available: topology.total_bytes(),
            });
        }

        let lanes = (0..topology.channels())
            .map(|_| {
                Ok(Lane {
                    fault: FaultModel::default(),
                    active_bank: None,
                    channel: MemoryChannel::new(&topology)?,
                })
            })
            .collect::<Result<Vec<_>, SetupError>>()?;

        let offsets = CoordOffsets::derive(&topology);
        tracing::debug!(
            channels = topology.channels(),
            ranks = topology.ranks(),
            banks = topology.banks(),
            rows = topology.rows(),
            column_width = topology.column_width(),
            burst_length = config.burst_length,
            "memory controller initialized"
        );

        Ok(Self {
            topology,
            offsets,
            lanes,
            burst_length: config.burst_length,
        })
    }

    /// Returns the validated topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns the configured burst length in bus words.
    pub fn burst_length(&self) -> u64 {
        self.burst_length
    }

    /// Returns the fault model of a channel.
    pub fn fault_model(&self, channel: usize) -> Option<&FaultModel> {
        self.lanes.get(channel).map(|lane| &lane.fault)
    }

    /// Returns the fault model of a channel for mutation.
    pub fn fault_model_mut(&mut self, channel: usize) -> Option<&mut FaultModel> {
        self.lanes.get_mut(channel).map(|lane| &mut lane.fault)
    }

    /// Returns the command statistics of a channel.
    pub fn channel_stats(&self, channel: usize) -> Option<&ChannelStats> {
        self.lanes.get(channel).map(|lane| lane.channel.stats())
    }

    /// Copies raw backing bytes for a linear address range.
    ///
    /// Diagnostics only: no commands are emitted and no fault model runs.
    /// Addresses beyond the topology wrap through the coordinate masks,
    /// exactly as the command path would decode them.
    pub fn peek(&self, address: u64, dst: &mut [u8]) {
        for (i, byte) in dst.iter_mut().enumerate() {
            let coords = self.decode(address + i as u64);
            let channel = &self.lanes[coords.channel as usize].channel;
            let offset =
                channel.byte_offset(coords.rank, coords.bank, coords.row, coords.column);
            *byte = channel.raw_slice(offset as usize, 1)[0];
        }
    }

    fn decode(&self, address: u64) -> Coords {
        let o = &self.offsets;
        Coords {
            channel: ((address >> o.channel_off) & o.channel_mask) as u8,
            rank: ((address >> o.rank_off) & o.rank_mask) as u8,
            bank: ((address >> o.bank_off) & o.bank_mask) as u8,
            row: ((address >> o.row_off) & o.row_mask) as u32,
            column: (address >> o.column_off) & o.column_mask,
        }
    }

    /// Bytes contiguously mapped by the lowest-significance coordinate.
    fn bound_bytes(&self) -> u64 {
        1u64 << self.topology.coord_log2(self.topology.order[0])
    }

    /// Bytes one segment may carry: a full burst when the column occupies
    /// the low address bits, a single bus word otherwise.
    fn segment_bytes(&self) -> u64 {
        if self.topology.order[0] == Coord::Column {
            BUS_WIDTH as u64 * self.burst_length
        } else {
            BUS_WIDTH as u64
        }
    }
}

impl Backend for MemoryController {
    fn read(&mut self, dst: &mut [u8], address: u64) {
        tracing::trace!(len = dst.len(), address, "memory read");
        let bound = self.bound_bytes();
        let burst = self.segment_bytes();

        let mut address = address;
        let mut done = 0usize;
        while done < dst.len() {
            let coords = self.decode(address);
            let remaining = (dst.len() - done) as u64;
            let step = remaining.min(burst).min(bound - (address % bound)) as usize;

            let lane = &mut self.lanes[coords.channel as usize];
            lane_read(lane, &coords, &mut dst[done..done + step]);

            address += step as u64;
            done += step;
        }
    }

    fn write(&mut self, src: &[u8], address: u64, _write_through: bool) {
        tracing::trace!(len = src.len(), address, "memory write");
        let bound = self.bound_bytes();
        let burst = self.segment_bytes();

        let mut address = address;
        let mut done = 0usize;
        while done < src.len() {
            let coords = self.decode(address);
            let remaining = (src.len() - done) as u64;
            let step = remaining.min(burst).min(bound - (address % bound)) as usize;

            let lane = &mut self.lanes[coords.channel as usize];
            lane_write(lane, &coords, &src[done..done + step]);

            address += step as u64;
            done += step;
        }
    }
}

/// Emits an Activate when the lane's tracked bank differs from the target.
fn activate_if_needed(lane: &mut Lane, coords: &Coords) {
    if lane.active_bank != Some(coords.bank) {
        let mut msg = DdrMessage::new(DdrCommand::Activate);
        msg.pins.ba = coords.bank;
        msg.pins.a = coords.row as u16;
        msg.pins.s = coords.rank;
        lane.fault.apply_to_message(&mut msg);
        let _ = lane.channel.execute(&msg);
        lane.active_bank = Some(coords.bank);
    }
}

/// Transfers one segment out of a lane, word by word.
///
/// The segment never crosses a burst or mapping boundary; the caller's
/// step computation guarantees it. Partial words fetch the containing
/// aligned word and copy out the overlap.
fn lane_read(lane: &mut Lane, coords: &Coords, dst: &mut [u8]) {
    activate_if_needed(lane, coords);

    let word_mask = !(BUS_WIDTH as u64 - 1);
    let start = coords.column;
    let end = start + dst.len() as u64;

    let mut column = start & word_mask;
    let mut first = true;
    while column < end {
        let kind = if first {
            DdrCommand::Read
        } else {
            DdrCommand::ReadBurstContinue
        };
        let mut msg = DdrMessage::new(kind);
        msg.pins.a = column as u16;
        msg.pins.s = coords.rank;
        lane.fault.apply_to_message(&mut msg);

        let word = lane.fault.apply_to_word(lane.channel.execute(&msg));

        // Byte-by-byte copy of the overlap, little-endian wire order.
        let bytes = word.to_le_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            let position = column + i as u64;
            if position >= start && position < end {
                dst[(position - start) as usize] = *byte;
            }
        }

        column += BUS_WIDTH as u64;
        first = false;
    }
}

/// Transfers one segment into a lane, word by word.
///
/// A word only partially covered by the source (the narrow residue of a
/// write-no-allocate forward) is fetched from the channel, merged, and
/// written back at an explicit column; fully covered words ride the
/// normal burst sequence.
fn lane_write(lane: &mut Lane, coords: &Coords, src: &[u8]) {
    activate_if_needed(lane, coords);

    let word_mask = !(BUS_WIDTH as u64 - 1);
    let start = coords.column;
    let end = start + src.len() as u64;

    let mut column = start & word_mask;
    let mut first = true;
    while column < end {
        let lo = column.max(start);
        let hi = (column + BUS_WIDTH as u64).min(end);
        let full = lo == column && hi == column + BUS_WIDTH as u64;

        let mut bytes = [0u8; BUS_WIDTH];
        if full {
            let at = (column - start) as usize;
            bytes.copy_from_slice(&src[at..at + BUS_WIDTH]);
        } else {
            let mut fetch = DdrMessage::new(DdrCommand::Read);
            fetch.pins.a = column as u16;
            fetch.pins.s = coords.rank;
            lane.fault.apply_to_message(&mut fetch);
            bytes = lane
                .fault
                .apply_to_word(lane.channel.execute(&fetch))
                .to_le_bytes();
            for position in lo..hi {
                bytes[(position - column) as usize] = src[(position - start) as usize];
            }
        }

        // Partial words re-specify the column: the merge fetch has already
        // advanced the channel's register past it.
        let kind = if first || !full {
            DdrCommand::Write
        } else {
            DdrCommand::WriteBurstContinue
        };
        let mut msg = DdrMessage::new(kind);
        msg.pins.a = column as u16;
        msg.pins.s = coords.rank;
        msg.pins.dq = u64::from_le_bytes(bytes);
        lane.fault.apply_to_message(&mut msg);
        let _ = lane.channel.execute(&msg);

        column += BUS_WIDTH as u64;
        first = false;
    }
}
