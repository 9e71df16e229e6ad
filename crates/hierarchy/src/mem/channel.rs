//! Per-channel DDR state machine and backing store.
//!
//! A channel interprets one DDR message at a time against its own backing
//! region. It keeps exactly the registers a burst needs: the activated
//! bank, the selected row and rank, and the current column. It does not
//! validate command ordering (a correct controller always activates
//! before it reads or writes), but it does bound-check the computed byte
//! offset, because fault injection on the address pins can push it outside
//! the region.

use super::controller::Topology;
use super::ddr::{DdrCommand, DdrMessage};
use super::region::ChannelRegion;
use crate::common::{BUS_WIDTH, SetupError};
use crate::stats::ChannelStats;

/// Pattern byte the backing store is seeded with.
///
/// Recognisable in dumps: a fresh region reads as `0x69` everywhere.
pub const FILL_PATTERN: u8 = 0x69;

/// One DDR channel: registers, statistics, and the backing region.
#[derive(Debug)]
pub struct MemoryChannel {
    region: ChannelRegion,

    banks: u32,
    rows: u32,
    column_width: u32,
    ranks_mask: u8,
    banks_mask: u8,
    rows_mask: u16,

    activated_bank: Option<u8>,
    selected_row: u16,
    selected_rank: u8,
    current_column: u64,

    stats: ChannelStats,
}

impl MemoryChannel {
    /// Allocates and pattern-fills the channel's share of the topology.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] when the backing region cannot be
    /// allocated.
    pub fn new(topology: &Topology) -> Result<Self, SetupError> {
        let mut region = ChannelRegion::new(topology.channel_bytes() as usize)?;
        region.fill(FILL_PATTERN);

        Ok(Self {
            region,
            banks: u32::from(topology.banks()),
            rows: topology.rows(),
            column_width: topology.column_width(),
            ranks_mask: topology.ranks() - 1,
            banks_mask: topology.banks() - 1,
            rows_mask: (topology.rows() - 1) as u16,
            activated_bank: None,
            selected_row: 0,
            selected_rank: 0,
            current_column: 0,
            stats: ChannelStats::default(),
        })
    }

    /// Interprets one DDR message and returns the data word it produces
    /// (zero for anything that is not a read).
    pub fn execute(&mut self, msg: &DdrMessage) -> u64 {
        match msg.kind {
            DdrCommand::Activate => {
                self.activated_bank = Some(msg.pins.ba & self.banks_mask);
                self.selected_row = msg.pins.a & self.rows_mask;
                self.selected_rank = msg.pins.s & self.ranks_mask;
                self.stats.activates += 1;
                0
            }
            DdrCommand::Read => {
                self.current_column = u64::from(msg.pins.a);
                self.stats.reads += 1;
                self.read_word()
            }
            DdrCommand::ReadBurstContinue => {
                self.stats.read_bursts += 1;
                self.read_word()
            }
            DdrCommand::Write => {
                self.current_column = u64::from(msg.pins.a);
                self.stats.writes += 1;
                self.write_word(msg.pins.dq);
                0
            }
            DdrCommand::WriteBurstContinue => {
                self.stats.write_bursts += 1;
                self.write_word(msg.pins.dq);
                0
            }
            DdrCommand::Precharge => {
                // No timing model, nothing to close.
                self.stats.precharges += 1;
                0
            }
        }
    }

    /// Returns the command statistics.
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Maps (rank, bank, row, column) to a byte offset in the region.
    ///
    /// The layout is rank-major: ranks hold banks hold rows, each row
    /// `column_width` bytes wide.
    pub(crate) fn byte_offset(&self, rank: u8, bank: u8, row: u32, column: u64) -> u64 {
        let row_index =
            (u64::from(rank) * u64::from(self.banks) + u64::from(bank)) * u64::from(self.rows)
                + u64::from(row);
        row_index * u64::from(self.column_width) + column
    }

    /// Borrows raw backing bytes, for diagnostics only.
    pub(crate) fn raw_slice(&self, offset: usize, len: usize) -> &[u8] {
        self.region.slice(offset, len)
    }

    fn register_offset(&self) -> u64 {
        debug_assert!(
            self.activated_bank.is_some(),
            "read/write before any activate"
        );
        let bank = self.activated_bank.unwrap_or(0);
        self.byte_offset(
            self.selected_rank,
            bank,
            u32::from(self.selected_row),
            self.current_column,
        )
    }

    fn read_word(&mut self) -> u64 {
        let offset = self.register_offset();
        let word = if offset + BUS_WIDTH as u64 <= self.region.len() as u64 {
            self.region.read_word(offset as usize)
        } else {
            self.stats.oob_reads += 1;
            tracing::warn!(offset, "read outside the channel region, returning zero");
            0
        };
        self.current_column += BUS_WIDTH as u64;
        word
    }

    fn write_word(&mut self, word: u64) {
        let offset = self.register_offset();
        if offset + BUS_WIDTH as u64 <= self.region.len() as u64 {
            self.region.write_word(offset as usize, word);
        } else {
            self.stats.oob_writes += 1;
            tracing::warn!(offset, "write outside the channel region, dropped");
        }
        self.current_column += BUS_WIDTH as u64;
    }
}
