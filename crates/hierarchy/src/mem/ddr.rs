//! The simplified DDR message model.
//!
//! A very reduced, functional rendition of the command set a real DDR
//! device understands: just enough structure that stuck wires have
//! something to act on. A message is a command kind plus the levels the
//! controller drives onto each pin group.

/// Kind of a DDR command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdrCommand {
    /// Latch a (bank, row, rank) into the channel's sense amplifiers.
    Activate,
    /// Read the first bus word of a burst at an explicit column.
    Read,
    /// Write the first bus word of a burst at an explicit column.
    Write,
    /// Read the next bus word at the channel's advanced column.
    ReadBurstContinue,
    /// Write the next bus word at the channel's advanced column.
    WriteBurstContinue,
    /// Close the open row. A no-op in this functional model.
    Precharge,
}

/// Levels driven on the pins of a channel for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinLevels {
    /// DQ0-63: the data bus word.
    pub dq: u64,
    /// A0-15: row on Activate, column on Read/Write.
    pub a: u16,
    /// BA0-7: bank address.
    pub ba: u8,
    /// S0-7: chip select (rank).
    pub s: u8,
}

/// One DDR command with its pin payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrMessage {
    /// Command kind.
    pub kind: DdrCommand,
    /// Pin payload.
    pub pins: PinLevels,
}

impl DdrMessage {
    /// Creates a message of the given kind with all pins low.
    pub fn new(kind: DdrCommand) -> Self {
        Self {
            kind,
            pins: PinLevels::default(),
        }
    }
}
