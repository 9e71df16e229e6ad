//! Memory Channel Unit Tests.
//!
//! Drives the per-channel state machine with hand-built DDR messages:
//! activation latching, burst column advance, coordinate masking, the
//! precharge no-op, and the out-of-range diagnostics.

use memhier_core::config::TopologyConfig;
use memhier_core::mem::ddr::{DdrCommand, DdrMessage};
use memhier_core::mem::{MemoryChannel, Topology};
use pretty_assertions::assert_eq;

/// Seeded pattern word: eight 0x69 bytes.
const PATTERN_WORD: u64 = 0x6969_6969_6969_6969;

fn channel() -> MemoryChannel {
    let topology = Topology::new(&TopologyConfig::default()).unwrap();
    MemoryChannel::new(&topology).unwrap()
}

fn activate(ba: u8, row: u16, rank: u8) -> DdrMessage {
    let mut msg = DdrMessage::new(DdrCommand::Activate);
    msg.pins.ba = ba;
    msg.pins.a = row;
    msg.pins.s = rank;
    msg
}

fn read_at(column: u16) -> DdrMessage {
    let mut msg = DdrMessage::new(DdrCommand::Read);
    msg.pins.a = column;
    msg
}

fn write_at(column: u16, dq: u64) -> DdrMessage {
    let mut msg = DdrMessage::new(DdrCommand::Write);
    msg.pins.a = column;
    msg.pins.dq = dq;
    msg
}

// ══════════════════════════════════════════════════════════
// 1. Basic command handling
// ══════════════════════════════════════════════════════════

/// A fresh region reads as the fill pattern.
#[test]
fn fresh_region_reads_pattern() {
    let mut ch = channel();
    assert_eq!(ch.execute(&activate(0, 0, 0)), 0);
    assert_eq!(ch.execute(&read_at(0)), PATTERN_WORD);
}

/// Write then read at the same column round-trips the word.
#[test]
fn write_read_roundtrip() {
    let mut ch = channel();
    let word = 0x0123_4567_89AB_CDEF;

    let _ = ch.execute(&activate(2, 7, 1));
    let _ = ch.execute(&write_at(64, word));
    assert_eq!(ch.execute(&read_at(64)), word);

    let stats = ch.stats();
    assert_eq!(stats.activates, 1);
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.reads, 1);
}

/// Burst continuations advance the column by one bus word per command.
#[test]
fn burst_continue_advances_column() {
    let mut ch = channel();
    let _ = ch.execute(&activate(0, 3, 0));

    // Write words at columns 32 and 40 via a burst.
    let _ = ch.execute(&write_at(32, 0x1111));
    let mut cont = DdrMessage::new(DdrCommand::WriteBurstContinue);
    cont.pins.dq = 0x2222;
    let _ = ch.execute(&cont);

    assert_eq!(ch.execute(&read_at(32)), 0x1111);
    let mut cont = DdrMessage::new(DdrCommand::ReadBurstContinue);
    cont.pins.a = 0xFFFF; // ignored: continues use the advanced column
    assert_eq!(ch.execute(&cont), 0x2222);

    let stats = ch.stats();
    assert_eq!(stats.write_bursts, 1);
    assert_eq!(stats.read_bursts, 1);
}

/// Precharge does nothing but count.
#[test]
fn precharge_is_a_counted_noop() {
    let mut ch = channel();
    let _ = ch.execute(&activate(0, 0, 0));
    let _ = ch.execute(&write_at(0, 0xAA));

    assert_eq!(ch.execute(&DdrMessage::new(DdrCommand::Precharge)), 0);
    assert_eq!(ch.execute(&read_at(0)), 0xAA, "precharge left the data alone");
    assert_eq!(ch.stats().precharges, 1);
}

// ══════════════════════════════════════════════════════════
// 2. Coordinate masking
// ══════════════════════════════════════════════════════════

/// Pin values wider than a dimension wrap through the mask: bank 9 of an
/// 8-bank rank is bank 1.
#[test]
fn coordinates_wrap_through_masks() {
    let mut ch = channel();

    let _ = ch.execute(&activate(9, 0, 0));
    let _ = ch.execute(&write_at(0, 0x5555));

    // The same cell through the in-range alias.
    let _ = ch.execute(&activate(1, 0, 0));
    assert_eq!(ch.execute(&read_at(0)), 0x5555);
}

/// A new activation replaces bank, row and rank at once.
#[test]
fn activate_replaces_all_registers() {
    let mut ch = channel();

    let _ = ch.execute(&activate(3, 100, 2));
    let _ = ch.execute(&write_at(8, 0xD00D));

    let _ = ch.execute(&activate(4, 200, 3));
    let _ = ch.execute(&write_at(8, 0xBEEF));

    let _ = ch.execute(&activate(3, 100, 2));
    assert_eq!(ch.execute(&read_at(8)), 0xD00D);

    let _ = ch.execute(&activate(4, 200, 3));
    assert_eq!(ch.execute(&read_at(8)), 0xBEEF);
}

// ══════════════════════════════════════════════════════════
// 3. Out-of-range diagnostics
// ══════════════════════════════════════════════════════════

/// A column beyond the row width (reachable only through faulted pins)
/// pushes the offset outside the region: reads return zero, writes are
/// dropped, and both are counted.
#[test]
fn out_of_range_reads_zero_and_drops_writes() {
    let mut ch = channel();

    // The very last cell of the region: rank 3, bank 7, row 1023.
    let _ = ch.execute(&activate(7, 1023, 3));
    // Column 0xFFF8 is far beyond the 1024-byte row width.
    assert_eq!(ch.execute(&read_at(0xFFF8)), 0);
    let _ = ch.execute(&write_at(0xFFF8, 0xFFFF));

    let stats = ch.stats();
    assert_eq!(stats.oob_reads, 1);
    assert_eq!(stats.oob_writes, 1);

    // In-range accesses on the same row still work.
    let _ = ch.execute(&write_at(0, 0x77));
    assert_eq!(ch.execute(&read_at(0)), 0x77);
}
