//! Memory Controller Unit Tests.
//!
//! Counts the DDR command streams the controller emits (activations,
//! first-word reads/writes, burst continuations) and checks transfer
//! segmentation across burst and channel boundaries, bank switching, and
//! the sub-word residue handling.

use crate::common::{DRAM_PATTERN, two_channel_topology};
use memhier_core::Backend;
use memhier_core::config::MemoryConfig;
use memhier_core::mem::MemoryController;
use pretty_assertions::assert_eq;

fn default_controller() -> MemoryController {
    MemoryController::new(&MemoryConfig::default()).unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Burst composition
// ══════════════════════════════════════════════════════════

/// With burst length 4 and the column lowest, a 32-byte aligned read from
/// one (rank, bank, row) is exactly one Activate plus 4 word commands:
/// one Read and three continuations.
#[test]
fn aligned_burst_is_one_activate_four_words() {
    let mut controller = default_controller();

    let mut buf = [0u8; 32];
    controller.read(&mut buf, 64);

    assert_eq!(buf, [DRAM_PATTERN; 32]);
    let stats = controller.channel_stats(0).unwrap();
    assert_eq!(stats.activates, 1);
    assert_eq!(stats.reads, 1);
    assert_eq!(stats.read_bursts, 3);
    assert_eq!(stats.writes + stats.write_bursts, 0);
}

/// A longer transfer splits into bursts: 64 bytes is two segments of
/// four words each, under a single activation.
#[test]
fn long_transfer_splits_at_burst_boundaries() {
    let mut controller = default_controller();

    let mut buf = [0u8; 64];
    controller.read(&mut buf, 0);

    let stats = controller.channel_stats(0).unwrap();
    assert_eq!(stats.activates, 1, "same bank, one activation");
    assert_eq!(stats.reads, 2, "each segment opens with a Read");
    assert_eq!(stats.read_bursts, 6);
}

/// Revisiting a bank after using another re-activates it.
#[test]
fn bank_switch_reactivates() {
    let mut controller = default_controller();
    // Bank bits sit at offset 20 in the default topology.
    let bank1 = 1u64 << 20;

    let mut buf = [0u8; 8];
    controller.read(&mut buf, 0);
    controller.read(&mut buf, bank1);
    controller.read(&mut buf, 0);
    controller.read(&mut buf, 8);

    let stats = controller.channel_stats(0).unwrap();
    assert_eq!(stats.activates, 3, "two switches plus the initial activation");
}

// ══════════════════════════════════════════════════════════
// 2. Channel segmentation
// ══════════════════════════════════════════════════════════

/// The two-channel scenario: a 128-byte read starting 64 bytes before the
/// channel bit toggles issues one Activate per channel and 16 word
/// commands in total.
#[test]
fn read_across_channel_boundary() {
    let config = MemoryConfig {
        mem_size: 0x10000,
        mem_offset: 0,
        topology: two_channel_topology(),
        burst_length: 4,
    };
    let mut controller = MemoryController::new(&config).unwrap();

    let mut buf = [0u8; 128];
    controller.read(&mut buf, 4096 - 64);
    assert_eq!(buf, [DRAM_PATTERN; 128]);

    let ch0 = *controller.channel_stats(0).unwrap();
    let ch1 = *controller.channel_stats(1).unwrap();
    assert_eq!(ch0.activates, 1);
    assert_eq!(ch1.activates, 1);
    assert_eq!(ch0.data_words() + ch1.data_words(), 16);
    assert_eq!((ch0.reads, ch0.read_bursts), (2, 6));
    assert_eq!((ch1.reads, ch1.read_bursts), (2, 6));
}

/// Writes across the same boundary land in both channels and read back
/// intact.
#[test]
fn write_across_channel_boundary_roundtrips() {
    let config = MemoryConfig {
        mem_size: 0x10000,
        mem_offset: 0,
        topology: two_channel_topology(),
        burst_length: 4,
    };
    let mut controller = MemoryController::new(&config).unwrap();

    let src: Vec<u8> = (0..128u32).map(|i| i as u8).collect();
    controller.write(&src, 4096 - 64, false);

    let mut buf = vec![0u8; 128];
    controller.read(&mut buf, 4096 - 64);
    assert_eq!(buf, src);

    assert!(controller.channel_stats(0).unwrap().writes >= 1);
    assert!(controller.channel_stats(1).unwrap().writes >= 1);
}

// ══════════════════════════════════════════════════════════
// 3. Sub-word residues
// ══════════════════════════════════════════════════════════

/// A narrow unaligned write (the write-through no-allocate residue)
/// merges into the containing bus word without touching the neighbours.
#[test]
fn subword_write_merges_into_the_word() {
    let mut controller = default_controller();

    controller.write(&[0xAA, 0xBB], 10, false);

    let mut word = [0u8; 8];
    controller.peek(8, &mut word);
    assert_eq!(
        word,
        [
            DRAM_PATTERN,
            DRAM_PATTERN,
            0xAA,
            0xBB,
            DRAM_PATTERN,
            DRAM_PATTERN,
            DRAM_PATTERN,
            DRAM_PATTERN
        ]
    );
}

/// A sub-word read copies out only the overlap of the fetched word.
#[test]
fn subword_read_extracts_the_overlap() {
    let mut controller = default_controller();

    controller.write(&[1, 2, 3, 4, 5, 6, 7, 8], 16, false);

    let mut buf = [0u8; 3];
    controller.read(&mut buf, 19);
    assert_eq!(buf, [4, 5, 6]);
}

/// An unaligned span covering parts of two words round-trips.
#[test]
fn straddling_write_roundtrips() {
    let mut controller = default_controller();

    let src = [0x10, 0x20, 0x30, 0x40];
    controller.write(&src, 30, false);

    let mut buf = [0u8; 4];
    controller.read(&mut buf, 30);
    assert_eq!(buf, src);

    // Neighbours on both sides keep the pattern.
    let mut around = [0u8; 12];
    controller.peek(28, &mut around);
    assert_eq!(&around[..2], &[DRAM_PATTERN; 2]);
    assert_eq!(&around[2..6], &src);
    assert_eq!(&around[6..], &[DRAM_PATTERN; 6]);
}

// ══════════════════════════════════════════════════════════
// 4. Peek
// ══════════════════════════════════════════════════════════

/// `peek` sees exactly what the command path wrote, without emitting
/// commands of its own.
#[test]
fn peek_matches_the_command_path() {
    let mut controller = default_controller();

    let src: Vec<u8> = (0..32u32).map(|i| (i * 3) as u8).collect();
    controller.write(&src, 0x400, false);
    let words_after_write = controller.channel_stats(0).unwrap().data_words();

    let mut buf = vec![0u8; 32];
    controller.peek(0x400, &mut buf);
    assert_eq!(buf, src);
    assert_eq!(
        controller.channel_stats(0).unwrap().data_words(),
        words_after_write,
        "peek must not emit commands"
    );
}
