//! Topology Unit Tests.
//!
//! Validation of dimension counts and the coordinate permutation, and the
//! observable effect of the linear-to-coordinate mapping on which channel
//! services an address.

use crate::common::two_channel_topology;
use memhier_core::Backend;
use memhier_core::common::SetupError;
use memhier_core::config::{Coord, MemoryConfig, TopologyConfig};
use memhier_core::mem::{MemoryController, Topology};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Validation
// ══════════════════════════════════════════════════════════

/// The default topology is valid and sizes multiply out.
#[test]
fn default_topology_sizes() {
    let topology = Topology::new(&TopologyConfig::default()).unwrap();
    assert_eq!(topology.channel_bytes(), 4 * 8 * 1024 * 1024);
    assert_eq!(topology.total_bytes(), 2 * topology.channel_bytes());
}

/// Non-power-of-two dimensions are rejected.
#[test]
fn rejects_non_power_of_two_dimensions() {
    let config = TopologyConfig {
        rows: 1000,
        ..TopologyConfig::default()
    };
    assert!(matches!(
        Topology::new(&config).unwrap_err(),
        SetupError::NotPowerOfTwo { field: "rows", .. }
    ));
}

/// Rows must fit the 16 A pins.
#[test]
fn rejects_rows_beyond_the_a_pins() {
    let config = TopologyConfig {
        rows: 1 << 17,
        ..TopologyConfig::default()
    };
    assert!(matches!(
        Topology::new(&config).unwrap_err(),
        SetupError::DimensionTooLarge { field: "rows", .. }
    ));
}

/// The order must be a permutation of the five coordinates.
#[test]
fn rejects_duplicate_coordinates() {
    let config = TopologyConfig {
        order: [
            Coord::Column,
            Coord::Column,
            Coord::Bank,
            Coord::Rank,
            Coord::Channel,
        ],
        ..TopologyConfig::default()
    };
    assert!(matches!(
        Topology::new(&config).unwrap_err(),
        SetupError::BadCoordOrder
    ));
}

/// A row narrower than one burst is rejected at the controller.
#[test]
fn rejects_column_narrower_than_a_burst() {
    let config = MemoryConfig {
        mem_size: 0,
        topology: TopologyConfig {
            column_width: 16,
            ..TopologyConfig::default()
        },
        burst_length: 4,
        ..MemoryConfig::default()
    };
    assert!(matches!(
        MemoryController::new(&config).unwrap_err(),
        SetupError::ColumnTooNarrow { .. }
    ));
}

/// A burst length that is not a power of two is rejected.
#[test]
fn rejects_bad_burst_length() {
    let config = MemoryConfig {
        burst_length: 3,
        ..MemoryConfig::default()
    };
    assert!(matches!(
        MemoryController::new(&config).unwrap_err(),
        SetupError::NotPowerOfTwo { field: "burst length", .. }
    ));
}

// ══════════════════════════════════════════════════════════
// 2. Mapping
// ══════════════════════════════════════════════════════════

/// With the channel bit just above the column bits, addresses 0 and 4096
/// land on different channels.
#[test]
fn channel_bit_splits_traffic() {
    let config = MemoryConfig {
        mem_size: 0x10000,
        mem_offset: 0,
        topology: two_channel_topology(),
        burst_length: 4,
    };
    let mut controller = MemoryController::new(&config).unwrap();

    controller.write(&[0xA1; 8], 0, false);
    controller.write(&[0xB2; 8], 4096, false);

    assert_eq!(controller.channel_stats(0).unwrap().writes, 1);
    assert_eq!(controller.channel_stats(1).unwrap().writes, 1);

    let mut buf = [0u8; 8];
    controller.read(&mut buf, 0);
    assert_eq!(buf, [0xA1; 8]);
    controller.read(&mut buf, 4096);
    assert_eq!(buf, [0xB2; 8]);
}

/// With the default order the channel occupies the top bits: the whole
/// first half of the space is channel 0.
#[test]
fn default_order_puts_channel_on_top() {
    let mut controller = MemoryController::new(&MemoryConfig::default()).unwrap();

    controller.write(&[1u8; 8], 0, false);
    controller.write(&[2u8; 8], 0x0200_0000, false);

    assert_eq!(controller.channel_stats(0).unwrap().writes, 1);
    assert_eq!(
        controller.channel_stats(1).unwrap().writes,
        1,
        "bit 25 is the channel bit for the 2×4×8×1024×1024 topology"
    );
}
