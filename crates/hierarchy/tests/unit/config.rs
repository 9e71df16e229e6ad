//! Configuration Unit Tests.
//!
//! Defaults, JSON deserialization, and the raw-byte decoders used by the
//! sideband registers.

use memhier_core::config::{
    ChainConfig, Coord, ReplacementPolicy, TopologyConfig, WritePolicy,
};
use pretty_assertions::assert_eq;

/// The default configuration is a disabled chain over the stock topology.
#[test]
fn defaults_are_a_bare_chain() {
    let config = ChainConfig::default();

    assert!(!config.enable);
    assert!(!config.l1_enable);
    assert_eq!(config.write_policy, WritePolicy::WriteBack);
    assert_eq!(config.replacement_policy, ReplacementPolicy::Lru);
    assert_eq!(config.memory.mem_size, 0x8000);
    assert_eq!(config.memory.burst_length, 4);

    let topology = config.memory.topology;
    assert_eq!(
        (topology.channels, topology.ranks, topology.banks),
        (2, 4, 8)
    );
    assert_eq!((topology.rows, topology.column_width), (1024, 1024));
    assert_eq!(topology.order[0], Coord::Column);
    assert_eq!(topology.order[4], Coord::Channel);
}

/// A full configuration deserializes from JSON with partial fields
/// falling back to defaults.
#[test]
fn deserializes_from_json() {
    let json = r#"{
        "enable": true,
        "l1_enable": true,
        "write_policy": "WRITETHROUGH",
        "replacement_policy": "MRU",
        "il1": { "enable": true, "size": 8192, "assoc": 2, "block_size": 32 },
        "dl1": { "enable": true, "size": 8192, "assoc": 2, "block_size": 32 },
        "l2":  { "enable": true, "size": 65536 },
        "memory": {
            "mem_size": 65536,
            "topology": { "channels": 4, "rows": 2048 },
            "burst_length": 8
        }
    }"#;

    let config: ChainConfig = serde_json::from_str(json).unwrap();
    assert!(config.enable);
    assert_eq!(config.write_policy, WritePolicy::WriteThrough);
    assert_eq!(config.replacement_policy, ReplacementPolicy::Mru);
    assert_eq!(config.il1.block_size, 32);
    assert_eq!(config.l2.size, 65536);
    assert_eq!(config.l2.assoc, 1, "unspecified fields take defaults");
    assert_eq!(config.memory.topology.channels, 4);
    assert_eq!(config.memory.topology.ranks, 4, "default rank count");
    assert_eq!(config.memory.burst_length, 8);
    assert!(!config.l3.enable);
}

/// A custom coordinate order deserializes positionally.
#[test]
fn deserializes_coordinate_order() {
    let json = r#"{
        "channels": 2,
        "order": ["Column", "Channel", "Row", "Bank", "Rank"]
    }"#;
    let topology: TopologyConfig = serde_json::from_str(json).unwrap();
    assert_eq!(topology.order[1], Coord::Channel);
    assert_eq!(topology.order[4], Coord::Rank);
}

/// The sideband encodings: RANDOM=0, LRU=1, MRU=2, everything else
/// rejected; write policy 0 is write-back, nonzero write-through.
#[test]
fn raw_decoders_match_the_register_encoding() {
    assert_eq!(ReplacementPolicy::from_raw(0), Some(ReplacementPolicy::Random));
    assert_eq!(ReplacementPolicy::from_raw(1), Some(ReplacementPolicy::Lru));
    assert_eq!(ReplacementPolicy::from_raw(2), Some(ReplacementPolicy::Mru));
    assert_eq!(ReplacementPolicy::from_raw(3), None);
    assert_eq!(ReplacementPolicy::from_raw(0xFF), None);

    assert_eq!(WritePolicy::from_raw(0), WritePolicy::WriteBack);
    assert_eq!(WritePolicy::from_raw(1), WritePolicy::WriteThrough);
    assert_eq!(WritePolicy::from_raw(0x80), WritePolicy::WriteThrough);

    assert_eq!(Coord::from_raw(0), Some(Coord::Channel));
    assert_eq!(Coord::from_raw(4), Some(Coord::Column));
    assert_eq!(Coord::from_raw(5), None);
}
