//! DDR-style DRAM subsystem.
//!
//! This module models the memory side of the hierarchy. It provides:
//! 1. **Messages:** The simplified DDR command set exchanged between the
//!    controller and a channel.
//! 2. **Faults:** Pull-up/pull-down masks per pin group, applied to every
//!    command and every returned data word.
//! 3. **Channels:** One state machine and backing region per channel.
//! 4. **Controller:** Address decoding, transfer segmentation, and the
//!    per-channel command sequences.

/// Per-channel DDR state machine and backing store.
pub mod channel;

/// Memory controller: topology, decoding, segmentation, command driving.
pub mod controller;

/// The simplified DDR message model.
pub mod ddr;

/// Pin-level fault injection.
pub mod fault;

/// Raw backing region allocation for channels.
pub mod region;

pub use self::channel::MemoryChannel;
pub use self::controller::{MemoryController, Topology};
pub use self::ddr::{DdrCommand, DdrMessage, PinLevels};
pub use self::fault::FaultModel;
pub use self::region::ChannelRegion;
