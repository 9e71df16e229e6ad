//! Pin-level fault injection.
//!
//! A fault model is a pair of masks per pin group: `pullups` names the pins
//! shorted high, `pulldowns` the pins shorted low. Application is
//! `(levels | pullups) & !pulldowns`, so a pin configured both ways is
//! driven low, and applying the model twice is the same as applying it
//! once.
//!
//! Each channel carries its own model: the faults being studied live on
//! the per-channel traces.

use super::ddr::DdrMessage;

/// Pull-up/pull-down masks for the four pin groups of a channel.
///
/// The default value is the identity model (no stuck pins).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultModel {
    /// DQ pins shorted high.
    pub dq_pullups: u64,
    /// DQ pins shorted low.
    pub dq_pulldowns: u64,
    /// A pins shorted high.
    pub a_pullups: u16,
    /// A pins shorted low.
    pub a_pulldowns: u16,
    /// BA pins shorted high.
    pub ba_pullups: u8,
    /// BA pins shorted low.
    pub ba_pulldowns: u8,
    /// S pins shorted high.
    pub s_pullups: u8,
    /// S pins shorted low.
    pub s_pulldowns: u8,
}

impl FaultModel {
    /// Size of the packed guest-visible register image in bytes.
    pub const IMAGE_LEN: usize = 24;

    /// Returns whether this model leaves every pin alone.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the model to every pin group of a message in place.
    pub fn apply_to_message(&self, msg: &mut DdrMessage) {
        msg.pins.dq = (msg.pins.dq | self.dq_pullups) & !self.dq_pulldowns;
        msg.pins.a = (msg.pins.a | self.a_pullups) & !self.a_pulldowns;
        msg.pins.ba = (msg.pins.ba | self.ba_pullups) & !self.ba_pulldowns;
        msg.pins.s = (msg.pins.s | self.s_pullups) & !self.s_pulldowns;
    }

    /// Applies only the DQ masks to a returned data word.
    pub fn apply_to_word(&self, word: u64) -> u64 {
        (word | self.dq_pullups) & !self.dq_pulldowns
    }

    /// Serializes the model to its packed register image.
    ///
    /// Layout (little-endian fields): `dq_pullups`@0, `dq_pulldowns`@8,
    /// `a_pullups`@16, `a_pulldowns`@18, `ba_pullups`@20,
    /// `ba_pulldowns`@21, `s_pullups`@22, `s_pulldowns`@23.
    pub fn to_image(&self) -> [u8; Self::IMAGE_LEN] {
        let mut image = [0u8; Self::IMAGE_LEN];
        image[0..8].copy_from_slice(&self.dq_pullups.to_le_bytes());
        image[8..16].copy_from_slice(&self.dq_pulldowns.to_le_bytes());
        image[16..18].copy_from_slice(&self.a_pullups.to_le_bytes());
        image[18..20].copy_from_slice(&self.a_pulldowns.to_le_bytes());
        image[20] = self.ba_pullups;
        image[21] = self.ba_pulldowns;
        image[22] = self.s_pullups;
        image[23] = self.s_pulldowns;
        image
    }

    /// Rebuilds a model from its packed register image.
    pub fn from_image(image: &[u8; Self::IMAGE_LEN]) -> Self {
        let u64_at = |off: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&image[off..off + 8]);
            u64::from_le_bytes(bytes)
        };
        let u16_at = |off: usize| u16::from_le_bytes([image[off], image[off + 1]]);
        Self {
            dq_pullups: u64_at(0),
            dq_pulldowns: u64_at(8),
            a_pullups: u16_at(16),
            a_pulldowns: u16_at(18),
            ba_pullups: image[20],
            ba_pulldowns: image[21],
            s_pullups: image[22],
            s_pulldowns: image[23],
        }
    }
}
