//! Bus-Word Helper Tests.
//!
//! The wire byte order and the `to_bytes`/`from_bytes` round-trip laws.

use memhier_core::common::{block_base, word_from_bytes, word_to_bytes};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// The wire order is little-endian.
#[test]
fn wire_order_is_little_endian() {
    assert_eq!(
        word_to_bytes(0x1122_3344_5566_7788),
        [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
    assert_eq!(word_from_bytes(&[1, 0, 0, 0, 0, 0, 0, 0]), 1);
}

proptest! {
    /// from_bytes ∘ to_bytes is the identity on words.
    #[test]
    fn word_roundtrips(word: u64) {
        prop_assert_eq!(word_from_bytes(&word_to_bytes(word)), word);
    }

    /// to_bytes ∘ from_bytes is the identity on byte arrays.
    #[test]
    fn bytes_roundtrip(bytes: [u8; 8]) {
        prop_assert_eq!(word_to_bytes(word_from_bytes(&bytes)), bytes);
    }
}

/// The block base masks the intra-block offset.
#[test]
fn block_base_masks_the_offset() {
    assert_eq!(block_base(6, 0x7F), 0x40);
    assert_eq!(block_base(6, 0x40), 0x40);
    assert_eq!(block_base(3, 0x17), 0x10);
    assert_eq!(block_base(0, 0x17), 0x17);
}
