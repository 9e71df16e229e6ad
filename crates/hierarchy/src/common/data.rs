//! Bus-word conversions and address arithmetic.
//!
//! Everything below the cache chain moves data in 64-bit bus words; the
//! adapter above it deals in byte buffers. These helpers are the single
//! place where the two views meet, and they fix the wire byte order to
//! little-endian.

/// Width of the data bus in bytes (64-bit bus).
///
/// This is also the amount by which a channel advances its column register
/// per transferred word.
pub const BUS_WIDTH: usize = 8;

/// Converts a 64-bit bus word to its wire byte order (little-endian).
#[inline]
pub fn word_to_bytes(value: u64) -> [u8; BUS_WIDTH] {
    value.to_le_bytes()
}

/// Converts 8 wire bytes back to a 64-bit bus word.
#[inline]
pub fn word_from_bytes(bytes: &[u8; BUS_WIDTH]) -> u64 {
    u64::from_le_bytes(*bytes)
}

/// Returns the base address of the block containing `address`.
///
/// `block_size_log2` is the log₂ of the block size in bytes.
#[inline]
pub fn block_base(block_size_log2: u32, address: u64) -> u64 {
    (address >> block_size_log2) << block_size_log2
}
