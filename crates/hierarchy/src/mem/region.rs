//! Raw backing region allocation for channels.
//!
//! Each memory channel owns one contiguous backing region sized to its
//! share of the topology. On Unix the region is an anonymous `mmap`, so
//! pages are committed lazily by the host kernel and a large topology
//! costs only what the guest actually touches; elsewhere it falls back to
//! a `Vec` allocation.

use crate::common::SetupError;
use std::slice;

/// A contiguous, owned byte region backing one memory channel.
pub struct ChannelRegion {
    ptr: *mut u8,
    size: usize,
    is_mmap: bool,
}

// SAFETY: the region is exclusively owned; the raw pointer never escapes
// except through the borrow-checked accessors below.
unsafe impl Send for ChannelRegion {}
// SAFETY: as above; shared access only hands out shared slices.
unsafe impl Sync for ChannelRegion {}

impl ChannelRegion {
    /// Allocates a zero-filled region of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::RegionAllocation`] when the host refuses the
    /// allocation.
    pub fn new(size: usize) -> Result<Self, SetupError> {
        #[cfg(unix)]
        {
            use std::ptr;
            // SAFETY: anonymous private mapping with no address hint; the
            // result is checked against MAP_FAILED before use.
            let ptr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };

            if ptr == libc::MAP_FAILED {
                return Err(SetupError::RegionAllocation {
                    size,
                    source: std::io::Error::last_os_error(),
                });
            }

            Ok(Self {
                ptr: ptr.cast::<u8>(),
                size,
                is_mmap: true,
            })
        }

        #[cfg(not(unix))]
        {
            let mut vec = vec![0u8; size];
            let ptr = vec.as_mut_ptr();
            std::mem::forget(vec);
            Ok(Self {
                ptr,
                size,
                is_mmap: false,
            })
        }
    }

    /// Returns the size of the region in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Overwrites the whole region with `pattern`.
    pub fn fill(&mut self, pattern: u8) {
        // SAFETY: the region owns `size` writable bytes at `ptr`.
        unsafe {
            std::ptr::write_bytes(self.ptr, pattern, self.size);
        }
    }

    /// Borrows `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics when the range leaves the region; callers bound-check first.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.size, "channel region read out of bounds");
        // SAFETY: the range was checked against the allocation above.
        unsafe { slice::from_raw_parts(self.ptr.add(offset), len) }
    }

    /// Reads the little-endian bus word at `offset`.
    pub fn read_word(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.slice(offset, 8));
        u64::from_le_bytes(bytes)
    }

    /// Writes a little-endian bus word at `offset`.
    pub fn write_word(&mut self, offset: usize, value: u64) {
        assert!(offset + 8 <= self.size, "channel region write out of bounds");
        // SAFETY: the range was checked against the allocation above.
        unsafe {
            std::ptr::copy_nonoverlapping(value.to_le_bytes().as_ptr(), self.ptr.add(offset), 8);
        }
    }
}

impl std::fmt::Debug for ChannelRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegion")
            .field("size", &self.size)
            .field("is_mmap", &self.is_mmap)
            .finish()
    }
}

impl Drop for ChannelRegion {
    fn drop(&mut self) {
        if self.is_mmap {
            #[cfg(unix)]
            // SAFETY: `ptr`/`size` describe exactly the mapping created in
            // `new`, unmapped once here.
            unsafe {
                libc::munmap(self.ptr.cast(), self.size);
            }
        } else {
            #[cfg(not(unix))]
            // SAFETY: reconstructs the Vec forgotten in `new` so its
            // destructor frees the allocation.
            unsafe {
                let _ = Vec::from_raw_parts(self.ptr, self.size, self.size);
            }
        }
    }
}
