//! Per-visitor batching of region live-byte increments.
//!
//! Marking records the size of every claimed object against its region.
//! Incrementing the shared atomic counter once per object contends badly when
//! many workers mark the same regions, so each visitor keeps a small
//! direct-mapped cache of pending increments. An entry is written back when a
//! different region hashes to its index and when the cache is flushed.

use std::ptr;

use crate::region::Region;

/// Number of cache entries. Must be a power of two.
pub const LIVE_BYTES_CACHE_ENTRIES: usize = 128;
const ENTRIES_MASK: usize = LIVE_BYTES_CACHE_ENTRIES - 1;
const _: () = assert!(LIVE_BYTES_CACHE_ENTRIES.is_power_of_two());

type Entry<'r> = Option<(&'r Region, usize)>;

/// Direct-mapped cache of pending live-byte increments.
///
/// Pending bytes are written back on eviction, on [`flush`](Self::flush) and
/// on drop, so the sum recorded per region is exact once the cache is gone.
pub struct LiveBytesCache<'r> {
    entries: Box<[Entry<'r>; LIVE_BYTES_CACHE_ENTRIES]>,
}

impl<'r> LiveBytesCache<'r> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Box::new([None; LIVE_BYTES_CACHE_ENTRIES]),
        }
    }

    /// Record `bytes` live bytes on `region`.
    pub fn increment(&mut self, region: &'r Region, bytes: usize) {
        let entry = &mut self.entries[Self::index(region)];
        match entry {
            Some((cached, pending)) if ptr::eq(*cached, region) => *pending += bytes,
            Some((evicted, pending)) => {
                evicted.increment_live_bytes_atomically(*pending);
                *entry = Some((region, bytes));
            }
            None => *entry = Some((region, bytes)),
        }
    }

    /// Write every pending increment back to its region.
    ///
    /// Returns the number of bytes written back.
    pub fn flush(&mut self) -> usize {
        let mut flushed = 0;
        for entry in self.entries.iter_mut() {
            if let Some((region, pending)) = entry.take() {
                region.increment_live_bytes_atomically(pending);
                flushed += pending;
            }
        }
        flushed
    }

    /// Bytes recorded but not yet written back.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.entries.iter().flatten().map(|(_, pending)| pending).sum()
    }

    /// Number of occupied entries.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    fn index(region: &Region) -> usize {
        // Fibonacci hashing of the region address; low bits of the address
        // are alignment zeros and carry no information.
        let address = ptr::from_ref(region) as usize as u64;
        let hash = (address >> 4).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hash >> 32) as usize;
        index & ENTRIES_MASK
    }
}

impl Default for LiveBytesCache<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LiveBytesCache<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for LiveBytesCache<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveBytesCache")
            .field("occupied", &self.occupied())
            .field("pending_bytes", &self.pending_bytes())
            .finish()
    }
}
