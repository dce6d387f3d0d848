//! Memory regions and their live-byte counters.
//!
//! A region is a contiguous address range holding objects of one generation.
//! Objects map to their region by address. Each region owns the atomic
//! live-byte counter that marking feeds and a mark bitmap for claims.

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;

use crate::mark::MarkBitmap;
use crate::object::{ObjectRef, TAGGED_SIZE};

/// Generation a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Newly allocated objects, collected by the minor cycle.
    Young,
    /// Survivors; out of scope for young-generation marking.
    Old,
}

/// A heap region.
#[derive(Debug)]
pub struct Region {
    id: usize,
    start: usize,
    size: usize,
    generation: Generation,
    /// Padded so that workers flushing different regions do not false-share.
    live_bytes: CachePadded<AtomicUsize>,
    marking_bitmap: MarkBitmap,
}

impl Region {
    /// Create a region covering `[start, start + size)`.
    ///
    /// # Panics
    ///
    /// Panics if `start` or `size` is not word aligned, or if the number of
    /// words in the region is not a multiple of 64.
    #[must_use]
    pub fn new(id: usize, start: usize, size: usize, generation: Generation) -> Self {
        assert!(
            start % TAGGED_SIZE == 0 && size % TAGGED_SIZE == 0,
            "Region bounds must be word aligned"
        );
        Self {
            id,
            start,
            size,
            generation,
            live_bytes: CachePadded::new(AtomicUsize::new(0)),
            marking_bitmap: MarkBitmap::new(size / TAGGED_SIZE),
        }
    }

    /// Region identifier.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// First address covered by the region.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Size of the region in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Generation of the region.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether the region holds young objects.
    #[must_use]
    pub fn is_young(&self) -> bool {
        self.generation == Generation::Young
    }

    /// Whether `object` lies inside this region.
    #[must_use]
    pub const fn contains(&self, object: ObjectRef) -> bool {
        let address = object.address();
        address >= self.start && address < self.start + self.size
    }

    /// Add `by` bytes to the live-byte counter.
    pub fn increment_live_bytes_atomically(&self, by: usize) {
        self.live_bytes.fetch_add(by, Ordering::Relaxed);
    }

    /// Current live-byte count.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Reset the live-byte counter for a new cycle.
    pub fn reset_live_bytes(&self) {
        self.live_bytes.store(0, Ordering::Relaxed);
    }

    /// Claim `object` for this cycle. `true` means the caller won the claim.
    ///
    /// # Panics
    ///
    /// Panics if `object` is outside the region.
    pub fn try_mark(&self, object: ObjectRef) -> bool {
        self.marking_bitmap.try_mark(self.bit_index(object))
    }

    /// Whether `object` has been claimed this cycle.
    ///
    /// # Panics
    ///
    /// Panics if `object` is outside the region.
    #[must_use]
    pub fn is_marked(&self, object: ObjectRef) -> bool {
        self.marking_bitmap.is_marked(self.bit_index(object))
    }

    /// Number of objects claimed in this region.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.marking_bitmap.marked_count()
    }

    /// Clear the mark bitmap for a new cycle.
    pub fn clear_marks(&self) {
        self.marking_bitmap.clear();
    }

    fn bit_index(&self, object: ObjectRef) -> usize {
        assert!(self.contains(object), "{object:?} is not in region {}", self.id);
        (object.address() - self.start) / TAGGED_SIZE
    }
}
