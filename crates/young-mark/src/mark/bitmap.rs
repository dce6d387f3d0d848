//! Mark bitmap for region-level object marking.
//!
//! One bit per word-sized unit of a region. Setting a bit is the claim that
//! grants a single worker ownership of an object for the current cycle.

#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A region-level bitmap recording which objects were claimed this cycle.
///
/// # Example
///
/// ```
/// use young_mark::mark::MarkBitmap;
///
/// let bitmap = MarkBitmap::new(512);
/// assert_eq!(bitmap.capacity(), 512);
/// assert!(!bitmap.is_marked(0));
///
/// assert!(bitmap.try_mark(0));
/// assert!(!bitmap.try_mark(0));
/// assert!(bitmap.is_marked(0));
/// ```
#[derive(Debug)]
pub struct MarkBitmap {
    /// Bitmap storage, one bit per word.
    bitmap: Box<[AtomicU64]>,
    /// Number of words covered.
    capacity: usize,
    /// Number of set bits.
    marked_count: AtomicUsize,
}

impl MarkBitmap {
    /// Create a new mark bitmap covering `capacity` words.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a multiple of 64.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity % 64 == 0,
            "MarkBitmap capacity must be aligned to 64"
        );
        let bitmap = (0..capacity / 64).map(|_| AtomicU64::new(0)).collect();
        Self {
            bitmap,
            capacity,
            marked_count: AtomicUsize::new(0),
        }
    }

    /// Number of words covered.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of set bits.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.marked_count.load(Ordering::Relaxed)
    }

    /// Atomically set the bit at `index`.
    ///
    /// Returns `true` only for the single caller that flipped the bit from
    /// clear to set. Every other caller, racing or late, gets `false`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    pub fn try_mark(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        let prev = self.bitmap[word].fetch_or(mask, Ordering::AcqRel);
        if prev & mask == 0 {
            self.marked_count.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Whether the bit at `index` is set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    #[must_use]
    pub fn is_marked(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.bitmap[word].load(Ordering::Acquire) & mask != 0
    }

    /// Clear all marks for the next cycle.
    pub fn clear(&self) {
        for word in &*self.bitmap {
            word.store(0, Ordering::Relaxed);
        }
        self.marked_count.store(0, Ordering::Relaxed);
    }

    const fn locate(index: usize) -> (usize, u64) {
        (index / 64, 1u64 << (index % 64))
    }
}
