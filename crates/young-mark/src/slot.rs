//! Slot access for reference fields.
//!
//! Every reference field is an `AtomicUsize` holding a [`Tagged`] word. How a
//! slot is read depends on the marking mode: parallel marking races with the
//! running program and must use relaxed atomics, sequential marking runs in a
//! pause and reads the word directly.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::object::Tagged;

/// How slot words and type descriptors are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Relaxed atomic load; the slot may be written concurrently.
    Relaxed,
    /// Plain load; nobody writes the slot while marking.
    Plain,
}

/// A single reference field.
#[derive(Clone, Copy)]
pub struct Slot<'h> {
    cell: &'h AtomicUsize,
}

impl<'h> Slot<'h> {
    /// Wrap a field cell.
    #[must_use]
    pub const fn new(cell: &'h AtomicUsize) -> Self {
        Self { cell }
    }

    /// Load with a relaxed atomic read.
    #[must_use]
    pub fn relaxed_load(self) -> Tagged {
        Tagged::from_raw(self.cell.load(Ordering::Relaxed))
    }

    /// Load with a non-atomic read.
    ///
    /// # Safety
    ///
    /// No other thread may write this slot for the duration of the read.
    #[must_use]
    pub unsafe fn plain_load(self) -> Tagged {
        // SAFETY: The caller guarantees there are no concurrent writers, so
        // the non-atomic read cannot race.
        Tagged::from_raw(unsafe { self.cell.as_ptr().read() })
    }

    /// Load according to `mode`.
    ///
    /// # Safety
    ///
    /// With [`LoadMode::Plain`], no other thread may write this slot for the
    /// duration of the read.
    #[must_use]
    pub unsafe fn load(self, mode: LoadMode) -> Tagged {
        match mode {
            LoadMode::Relaxed => self.relaxed_load(),
            // SAFETY: Forwarded caller contract.
            LoadMode::Plain => unsafe { self.plain_load() },
        }
    }

    /// Overwrite the slot with an arbitrary word.
    pub fn relaxed_store(self, value: Tagged) {
        self.cell.store(value.raw(), Ordering::Relaxed);
    }

    /// Address of the slot, for identity comparisons.
    #[must_use]
    pub fn address(self) -> usize {
        self.cell.as_ptr() as usize
    }
}

impl std::fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("value", &self.relaxed_load())
            .finish()
    }
}

/// A contiguous run of reference fields belonging to one object.
#[derive(Clone, Copy, Debug)]
pub struct Slots<'h> {
    cells: &'h [AtomicUsize],
}

impl<'h> Slots<'h> {
    /// Wrap a field array.
    #[must_use]
    pub const fn new(cells: &'h [AtomicUsize]) -> Self {
        Self { cells }
    }

    /// An empty run.
    #[must_use]
    pub const fn empty() -> Self {
        Self { cells: &[] }
    }

    /// Number of slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether there are no slots.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Slot at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Slot<'h>> {
        self.cells.get(index).map(Slot::new)
    }

    /// The half-open sub-range `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds or `start > end`.
    #[must_use]
    pub fn range(&self, start: usize, end: usize) -> Self {
        Self {
            cells: &self.cells[start..end],
        }
    }

    /// Iterate over the slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Slot<'h>> + 'h {
        self.cells.iter().map(Slot::new)
    }
}
