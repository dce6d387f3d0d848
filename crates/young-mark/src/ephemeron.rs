//! Registry of ephemeron tables seen during marking.
//!
//! Marking visits only the value slots of an ephemeron table and records the
//! table here. Key liveness is resolved afterwards by a separate fixed-point
//! pass that drains the registry. A table is registered at most once per cycle
//! because its body is only visited by the worker that claimed it.

use crossbeam::queue::SegQueue;

use crate::object::ObjectRef;

/// Shared, append-only list of ephemeron tables.
#[derive(Debug, Default)]
pub struct EphemeronTableList {
    tables: SegQueue<ObjectRef>,
}

impl EphemeronTableList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one registered table.
    pub fn pop(&self) -> Option<ObjectRef> {
        self.tables.pop()
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Take every registered table.
    pub fn drain(&self) -> Vec<ObjectRef> {
        std::iter::from_fn(|| self.tables.pop()).collect()
    }
}

/// A worker's buffered view of the [`EphemeronTableList`].
#[derive(Debug)]
pub struct LocalEphemeronTableList<'l> {
    shared: &'l EphemeronTableList,
    buffer: Vec<ObjectRef>,
}

impl<'l> LocalEphemeronTableList<'l> {
    /// Create a local view.
    #[must_use]
    pub const fn new(shared: &'l EphemeronTableList) -> Self {
        Self {
            shared,
            buffer: Vec::new(),
        }
    }

    /// Register `table`.
    pub fn push(&mut self, table: ObjectRef) {
        debug_assert!(
            !self.buffer.contains(&table),
            "{table:?} registered twice by one worker"
        );
        self.buffer.push(table);
    }

    /// Number of buffered tables.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Move buffered tables to the shared list.
    pub fn publish(&mut self) {
        for table in self.buffer.drain(..) {
            self.shared.tables.push(table);
        }
    }
}

impl Drop for LocalEphemeronTableList<'_> {
    fn drop(&mut self) {
        self.publish();
    }
}
