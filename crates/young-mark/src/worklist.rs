//! Marking worklists.
//!
//! The shared [`MarkingWorklist`] is a lock-free queue of fixed-size segments.
//! Each worker talks to it through a [`LocalMarkingWorklist`], which batches
//! pushes into a private segment and only touches the shared queue when a
//! segment fills up, when it runs dry, or when it is published.
//!
//! Embedder wrappers discovered while marking go to a separate
//! [`WrapperWorklist`] with the same publish discipline.

use std::mem;

use crossbeam::queue::SegQueue;

use crate::object::ObjectRef;

/// Objects per segment.
pub const SEGMENT_CAPACITY: usize = 64;

/// Shared queue of objects whose bodies still need visiting.
#[derive(Debug, Default)]
pub struct MarkingWorklist {
    segments: SegQueue<Vec<ObjectRef>>,
}

impl MarkingWorklist {
    /// Create an empty worklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no published segment is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of published segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn publish_segment(&self, segment: Vec<ObjectRef>) {
        debug_assert!(!segment.is_empty());
        self.segments.push(segment);
    }

    fn steal_segment(&self) -> Option<Vec<ObjectRef>> {
        self.segments.pop()
    }
}

/// Snapshot of the embedder fields of a wrapper object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperSnapshot {
    /// Embedder type tag.
    pub type_info: usize,
    /// Embedder instance pointer.
    pub instance: usize,
}

/// Shared queue of wrapper snapshots for embedder tracing.
#[derive(Debug, Default)]
pub struct WrapperWorklist {
    snapshots: SegQueue<WrapperSnapshot>,
}

impl WrapperWorklist {
    /// Create an empty wrapper worklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next snapshot.
    pub fn pop(&self) -> Option<WrapperSnapshot> {
        self.snapshots.pop()
    }

    /// Number of published snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// A worker's private view of the marking worklists.
///
/// Not shared between threads. Everything buffered is published on
/// [`publish`](Self::publish) and on drop.
#[derive(Debug)]
pub struct LocalMarkingWorklist<'w> {
    shared: &'w MarkingWorklist,
    push_segment: Vec<ObjectRef>,
    pop_segment: Vec<ObjectRef>,
    wrappers: Option<&'w WrapperWorklist>,
    wrapper_buffer: Vec<WrapperSnapshot>,
}

impl<'w> LocalMarkingWorklist<'w> {
    /// Create a local view without embedder support.
    #[must_use]
    pub fn new(shared: &'w MarkingWorklist) -> Self {
        Self {
            shared,
            push_segment: Vec::with_capacity(SEGMENT_CAPACITY),
            pop_segment: Vec::new(),
            wrappers: None,
            wrapper_buffer: Vec::new(),
        }
    }

    /// Create a local view that also forwards extracted wrappers.
    #[must_use]
    pub fn with_wrappers(shared: &'w MarkingWorklist, wrappers: &'w WrapperWorklist) -> Self {
        let mut local = Self::new(shared);
        local.wrappers = Some(wrappers);
        local
    }

    /// Queue `object` for body visitation.
    pub fn push(&mut self, object: ObjectRef) {
        self.push_segment.push(object);
        if self.push_segment.len() >= SEGMENT_CAPACITY {
            let full = mem::replace(
                &mut self.push_segment,
                Vec::with_capacity(SEGMENT_CAPACITY),
            );
            self.shared.publish_segment(full);
        }
    }

    /// Take the next object, preferring local work over shared segments.
    pub fn pop(&mut self) -> Option<ObjectRef> {
        if let Some(object) = self.pop_segment.pop() {
            return Some(object);
        }
        if self.push_segment.is_empty() {
            self.pop_segment = self.shared.steal_segment()?;
        } else {
            mem::swap(&mut self.push_segment, &mut self.pop_segment);
        }
        self.pop_segment.pop()
    }

    /// Whether this worker holds no unpublished objects.
    #[must_use]
    pub fn is_local_empty(&self) -> bool {
        self.push_segment.is_empty() && self.pop_segment.is_empty()
    }

    /// Whether the shared worklist has no published segments.
    #[must_use]
    pub fn is_global_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// Whether wrapper snapshots can be forwarded.
    #[must_use]
    pub const fn supports_extract_wrapper(&self) -> bool {
        self.wrappers.is_some()
    }

    /// Buffer a wrapper snapshot for embedder tracing.
    ///
    /// Dropped when no wrapper worklist is attached.
    pub fn push_extracted_wrapper(&mut self, snapshot: WrapperSnapshot) {
        if self.wrappers.is_some() {
            self.wrapper_buffer.push(snapshot);
        }
    }

    /// Make all buffered work visible to other workers.
    pub fn publish(&mut self) {
        if !self.push_segment.is_empty() {
            self.shared.publish_segment(mem::take(&mut self.push_segment));
        }
        if !self.pop_segment.is_empty() {
            self.shared.publish_segment(mem::take(&mut self.pop_segment));
        }
        if let Some(wrappers) = self.wrappers {
            for snapshot in self.wrapper_buffer.drain(..) {
                wrappers.snapshots.push(snapshot);
            }
        }
    }
}

impl Drop for LocalMarkingWorklist<'_> {
    fn drop(&mut self) {
        self.publish();
    }
}
