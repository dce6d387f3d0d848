//! The young-generation marking visitor.
//!
//! A visitor is created per worker per marking phase. It loads reference
//! slots, filters out everything that is not a young object, claims each young
//! object exactly once and either queues it, records it as data-only, or (in
//! sequential mode, on request) visits its body inline.
//!
//! # Modes
//!
//! | Behavior                     | Parallel        | Sequential          |
//! |------------------------------|-----------------|---------------------|
//! | Slot and descriptor loads    | relaxed atomic  | plain               |
//! | Data-only targets            | recorded inline | recorded inline     |
//! | Other targets                | always queued   | queued or inline    |
//! | String shortcutting          | if configured   | never               |
//!
//! Sequential visitors are created through the unsafe
//! [`YoungGenerationMarkingVisitor::new_sequential`], whose caller vouches
//! that nothing else writes the heap while the visitor is alive.
//!
//! # Slot rewrites
//!
//! With string shortcutting, a slot that points at a thin string, or at a cons
//! string whose second part is the empty string, is overwritten in place with
//! the underlying string. No extra synchronization protects the write: the
//! visitor only visits slots of objects it has claimed (or remembered-set
//! slots handed to it exclusively), so no other worker visits the same slot
//! concurrently. The running program may still write the slot; both writes
//! store a valid reference to the same string contents.
//!
//! # Teardown
//!
//! Dropping the visitor publishes its local worklist and ephemeron tables and
//! flushes its live-byte cache. Until then, other workers cannot see its work.

use crate::config::{MarkingMode, ObjectVisitationMode, VisitorConfig};
use crate::ephemeron::{EphemeronTableList, LocalEphemeronTableList};
use crate::heap::Heap;
use crate::live_bytes::LiveBytesCache;
use crate::metrics::VisitorStats;
use crate::object::{
    ephemeron_value_index, ObjectFields, ObjectRef, Tagged, TypeDescriptor, VisitorId,
    CONS_STRING_FIRST_INDEX, CONS_STRING_SECOND_INDEX, EPHEMERON_ENTRY_SIZE,
    THIN_STRING_ACTUAL_INDEX,
};
use crate::pretenuring::{PretenuringFeedbackMap, PretenuringHandler};
use crate::region::Region;
use crate::slot::{LoadMode, Slot, Slots};
use crate::worklist::{LocalMarkingWorklist, MarkingWorklist, WrapperWorklist};

/// Result of visiting one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Small integer or cleared weak reference. Nothing happened.
    NotObject,
    /// Live reference outside the young generation. Never queued or counted.
    OutOfGeneration,
    /// Young object already claimed by this or another worker.
    AlreadyMarked,
    /// Young object claimed by this visitor.
    Marked,
}

impl SlotOutcome {
    /// Whether the slot references a young object.
    ///
    /// This is what remembered-set scanning needs to decide whether to keep
    /// tracking the slot.
    #[must_use]
    pub const fn is_young(self) -> bool {
        matches!(self, Self::AlreadyMarked | Self::Marked)
    }
}

/// Shared structures a marking visitor publishes into.
///
/// One context is shared by all workers of a marking phase.
pub struct MarkingContext<'a, H: Heap> {
    /// The heap being marked.
    pub heap: &'a H,
    /// Objects awaiting body visitation.
    pub worklist: &'a MarkingWorklist,
    /// Embedder wrappers, if an embedder is attached.
    pub wrappers: Option<&'a WrapperWorklist>,
    /// Ephemeron tables for the later weak-key pass.
    pub ephemeron_tables: &'a EphemeronTableList,
    /// Allocation-site survival hook.
    pub pretenuring: &'a dyn PretenuringHandler,
}

impl<H: Heap> Clone for MarkingContext<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: Heap> Copy for MarkingContext<'_, H> {}

impl<H: Heap> std::fmt::Debug for MarkingContext<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkingContext")
            .field("worklist", &self.worklist)
            .field("wrappers", &self.wrappers.is_some())
            .field("ephemeron_tables", &self.ephemeron_tables.len())
            .finish_non_exhaustive()
    }
}

/// Per-worker marking visitor for the young generation.
///
/// # Example
///
/// ```
/// use young_mark::arena::ArenaHeap;
/// use young_mark::{
///     EphemeronTableList, MarkingContext, MarkingWorklist, PretenuringFeedbackMap,
///     SurvivalTracker, Tagged, VisitorConfig, YoungGenerationMarkingVisitor,
/// };
/// use std::sync::atomic::AtomicUsize;
///
/// let mut heap = ArenaHeap::builder().build();
/// let young = heap.young_region(0);
/// let leaf = heap.allocate_data(young, 16);
/// let array = heap.allocate_fixed_array(young, &[Tagged::strong(leaf)]);
///
/// let worklist = MarkingWorklist::new();
/// let ephemeron_tables = EphemeronTableList::new();
/// let context = MarkingContext {
///     heap: &heap,
///     worklist: &worklist,
///     wrappers: None,
///     ephemeron_tables: &ephemeron_tables,
///     pretenuring: &SurvivalTracker,
/// };
///
/// let root = AtomicUsize::new(Tagged::strong(array).raw());
/// let mut feedback = PretenuringFeedbackMap::new();
/// {
///     let mut visitor =
///         YoungGenerationMarkingVisitor::new(context, VisitorConfig::parallel(), &mut feedback);
///     assert!(visitor.visit_slot(young_mark::Slot::new(&root)));
///     visitor.process_worklist();
/// }
///
/// assert!(heap.is_marked(array));
/// assert!(heap.is_marked(leaf));
/// assert_eq!(heap.region(young).live_bytes(), 16 + ArenaHeap::size_for_fields(1));
/// ```
pub struct YoungGenerationMarkingVisitor<'a, H: Heap> {
    heap: &'a H,
    config: VisitorConfig,
    load_mode: LoadMode,
    worklist: LocalMarkingWorklist<'a>,
    ephemeron_tables: LocalEphemeronTableList<'a>,
    pretenuring: &'a dyn PretenuringHandler,
    pretenuring_feedback: &'a mut PretenuringFeedbackMap,
    live_bytes: LiveBytesCache<'a>,
    stats: VisitorStats,
    #[cfg(feature = "tracing")]
    span: ::tracing::Span,
}

impl<'a, H: Heap> YoungGenerationMarkingVisitor<'a, H> {
    /// Create a parallel-mode visitor for one worker.
    ///
    /// Survivor feedback accumulates in `pretenuring_feedback`; merging it is
    /// up to the caller once marking has finished.
    ///
    /// # Panics
    ///
    /// Panics if `config.mode` is [`MarkingMode::Sequential`]. Sequential
    /// visitors use unsynchronized loads and are created through
    /// [`new_sequential`](Self::new_sequential).
    pub fn new(
        context: MarkingContext<'a, H>,
        config: VisitorConfig,
        pretenuring_feedback: &'a mut PretenuringFeedbackMap,
    ) -> Self {
        assert_eq!(
            config.mode,
            MarkingMode::Parallel,
            "sequential visitors must be created with `new_sequential`"
        );
        Self::with_context(context, config, pretenuring_feedback)
    }

    /// Create a sequential-mode visitor.
    ///
    /// The visitor loads slots and type descriptors with plain reads and may
    /// visit bodies inline. `config.mode` is forced to
    /// [`MarkingMode::Sequential`].
    ///
    /// # Safety
    ///
    /// While the visitor is alive, no other thread may write any slot or type
    /// descriptor the visitor can reach. In practice this means the running
    /// program is paused and this visitor is the only marker.
    pub unsafe fn new_sequential(
        context: MarkingContext<'a, H>,
        mut config: VisitorConfig,
        pretenuring_feedback: &'a mut PretenuringFeedbackMap,
    ) -> Self {
        config.mode = MarkingMode::Sequential;
        Self::with_context(context, config, pretenuring_feedback)
    }

    fn with_context(
        context: MarkingContext<'a, H>,
        config: VisitorConfig,
        pretenuring_feedback: &'a mut PretenuringFeedbackMap,
    ) -> Self {
        let worklist = match context.wrappers {
            Some(wrappers) => LocalMarkingWorklist::with_wrappers(context.worklist, wrappers),
            None => LocalMarkingWorklist::new(context.worklist),
        };
        Self {
            heap: context.heap,
            config,
            load_mode: config.mode.load_mode(),
            worklist,
            ephemeron_tables: LocalEphemeronTableList::new(context.ephemeron_tables),
            pretenuring: context.pretenuring,
            pretenuring_feedback,
            live_bytes: LiveBytesCache::new(),
            stats: VisitorStats::default(),
            #[cfg(feature = "tracing")]
            span: crate::tracing::span_marking_visitor(config.mode),
        }
    }

    /// The configuration this visitor was built with.
    #[must_use]
    pub const fn config(&self) -> &VisitorConfig {
        &self.config
    }

    /// Counters collected so far.
    #[must_use]
    pub const fn stats(&self) -> &VisitorStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Object visitation
    // ------------------------------------------------------------------

    /// Visit the body of `object` according to its category.
    ///
    /// Returns the number of bytes visited: the object's size, or zero if
    /// the body was not visited. The caller is responsible for the object's
    /// own live-byte contribution.
    pub fn visit(&mut self, object: ObjectRef) -> usize {
        let descriptor = self.descriptor(object);
        self.visit_with_descriptor(&descriptor, object)
    }

    fn visit_with_descriptor(&mut self, descriptor: &TypeDescriptor, object: ObjectRef) -> usize {
        match descriptor.visitor_id {
            VisitorId::DataObject | VisitorId::SeqString => descriptor.size,
            VisitorId::FixedArray
            | VisitorId::ConsString
            | VisitorId::ShortcutCandidate
            | VisitorId::ThinString => self.visit_body(descriptor, object),
            VisitorId::JsObject => self.visit_js_object(descriptor, object),
            VisitorId::JsObjectFast => self.visit_js_object_fast(descriptor, object),
            VisitorId::JsApiObject => self.visit_js_api_object(descriptor, object),
            VisitorId::JsArrayBuffer => self.visit_js_array_buffer(descriptor, object),
            VisitorId::JsTypedArray => self.visit_js_typed_array(descriptor, object),
            VisitorId::JsDataView => self.visit_js_data_view(descriptor, object),
            VisitorId::EphemeronHashTable => self.visit_ephemeron_hash_table(descriptor, object),
        }
    }

    /// Visit a regular object and record its allocation-site survival.
    pub fn visit_js_object(&mut self, descriptor: &TypeDescriptor, object: ObjectRef) -> usize {
        self.visit_js_object_subclass(descriptor, object)
    }

    /// Visit a regular object with in-object fields only.
    pub fn visit_js_object_fast(
        &mut self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> usize {
        self.visit_js_object_subclass(descriptor, object)
    }

    /// Visit an API object, forwarding its embedder wrapper if any.
    pub fn visit_js_api_object(&mut self, descriptor: &TypeDescriptor, object: ObjectRef) -> usize {
        self.visit_embedder_tracing_subclass(descriptor, object)
    }

    /// Visit an array buffer, keeping its backing-store extension alive.
    pub fn visit_js_array_buffer(
        &mut self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> usize {
        self.heap.mark_array_buffer_extension(object);
        self.visit_embedder_tracing_subclass(descriptor, object)
    }

    /// Visit a typed array.
    pub fn visit_js_typed_array(
        &mut self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> usize {
        self.visit_embedder_tracing_subclass(descriptor, object)
    }

    /// Visit a data view.
    pub fn visit_js_data_view(&mut self, descriptor: &TypeDescriptor, object: ObjectRef) -> usize {
        self.visit_embedder_tracing_subclass(descriptor, object)
    }

    /// Visit an ephemeron table: register it and treat only its values as
    /// strong. Keys are left for the weak-key pass.
    pub fn visit_ephemeron_hash_table(
        &mut self,
        descriptor: &TypeDescriptor,
        table: ObjectRef,
    ) -> usize {
        let heap = self.heap;
        self.ephemeron_tables.push(table);
        self.stats.ephemeron_tables += 1;

        let fields = heap.fields(table);
        for entry in 0..fields.len() / EPHEMERON_ENTRY_SIZE {
            if let Some(value_slot) = fields.get(ephemeron_value_index(entry)) {
                self.visit_pointer(table, value_slot);
            }
        }
        descriptor.size
    }

    fn visit_embedder_tracing_subclass(
        &mut self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> usize {
        let size = self.visit_js_object_subclass(descriptor, object);
        if !self.worklist.supports_extract_wrapper() {
            return size;
        }
        if size == 0 {
            return size;
        }
        if let Some(snapshot) = self.heap.extract_wrapper(descriptor, object) {
            self.worklist.push_extracted_wrapper(snapshot);
            self.stats.wrappers_extracted += 1;
        }
        size
    }

    fn visit_js_object_subclass(
        &mut self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> usize {
        let size = self.visit_body(descriptor, object);
        debug_assert!(size > 0, "{object:?} visited with zero size");
        self.pretenuring
            .update_allocation_site(descriptor, object, self.pretenuring_feedback);
        size
    }

    fn visit_body(&mut self, descriptor: &TypeDescriptor, object: ObjectRef) -> usize {
        let heap = self.heap;
        self.visit_pointers(object, heap.fields(object));
        descriptor.size
    }

    // ------------------------------------------------------------------
    // Slot visitation
    // ------------------------------------------------------------------

    /// Visit every slot in `slots`, a field range of `host`.
    pub fn visit_pointers(&mut self, _host: ObjectRef, slots: Slots<'_>) {
        for slot in slots.iter() {
            self.visit_object_via_slot(slot, ObjectVisitationMode::PushToWorklist);
        }
    }

    /// Visit one field of `host`.
    pub fn visit_pointer(&mut self, _host: ObjectRef, slot: Slot<'_>) {
        self.visit_object_via_slot(slot, ObjectVisitationMode::PushToWorklist);
    }

    /// Visit a slot found through the remembered set or the roots.
    ///
    /// Returns `true` if the slot references a young object and should stay
    /// in the remembered set.
    pub fn visit_slot(&mut self, slot: Slot<'_>) -> bool {
        self.visit_object_via_slot(slot, ObjectVisitationMode::PushToWorklist)
            .is_young()
    }

    /// Visit a slot with an explicit visitation mode.
    ///
    /// [`ObjectVisitationMode::VisitDirectly`] is only honored in sequential
    /// mode; parallel visitors always queue.
    pub fn visit_slot_with(&mut self, slot: Slot<'_>, mode: ObjectVisitationMode) -> SlotOutcome {
        self.visit_object_via_slot(slot, mode)
    }

    fn visit_object_via_slot(
        &mut self,
        slot: Slot<'_>,
        visitation: ObjectVisitationMode,
    ) -> SlotOutcome {
        let heap = self.heap;
        self.stats.slots_visited += 1;

        let target = self.load_slot(slot);
        // Weak references are treated as strong.
        let Some(mut object) = target.get_heap_object() else {
            return SlotOutcome::NotObject;
        };

        if self.config.synchronized_heap_load && self.config.mode == MarkingMode::Parallel {
            heap.synchronized_heap_load(object);
        }

        if !heap.in_young_generation(object) {
            return SlotOutcome::OutOfGeneration;
        }

        if self.config.shortcuts_strings() {
            match self.shortcut_strings(slot, target, object) {
                Some(young) => object = young,
                None => return SlotOutcome::OutOfGeneration,
            }
        }

        if !heap.try_mark(object) {
            return SlotOutcome::AlreadyMarked;
        }
        self.stats.objects_marked += 1;

        let descriptor = self.descriptor(object);
        // Data-only objects have no body to visit and never enter the
        // worklist.
        if descriptor.object_fields() == ObjectFields::DataOnly {
            let size = self.config.align_to_allocation_alignment(descriptor.size);
            self.increment_live_bytes_cached(heap.region_of(object), size);
            self.stats.data_only_objects += 1;
            return SlotOutcome::Marked;
        }

        if self.config.mode == MarkingMode::Sequential
            && visitation == ObjectVisitationMode::VisitDirectly
        {
            let visited_size = self.visit_with_descriptor(&descriptor, object);
            if visited_size > 0 {
                let size = self.config.align_to_allocation_alignment(visited_size);
                self.increment_live_bytes_cached(heap.region_of(object), size);
            }
            self.stats.objects_visited_directly += 1;
            return SlotOutcome::Marked;
        }

        self.worklist.push(object);
        self.stats.objects_pushed += 1;
        SlotOutcome::Marked
    }

    /// Collapse a thin string or a cons string with an empty second part.
    ///
    /// Rewrites `slot` to the underlying string and returns it if it is still
    /// young, or `None` if the rewritten target lies outside the young
    /// generation. Any other object is returned unchanged.
    ///
    /// The caller must be the only visitor of `slot`; see the module docs.
    fn shortcut_strings(
        &mut self,
        slot: Slot<'_>,
        original: Tagged,
        object: ObjectRef,
    ) -> Option<ObjectRef> {
        debug_assert!(self.config.mode.allows_slot_rewrite());
        let heap = self.heap;
        let descriptor = self.descriptor(object);
        let fields = heap.fields(object);

        let target = match descriptor.visitor_id {
            VisitorId::ThinString => Self::field_object(fields, THIN_STRING_ACTUAL_INDEX),
            VisitorId::ShortcutCandidate => {
                let second = Self::field_object(fields, CONS_STRING_SECOND_INDEX);
                if second == Some(heap.empty_string()) {
                    Self::field_object(fields, CONS_STRING_FIRST_INDEX)
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(target) = target else {
            return Some(object);
        };

        let rewritten = if original.is_weak() {
            Tagged::weak(target)
        } else {
            Tagged::strong(target)
        };
        slot.relaxed_store(rewritten);
        self.stats.strings_shortcut += 1;

        heap.in_young_generation(target).then_some(target)
    }

    fn field_object(fields: Slots<'_>, index: usize) -> Option<ObjectRef> {
        fields
            .get(index)
            .and_then(|slot| slot.relaxed_load().get_heap_object())
    }

    // ------------------------------------------------------------------
    // Live bytes and worklist
    // ------------------------------------------------------------------

    /// Record `bytes` live bytes on `region` through the local cache.
    ///
    /// `bytes` must already be rounded to the allocation alignment.
    pub fn increment_live_bytes_cached(&mut self, region: &'a Region, bytes: usize) {
        debug_assert!(
            bytes % self.config.allocation_alignment == 0,
            "live-byte increment {bytes} is not aligned to {}",
            self.config.allocation_alignment
        );
        self.live_bytes.increment(region, bytes);
        self.stats.live_bytes_recorded += bytes;
    }

    /// Pop and visit objects until the local view of the worklist is empty,
    /// recording each visited object's size as live.
    ///
    /// Returns the number of objects processed.
    pub fn process_worklist(&mut self) -> usize {
        let heap = self.heap;
        let mut processed = 0;
        while let Some(object) = self.worklist.pop() {
            let descriptor = self.descriptor(object);
            let visited_size = self.visit_with_descriptor(&descriptor, object);
            if visited_size > 0 {
                let size = self.config.align_to_allocation_alignment(visited_size);
                self.increment_live_bytes_cached(heap.region_of(object), size);
            }
            processed += 1;
        }
        self.stats.objects_processed += processed;

        #[cfg(feature = "tracing")]
        self.span
            .in_scope(|| crate::tracing::log_worklist_drained(processed));

        processed
    }

    /// Make locally buffered objects and ephemeron tables visible to other
    /// workers.
    pub fn publish_worklists(&mut self) {
        self.worklist.publish();
        self.ephemeron_tables.publish();
    }

    // ------------------------------------------------------------------
    // Loads
    // ------------------------------------------------------------------

    fn load_slot(&self, slot: Slot<'_>) -> Tagged {
        // SAFETY: Plain loads are only selected by `new_sequential`, whose
        // caller guarantees no other thread writes reachable slots while
        // this visitor is alive.
        unsafe { slot.load(self.load_mode) }
    }

    fn descriptor(&self, object: ObjectRef) -> TypeDescriptor {
        // SAFETY: As for `load_slot`; the `new_sequential` contract covers
        // type descriptors too.
        unsafe { self.heap.descriptor(object, self.load_mode) }
    }
}

impl<H: Heap> Drop for YoungGenerationMarkingVisitor<'_, H> {
    fn drop(&mut self) {
        self.publish_worklists();
        // Region counters are atomic, so flushing from the worker is safe.
        let flushed = self.live_bytes.flush();

        #[cfg(feature = "tracing")]
        self.span
            .in_scope(|| crate::tracing::log_visitor_teardown(&self.stats, flushed));
        #[cfg(not(feature = "tracing"))]
        let _ = flushed;
    }
}

impl<H: Heap> std::fmt::Debug for YoungGenerationMarkingVisitor<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoungGenerationMarkingVisitor")
            .field("config", &self.config)
            .field("worklist", &self.worklist)
            .field("live_bytes", &self.live_bytes)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::arena::ArenaHeap;
    use crate::pretenuring::{AllocationSiteId, NoPretenuring, SurvivalTracker};
    use crate::worklist::WrapperSnapshot;

    struct Fixture {
        worklist: MarkingWorklist,
        wrappers: WrapperWorklist,
        ephemeron_tables: EphemeronTableList,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                worklist: MarkingWorklist::new(),
                wrappers: WrapperWorklist::new(),
                ephemeron_tables: EphemeronTableList::new(),
            }
        }

        fn context<'a>(&'a self, heap: &'a ArenaHeap) -> MarkingContext<'a, ArenaHeap> {
            MarkingContext {
                heap,
                worklist: &self.worklist,
                wrappers: Some(&self.wrappers),
                ephemeron_tables: &self.ephemeron_tables,
                pretenuring: &SurvivalTracker,
            }
        }
    }

    fn root(value: Tagged) -> AtomicUsize {
        AtomicUsize::new(value.raw())
    }

    #[test]
    fn test_small_int_and_cleared_are_not_objects() {
        let heap = ArenaHeap::builder().build();
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let mut visitor = YoungGenerationMarkingVisitor::new(
            fixture.context(&heap),
            VisitorConfig::parallel(),
            &mut feedback,
        );

        let smi = root(Tagged::small_int(5));
        let cleared = root(Tagged::CLEARED);
        assert_eq!(
            visitor.visit_slot_with(Slot::new(&smi), ObjectVisitationMode::PushToWorklist),
            SlotOutcome::NotObject
        );
        assert!(!visitor.visit_slot(Slot::new(&cleared)));
        assert_eq!(visitor.stats().objects_marked, 0);
        assert_eq!(visitor.stats().slots_visited, 2);
    }

    #[test]
    fn test_old_target_is_skipped() {
        let mut heap = ArenaHeap::builder().build();
        let old = heap.old_region(0);
        let target = heap.allocate_fixed_array(old, &[]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            let slot = root(Tagged::strong(target));
            assert_eq!(
                visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::PushToWorklist),
                SlotOutcome::OutOfGeneration
            );
        }
        assert!(!heap.is_marked(target));
        assert!(fixture.worklist.is_empty());
        assert_eq!(heap.region(old).live_bytes(), 0);
    }

    #[test]
    fn test_second_visit_is_already_marked() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let target = heap.allocate_fixed_array(young, &[]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let mut visitor = YoungGenerationMarkingVisitor::new(
            fixture.context(&heap),
            VisitorConfig::parallel(),
            &mut feedback,
        );

        let slot = root(Tagged::weak(target));
        assert_eq!(
            visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::PushToWorklist),
            SlotOutcome::Marked
        );
        assert_eq!(
            visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::PushToWorklist),
            SlotOutcome::AlreadyMarked
        );
        assert_eq!(visitor.stats().objects_pushed, 1);
    }

    #[test]
    fn test_data_only_is_counted_not_pushed() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let data = heap.allocate_data(young, 20);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            let slot = root(Tagged::strong(data));
            assert!(visitor.visit_slot(Slot::new(&slot)));
            assert_eq!(visitor.stats().data_only_objects, 1);
            assert_eq!(visitor.stats().objects_pushed, 0);
            assert!(visitor.worklist.is_local_empty());
        }
        // 20 rounded up to the word size.
        assert_eq!(heap.region(young).live_bytes(), 24);
        assert!(fixture.worklist.is_empty());
    }

    #[test]
    fn test_live_bytes_are_flushed_on_drop() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let data = heap.allocate_data(young, 32);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(data));

        let mut visitor = YoungGenerationMarkingVisitor::new(
            fixture.context(&heap),
            VisitorConfig::parallel(),
            &mut feedback,
        );
        visitor.visit_slot(Slot::new(&slot));
        assert_eq!(heap.region(young).live_bytes(), 0);
        drop(visitor);
        assert_eq!(heap.region(young).live_bytes(), 32);
    }

    #[test]
    fn test_thin_string_slot_is_rewritten() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let actual = heap.allocate_data(young, 16);
        let thin = heap.allocate_thin_string(young, actual);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::weak(thin));
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            assert!(visitor.visit_slot(Slot::new(&slot)));
            assert_eq!(visitor.stats().strings_shortcut, 1);
        }
        assert_eq!(Tagged::from_raw(slot.into_inner()), Tagged::weak(actual));
        assert!(heap.is_marked(actual));
        assert!(!heap.is_marked(thin));
    }

    #[test]
    fn test_cons_string_with_old_first_is_out_of_generation() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let old = heap.old_region(0);
        let first = heap.allocate_data(old, 16);
        let empty = heap.empty_string();
        let cons = heap.allocate_cons_string(young, first, empty);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(cons));
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            assert_eq!(
                visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::PushToWorklist),
                SlotOutcome::OutOfGeneration
            );
        }
        assert_eq!(Tagged::from_raw(slot.into_inner()), Tagged::strong(first));
        assert!(!heap.is_marked(cons));
        assert!(!heap.is_marked(first));
    }

    #[test]
    fn test_sequential_never_rewrites() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let actual = heap.allocate_data(young, 16);
        let thin = heap.allocate_thin_string(young, actual);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(thin));
        {
            let config = VisitorConfig::sequential().with_shortcut_strings(true);
            // SAFETY: Single-threaded test; nothing else touches the heap.
            let mut visitor = unsafe {
                YoungGenerationMarkingVisitor::new_sequential(
                    fixture.context(&heap),
                    config,
                    &mut feedback,
                )
            };
            assert!(visitor.visit_slot(Slot::new(&slot)));
            visitor.process_worklist();
        }
        assert_eq!(Tagged::from_raw(slot.into_inner()), Tagged::strong(thin));
        assert!(heap.is_marked(thin));
        assert!(heap.is_marked(actual));
    }

    #[test]
    fn test_visit_directly_in_sequential_mode() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let leaf = heap.allocate_fixed_array(young, &[]);
        let array = heap.allocate_fixed_array(young, &[Tagged::strong(leaf)]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(array));
        {
            // SAFETY: Single-threaded test; nothing else touches the heap.
            let mut visitor = unsafe {
                YoungGenerationMarkingVisitor::new_sequential(
                    fixture.context(&heap),
                    VisitorConfig::sequential(),
                    &mut feedback,
                )
            };
            assert_eq!(
                visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::VisitDirectly),
                SlotOutcome::Marked
            );
            assert_eq!(visitor.stats().objects_visited_directly, 1);
            // The child is found through a field and queued.
            assert_eq!(visitor.stats().objects_pushed, 1);
            assert_eq!(visitor.process_worklist(), 1);
        }
        assert_eq!(
            heap.region(young).live_bytes(),
            ArenaHeap::size_for_fields(1) + ArenaHeap::size_for_fields(0)
        );
    }

    #[test]
    fn test_visit_directly_ignored_in_parallel_mode() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let array = heap.allocate_fixed_array(young, &[]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let mut visitor = YoungGenerationMarkingVisitor::new(
            fixture.context(&heap),
            VisitorConfig::parallel(),
            &mut feedback,
        );

        let slot = root(Tagged::strong(array));
        visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::VisitDirectly);
        assert_eq!(visitor.stats().objects_visited_directly, 0);
        assert_eq!(visitor.stats().objects_pushed, 1);
    }

    #[test]
    fn test_ephemeron_values_only() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let key = heap.allocate_fixed_array(young, &[]);
        let value = heap.allocate_fixed_array(young, &[]);
        let table =
            heap.allocate_ephemeron_table(young, &[(Tagged::strong(key), Tagged::strong(value))]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            let size = visitor.visit(table);
            assert_eq!(size, ArenaHeap::size_for_fields(2));
        }
        assert_eq!(fixture.ephemeron_tables.drain(), vec![table]);
        assert!(heap.is_marked(value));
        assert!(!heap.is_marked(key));
    }

    #[test]
    fn test_js_object_records_allocation_site() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let site = AllocationSiteId(7);
        let descriptor = TypeDescriptor::new(VisitorId::JsObject, ArenaHeap::size_for_fields(0))
            .with_allocation_site(site);
        let object = heap.allocate_described(young, descriptor, &[]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            visitor.visit(object);
        }
        assert_eq!(feedback.get(&site), Some(&1));
    }

    #[test]
    fn test_array_buffer_extension_and_wrapper() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let buffer = heap.allocate_with_fields(young, VisitorId::JsArrayBuffer, &[]);
        let snapshot = WrapperSnapshot {
            type_info: 3,
            instance: 0x4000,
        };
        heap.set_wrapper(buffer, snapshot);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            visitor.visit(buffer);
            assert_eq!(visitor.stats().wrappers_extracted, 1);
        }
        assert!(heap.array_buffer_extension_marked(buffer));
        assert_eq!(fixture.wrappers.pop(), Some(snapshot));
    }

    #[test]
    fn test_wrapper_dropped_without_embedder() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let api = heap.allocate_with_fields(young, VisitorId::JsApiObject, &[]);
        heap.set_wrapper(
            api,
            WrapperSnapshot {
                type_info: 1,
                instance: 0x8000,
            },
        );
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let context = MarkingContext {
            wrappers: None,
            pretenuring: &NoPretenuring,
            ..fixture.context(&heap)
        };
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                context,
                VisitorConfig::parallel(),
                &mut feedback,
            );
            visitor.visit(api);
            assert_eq!(visitor.stats().wrappers_extracted, 0);
        }
        assert!(fixture.wrappers.is_empty());
        assert!(feedback.is_empty());
    }

    #[test]
    fn test_slot_outcome_predicates() {
        assert!(SlotOutcome::Marked.is_young());
        assert!(SlotOutcome::AlreadyMarked.is_young());
        assert!(!SlotOutcome::OutOfGeneration.is_young());
        assert!(!SlotOutcome::NotObject.is_young());
    }

    #[test]
    #[should_panic(expected = "new_sequential")]
    fn test_new_rejects_sequential_config() {
        let heap = ArenaHeap::builder().build();
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let _visitor = YoungGenerationMarkingVisitor::new(
            fixture.context(&heap),
            VisitorConfig::sequential(),
            &mut feedback,
        );
    }

    #[test]
    fn test_new_sequential_forces_sequential_mode() {
        let heap = ArenaHeap::builder().build();
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        // SAFETY: Single-threaded test; nothing else touches the heap.
        let visitor = unsafe {
            YoungGenerationMarkingVisitor::new_sequential(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            )
        };
        assert_eq!(visitor.config().mode, MarkingMode::Sequential);
        assert!(!visitor.config().shortcuts_strings());
    }

    #[test]
    fn test_sequential_data_only_uses_allocation_alignment() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let data = heap.allocate_data(young, 20);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(data));
        {
            let config = VisitorConfig::sequential().with_allocation_alignment(16);
            // SAFETY: Single-threaded test; nothing else touches the heap.
            let mut visitor = unsafe {
                YoungGenerationMarkingVisitor::new_sequential(
                    fixture.context(&heap),
                    config,
                    &mut feedback,
                )
            };
            assert_eq!(
                visitor.visit_slot_with(Slot::new(&slot), ObjectVisitationMode::VisitDirectly),
                SlotOutcome::Marked
            );
            assert_eq!(visitor.stats().data_only_objects, 1);
            assert_eq!(visitor.stats().objects_pushed, 0);
            assert_eq!(visitor.stats().objects_visited_directly, 0);
        }
        // 20 rounded up to the 16-byte allocation alignment.
        assert_eq!(heap.region(young).live_bytes(), 32);
        assert!(fixture.worklist.is_empty());
    }

    #[test]
    fn test_synchronized_heap_load_still_marks() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let leaf = heap.allocate_data(young, 16);
        let array = heap.allocate_fixed_array(young, &[Tagged::strong(leaf)]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        let slot = root(Tagged::strong(array));
        {
            let config = VisitorConfig::parallel().with_synchronized_heap_load(true);
            let mut visitor =
                YoungGenerationMarkingVisitor::new(fixture.context(&heap), config, &mut feedback);
            assert!(visitor.visit_slot(Slot::new(&slot)));
            assert_eq!(visitor.process_worklist(), 1);
        }
        assert!(heap.is_marked(array));
        assert!(heap.is_marked(leaf));
        assert_eq!(
            heap.region(young).live_bytes(),
            ArenaHeap::size_for_fields(1) + 16
        );
    }

    #[test]
    fn test_visit_pointers_covers_only_given_range() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let targets: Vec<ObjectRef> = (0..3)
            .map(|_| heap.allocate_fixed_array(young, &[]))
            .collect();
        let fields: Vec<Tagged> = targets.iter().map(|&t| Tagged::strong(t)).collect();
        let host = heap.allocate_fixed_array(young, &fields);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            visitor.visit_pointers(host, heap.fields(host).range(1, 2));
            assert_eq!(visitor.stats().slots_visited, 1);
            assert_eq!(visitor.stats().objects_pushed, 1);
        }
        assert!(!heap.is_marked(targets[0]));
        assert!(heap.is_marked(targets[1]));
        assert!(!heap.is_marked(targets[2]));
        assert!(!heap.is_marked(host));
    }

    #[test]
    fn test_typed_array_forwards_wrapper() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let descriptor =
            TypeDescriptor::new(VisitorId::JsTypedArray, ArenaHeap::size_for_fields(0));
        let array = heap.allocate_described(young, descriptor, &[]);
        let snapshot = WrapperSnapshot {
            type_info: 5,
            instance: 0xa000,
        };
        heap.set_wrapper(array, snapshot);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            assert_eq!(
                visitor.visit_js_typed_array(&descriptor, array),
                descriptor.size
            );
            assert_eq!(visitor.stats().wrappers_extracted, 1);
        }
        assert_eq!(fixture.wrappers.pop(), Some(snapshot));
        assert!(fixture.wrappers.is_empty());
        assert!(!heap.array_buffer_extension_marked(array));
    }

    #[test]
    fn test_data_view_visits_fields() {
        let mut heap = ArenaHeap::builder().build();
        let young = heap.young_region(0);
        let buffer = heap.allocate_data(young, 16);
        let descriptor =
            TypeDescriptor::new(VisitorId::JsDataView, ArenaHeap::size_for_fields(1));
        let view = heap.allocate_described(young, descriptor, &[Tagged::strong(buffer)]);
        let fixture = Fixture::new();
        let mut feedback = PretenuringFeedbackMap::new();
        {
            let mut visitor = YoungGenerationMarkingVisitor::new(
                fixture.context(&heap),
                VisitorConfig::parallel(),
                &mut feedback,
            );
            assert_eq!(visitor.visit_js_data_view(&descriptor, view), descriptor.size);
            assert_eq!(visitor.stats().wrappers_extracted, 0);
        }
        assert!(heap.is_marked(buffer));
        assert!(fixture.wrappers.is_empty());
    }
}
