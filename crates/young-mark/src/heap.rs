//! The heap as seen by the marker.
//!
//! Object layout, region lookup and claims belong to the surrounding runtime.
//! [`Heap`] is the seam through which the marking visitor consumes them.

use std::sync::atomic::{self, Ordering};

use crate::object::{ObjectRef, TypeDescriptor};
use crate::region::Region;
use crate::slot::{LoadMode, Slots};
use crate::worklist::WrapperSnapshot;

/// Collaborator interface for young-generation marking.
///
/// Implementations must be safe to call from many marking workers at once.
pub trait Heap: Sync {
    /// The region that owns `object`.
    fn region_of(&self, object: ObjectRef) -> &Region;

    /// Whether `object` lives in the young generation.
    fn in_young_generation(&self, object: ObjectRef) -> bool {
        self.region_of(object).is_young()
    }

    /// Claim `object` for this cycle. `true` means the caller won the claim.
    fn try_mark(&self, object: ObjectRef) -> bool {
        self.region_of(object).try_mark(object)
    }

    /// Type descriptor of `object`, loaded with `mode`.
    ///
    /// # Safety
    ///
    /// With [`LoadMode::Plain`], the caller guarantees that no other thread
    /// writes the object's descriptor for the duration of the call.
    unsafe fn descriptor(&self, object: ObjectRef, mode: LoadMode) -> TypeDescriptor;

    /// Reference fields of `object`, in layout order.
    ///
    /// Thin strings expose `[actual]`, cons strings `[first, second]` and
    /// ephemeron tables `[key, value]` pairs.
    fn fields(&self, object: ObjectRef) -> Slots<'_>;

    /// The canonical empty string.
    fn empty_string(&self) -> ObjectRef;

    /// Snapshot the embedder fields of a wrapper-carrying object, if valid.
    fn extract_wrapper(
        &self,
        _descriptor: &TypeDescriptor,
        _object: ObjectRef,
    ) -> Option<WrapperSnapshot> {
        None
    }

    /// Mark the off-heap extension of a young array buffer as live.
    fn mark_array_buffer_extension(&self, _object: ObjectRef) {}

    /// Synchronizing read on the region of `object` for race detectors.
    fn synchronized_heap_load(&self, object: ObjectRef) {
        let _ = self.region_of(object);
        atomic::fence(Ordering::Acquire);
    }
}
