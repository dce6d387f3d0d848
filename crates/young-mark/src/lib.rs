//! Young-generation marking for a minor mark-sweep garbage collector.
//!
//! `young-mark` provides the per-worker visitor that discovers live objects in
//! the young generation. Marking workers share a segmented worklist and claim
//! objects through per-region mark bitmaps, so each young object is claimed
//! and counted exactly once no matter how many workers reach it.
//!
//! # Features
//!
//! - **Exactly-once claims**: an atomic bitmap claim decides which worker owns
//!   an object
//! - **Batched live bytes**: per-region counters are updated through a small
//!   direct-mapped cache and flushed when the visitor is dropped
//! - **String shortcutting**: slots pointing at thin strings or flat cons
//!   strings are rewritten to the underlying string in parallel mode
//! - **Ephemerons**: tables are registered for a later weak-key pass and only
//!   their values are traced
//!
//! # Quick Start
//!
//! ```
//! use std::sync::atomic::AtomicUsize;
//!
//! use young_mark::arena::ArenaHeap;
//! use young_mark::{
//!     EphemeronTableList, MarkingContext, MarkingWorklist, NoPretenuring,
//!     PretenuringFeedbackMap, Slot, Tagged, VisitorConfig, YoungGenerationMarkingVisitor,
//! };
//!
//! let mut heap = ArenaHeap::builder().young_regions(1).old_regions(1).build();
//! let young = heap.young_region(0);
//! let old = heap.old_region(0);
//!
//! let b = heap.allocate_data(young, 24);
//! let c = heap.allocate_data(old, 24);
//! let a = heap.allocate_fixed_array(young, &[Tagged::strong(b), Tagged::strong(c)]);
//!
//! let worklist = MarkingWorklist::new();
//! let ephemeron_tables = EphemeronTableList::new();
//! let context = MarkingContext {
//!     heap: &heap,
//!     worklist: &worklist,
//!     wrappers: None,
//!     ephemeron_tables: &ephemeron_tables,
//!     pretenuring: &NoPretenuring,
//! };
//!
//! let root = AtomicUsize::new(Tagged::strong(a).raw());
//! let mut feedback = PretenuringFeedbackMap::new();
//! {
//!     let mut visitor =
//!         YoungGenerationMarkingVisitor::new(context, VisitorConfig::parallel(), &mut feedback);
//!     visitor.visit_slot(Slot::new(&root));
//!     visitor.process_worklist();
//! }
//!
//! assert!(heap.is_marked(a) && heap.is_marked(b));
//! assert!(!heap.is_marked(c));
//! assert_eq!(heap.region(old).live_bytes(), 0);
//! ```
//!
//! # Thread Safety
//!
//! A [`YoungGenerationMarkingVisitor`] belongs to one worker. Everything it
//! shares with other workers ([`MarkingWorklist`], [`EphemeronTableList`],
//! region counters and bitmaps) is `Sync`.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod config;
pub mod ephemeron;
pub mod heap;
pub mod live_bytes;
pub mod mark;
pub mod metrics;
pub mod object;
pub mod pretenuring;
pub mod region;
pub mod slot;
pub mod visitor;
pub mod worklist;

#[cfg(feature = "tracing")]
mod tracing;

pub use config::{MarkingMode, ObjectVisitationMode, VisitorConfig};
pub use ephemeron::{EphemeronTableList, LocalEphemeronTableList};
pub use heap::Heap;
pub use live_bytes::LiveBytesCache;
pub use metrics::VisitorStats;
pub use object::{ObjectFields, ObjectRef, Tagged, TypeDescriptor, VisitorId, TAGGED_SIZE};
pub use pretenuring::{
    AllocationSiteId, GlobalPretenuringFeedback, NoPretenuring, PretenuringFeedbackMap,
    PretenuringHandler, SurvivalTracker,
};
pub use region::{Generation, Region};
pub use slot::{LoadMode, Slot, Slots};
pub use visitor::{MarkingContext, SlotOutcome, YoungGenerationMarkingVisitor};
pub use worklist::{LocalMarkingWorklist, MarkingWorklist, WrapperSnapshot, WrapperWorklist};
