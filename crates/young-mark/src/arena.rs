//! A simple region-based heap implementing [`Heap`].
//!
//! `ArenaHeap` lays objects out at synthetic, region-aligned addresses so that
//! the owning region of any object is found with a division, the same way a
//! page header is found by masking an address. Each object has a map word
//! (an index into the descriptor table) and an array of reference fields.
//!
//! Region 0 is always an old-generation region holding the read-only roots,
//! including the canonical empty string.
//!
//! # Example
//!
//! ```
//! use young_mark::arena::ArenaHeap;
//! use young_mark::{Heap, Tagged};
//!
//! let mut heap = ArenaHeap::builder().young_regions(1).old_regions(1).build();
//! let young = heap.young_region(0);
//! let old = heap.old_region(0);
//!
//! let leaf = heap.allocate_data(old, 16);
//! let array = heap.allocate_fixed_array(young, &[Tagged::strong(leaf)]);
//!
//! assert!(heap.in_young_generation(array));
//! assert!(!heap.in_young_generation(leaf));
//! assert_eq!(heap.field(array, 0), Tagged::strong(leaf));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::heap::Heap;
use crate::object::{ObjectRef, Tagged, TypeDescriptor, VisitorId, TAGGED_SIZE};
use crate::region::{Generation, Region};
use crate::slot::{LoadMode, Slots};
use crate::worklist::WrapperSnapshot;

/// Address of the first region.
pub const ARENA_BASE: usize = 0x1000_0000;

/// Distance between consecutive object addresses.
pub const OBJECT_STRIDE: usize = 2 * TAGGED_SIZE;

/// Default number of objects per region.
pub const DEFAULT_REGION_CAPACITY: usize = 1024;

/// Objects per region must keep the region's mark bitmap 64-bit aligned.
const CAPACITY_GRANULE: usize = 64 * TAGGED_SIZE / OBJECT_STRIDE;

/// Handle to a region of an [`ArenaHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(usize);

impl RegionId {
    /// Index of the region.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

struct ArenaObject {
    map: AtomicUsize,
    fields: Box<[AtomicUsize]>,
    wrapper: Option<WrapperSnapshot>,
    extension_marked: AtomicBool,
}

/// Builder for [`ArenaHeap`].
#[derive(Debug, Clone, Copy)]
pub struct ArenaHeapBuilder {
    young_regions: usize,
    old_regions: usize,
    region_capacity: usize,
}

impl Default for ArenaHeapBuilder {
    fn default() -> Self {
        Self {
            young_regions: 1,
            old_regions: 1,
            region_capacity: DEFAULT_REGION_CAPACITY,
        }
    }
}

impl ArenaHeapBuilder {
    /// Number of young-generation regions.
    #[must_use]
    pub const fn young_regions(mut self, count: usize) -> Self {
        self.young_regions = count;
        self
    }

    /// Number of old-generation regions, not counting the read-only region.
    #[must_use]
    pub const fn old_regions(mut self, count: usize) -> Self {
        self.old_regions = count;
        self
    }

    /// Objects per region. Rounded up to keep mark bitmaps word aligned.
    #[must_use]
    pub const fn region_capacity(mut self, objects: usize) -> Self {
        self.region_capacity = objects;
        self
    }

    /// Create the heap.
    #[must_use]
    pub fn build(self) -> ArenaHeap {
        let capacity = self.region_capacity.max(1).next_multiple_of(CAPACITY_GRANULE);
        let region_size = capacity * OBJECT_STRIDE;

        let generations = std::iter::once(Generation::Old)
            .chain(std::iter::repeat_n(Generation::Young, self.young_regions))
            .chain(std::iter::repeat_n(Generation::Old, self.old_regions));
        let regions: Vec<Region> = generations
            .enumerate()
            .map(|(id, generation)| {
                Region::new(id, ARENA_BASE + id * region_size, region_size, generation)
            })
            .collect();
        let objects = regions.iter().map(|_| Vec::new()).collect();

        let mut heap = ArenaHeap {
            regions,
            objects,
            descriptors: Vec::new(),
            descriptor_index: HashMap::new(),
            region_capacity: capacity,
            region_size,
            young_regions: self.young_regions,
            empty_string: ObjectRef::from_address(ARENA_BASE),
        };
        let empty_string = heap.allocate(
            RegionId(0),
            TypeDescriptor::new(VisitorId::SeqString, TAGGED_SIZE * 2),
            0,
        );
        debug_assert_eq!(heap.empty_string, Some(empty_string));
        heap
    }
}

/// A region-based heap for driving the marker.
pub struct ArenaHeap {
    regions: Vec<Region>,
    objects: Vec<Vec<ArenaObject>>,
    descriptors: Vec<TypeDescriptor>,
    descriptor_index: HashMap<TypeDescriptor, usize>,
    region_capacity: usize,
    region_size: usize,
    young_regions: usize,
    empty_string: Option<ObjectRef>,
}

impl ArenaHeap {
    /// Start building a heap.
    #[must_use]
    pub fn builder() -> ArenaHeapBuilder {
        ArenaHeapBuilder::default()
    }

    /// The `index`-th young region.
    ///
    /// # Panics
    ///
    /// Panics if there are not that many young regions.
    #[must_use]
    pub fn young_region(&self, index: usize) -> RegionId {
        assert!(index < self.young_regions, "no young region {index}");
        RegionId(1 + index)
    }

    /// The `index`-th old region.
    ///
    /// # Panics
    ///
    /// Panics if there are not that many old regions.
    #[must_use]
    pub fn old_region(&self, index: usize) -> RegionId {
        let id = 1 + self.young_regions + index;
        assert!(id < self.regions.len(), "no old region {index}");
        RegionId(id)
    }

    /// The region behind `id`.
    #[must_use]
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    /// All regions, read-only region first.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Objects that still fit in each region.
    #[must_use]
    pub const fn region_capacity(&self) -> usize {
        self.region_capacity
    }

    /// Allocate an object with `field_count` reference fields, all set to
    /// the small integer zero.
    ///
    /// # Panics
    ///
    /// Panics if the region is full.
    pub fn allocate(
        &mut self,
        region: RegionId,
        descriptor: TypeDescriptor,
        field_count: usize,
    ) -> ObjectRef {
        let objects = &mut self.objects[region.0];
        assert!(
            objects.len() < self.region_capacity,
            "region {} is full",
            region.0
        );
        let address = self.regions[region.0].start() + objects.len() * OBJECT_STRIDE;

        let next_index = self.descriptors.len();
        let map = *self
            .descriptor_index
            .entry(descriptor)
            .or_insert(next_index);
        if map == next_index {
            self.descriptors.push(descriptor);
        }

        objects.push(ArenaObject {
            map: AtomicUsize::new(map),
            fields: (0..field_count)
                .map(|_| AtomicUsize::new(Tagged::small_int(0).raw()))
                .collect(),
            wrapper: None,
            extension_marked: AtomicBool::new(false),
        });
        let Some(object) = ObjectRef::from_address(address) else {
            unreachable!("arena addresses start at {ARENA_BASE:#x}");
        };
        object
    }

    /// Allocate a data-only object of `size` bytes.
    pub fn allocate_data(&mut self, region: RegionId, size: usize) -> ObjectRef {
        self.allocate(region, TypeDescriptor::new(VisitorId::DataObject, size), 0)
    }

    /// Allocate a fixed array holding `fields`.
    pub fn allocate_fixed_array(&mut self, region: RegionId, fields: &[Tagged]) -> ObjectRef {
        self.allocate_with_fields(region, VisitorId::FixedArray, fields)
    }

    /// Allocate an object of category `visitor_id` holding `fields`.
    ///
    /// The size is one header word plus one word per field.
    pub fn allocate_with_fields(
        &mut self,
        region: RegionId,
        visitor_id: VisitorId,
        fields: &[Tagged],
    ) -> ObjectRef {
        let descriptor = TypeDescriptor::new(visitor_id, Self::size_for_fields(fields.len()));
        self.allocate_described(region, descriptor, fields)
    }

    /// Allocate an object with an explicit descriptor holding `fields`.
    pub fn allocate_described(
        &mut self,
        region: RegionId,
        descriptor: TypeDescriptor,
        fields: &[Tagged],
    ) -> ObjectRef {
        let object = self.allocate(region, descriptor, fields.len());
        for (index, value) in fields.iter().enumerate() {
            self.set_field(object, index, *value);
        }
        object
    }

    /// Allocate a thin string forwarding to `actual`.
    pub fn allocate_thin_string(&mut self, region: RegionId, actual: ObjectRef) -> ObjectRef {
        self.allocate_with_fields(region, VisitorId::ThinString, &[Tagged::strong(actual)])
    }

    /// Allocate a shortcut-candidate cons string.
    pub fn allocate_cons_string(
        &mut self,
        region: RegionId,
        first: ObjectRef,
        second: ObjectRef,
    ) -> ObjectRef {
        self.allocate_with_fields(
            region,
            VisitorId::ShortcutCandidate,
            &[Tagged::strong(first), Tagged::strong(second)],
        )
    }

    /// Allocate an ephemeron table from `(key, value)` entries.
    pub fn allocate_ephemeron_table(
        &mut self,
        region: RegionId,
        entries: &[(Tagged, Tagged)],
    ) -> ObjectRef {
        let fields: Vec<Tagged> = entries
            .iter()
            .flat_map(|&(key, value)| [key, value])
            .collect();
        self.allocate_with_fields(region, VisitorId::EphemeronHashTable, &fields)
    }

    /// Size of an object with `field_count` fields and a header word.
    #[must_use]
    pub const fn size_for_fields(field_count: usize) -> usize {
        (1 + field_count) * TAGGED_SIZE
    }

    /// Attach embedder fields to `object`.
    pub fn set_wrapper(&mut self, object: ObjectRef, snapshot: WrapperSnapshot) {
        self.object_mut(object).wrapper = Some(snapshot);
    }

    /// Overwrite field `index` of `object`.
    ///
    /// # Panics
    ///
    /// Panics if the field does not exist.
    pub fn set_field(&self, object: ObjectRef, index: usize, value: Tagged) {
        self.object(object).fields[index].store(value.raw(), Ordering::Relaxed);
    }

    /// Read field `index` of `object`.
    ///
    /// # Panics
    ///
    /// Panics if the field does not exist.
    #[must_use]
    pub fn field(&self, object: ObjectRef, index: usize) -> Tagged {
        Tagged::from_raw(self.object(object).fields[index].load(Ordering::Relaxed))
    }

    /// Whether `object` has been claimed this cycle.
    #[must_use]
    pub fn is_marked(&self, object: ObjectRef) -> bool {
        self.region_of(object).is_marked(object)
    }

    /// Whether the extension of array buffer `object` was marked live.
    #[must_use]
    pub fn array_buffer_extension_marked(&self, object: ObjectRef) -> bool {
        self.object(object).extension_marked.load(Ordering::Relaxed)
    }

    /// Clear marks, live bytes and extension marks for a new cycle.
    pub fn reset_marking(&self) {
        for region in &self.regions {
            region.clear_marks();
            region.reset_live_bytes();
        }
        for object in self.objects.iter().flatten() {
            object.extension_marked.store(false, Ordering::Relaxed);
        }
    }

    fn region_index(&self, object: ObjectRef) -> usize {
        let index = object
            .address()
            .checked_sub(ARENA_BASE)
            .map(|offset| offset / self.region_size);
        match index {
            Some(index) if index < self.regions.len() => index,
            _ => panic!("{object:?} is not an arena address"),
        }
    }

    fn object(&self, object: ObjectRef) -> &ArenaObject {
        let region = self.region_index(object);
        let index = (object.address() - self.regions[region].start()) / OBJECT_STRIDE;
        &self.objects[region][index]
    }

    fn object_mut(&mut self, object: ObjectRef) -> &mut ArenaObject {
        let region = self.region_index(object);
        let index = (object.address() - self.regions[region].start()) / OBJECT_STRIDE;
        &mut self.objects[region][index]
    }
}

impl Heap for ArenaHeap {
    fn region_of(&self, object: ObjectRef) -> &Region {
        &self.regions[self.region_index(object)]
    }

    unsafe fn descriptor(&self, object: ObjectRef, mode: LoadMode) -> TypeDescriptor {
        let map = &self.object(object).map;
        let index = match mode {
            LoadMode::Relaxed => map.load(Ordering::Relaxed),
            // SAFETY: The caller guarantees the map word is not written
            // concurrently.
            LoadMode::Plain => unsafe { map.as_ptr().read() },
        };
        self.descriptors[index]
    }

    fn fields(&self, object: ObjectRef) -> Slots<'_> {
        Slots::new(&self.object(object).fields)
    }

    fn empty_string(&self) -> ObjectRef {
        let Some(empty_string) = self.empty_string else {
            unreachable!("the read-only region starts at {ARENA_BASE:#x}");
        };
        empty_string
    }

    fn extract_wrapper(
        &self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
    ) -> Option<WrapperSnapshot> {
        if !descriptor.visitor_id.is_embedder_tracing_subclass() {
            return None;
        }
        self.object(object).wrapper
    }

    fn mark_array_buffer_extension(&self, object: ObjectRef) {
        self.object(object)
            .extension_marked
            .store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for ArenaHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaHeap")
            .field("regions", &self.regions.len())
            .field("young_regions", &self.young_regions)
            .field("region_capacity", &self.region_capacity)
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}
