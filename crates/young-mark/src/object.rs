//! Tagged values, object references and type descriptors.
//!
//! A slot holds one machine word. The low two bits tag the word:
//!
//! | Low bits | Meaning                                   |
//! |----------|-------------------------------------------|
//! | `x0`     | Small integer, not an object reference    |
//! | `01`     | Strong reference to a heap object          |
//! | `11`     | Weak reference (cleared if address is 0)  |
//!
//! The marker treats present weak references exactly like strong ones.

use std::fmt;
use std::num::NonZeroUsize;

use crate::pretenuring::AllocationSiteId;

/// Size of one tagged word in bytes.
pub const TAGGED_SIZE: usize = std::mem::size_of::<usize>();

const TAG_MASK: usize = 0b11;
const STRONG_TAG: usize = 0b01;
const WEAK_TAG: usize = 0b11;

/// A raw word as stored in a heap slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tagged(usize);

impl Tagged {
    /// The cleared weak reference.
    pub const CLEARED: Self = Self(WEAK_TAG);

    /// Reinterpret a raw slot word.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw word.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Encode a small integer.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn small_int(value: isize) -> Self {
        Self((value << 1) as usize)
    }

    /// Encode a strong reference to `object`.
    #[must_use]
    pub const fn strong(object: ObjectRef) -> Self {
        Self(object.address() | STRONG_TAG)
    }

    /// Encode a weak reference to `object`.
    #[must_use]
    pub const fn weak(object: ObjectRef) -> Self {
        Self(object.address() | WEAK_TAG)
    }

    /// Whether this word is a small integer.
    #[must_use]
    pub const fn is_small_int(self) -> bool {
        self.0 & 1 == 0
    }

    /// Whether this word is a weak reference (cleared or not).
    #[must_use]
    pub const fn is_weak(self) -> bool {
        self.0 & TAG_MASK == WEAK_TAG
    }

    /// Whether this word is the cleared weak reference.
    #[must_use]
    pub const fn is_cleared(self) -> bool {
        self.0 == WEAK_TAG
    }

    /// The referenced object, for strong and live weak references.
    ///
    /// Small integers and cleared weak references yield `None`.
    #[must_use]
    pub const fn get_heap_object(self) -> Option<ObjectRef> {
        if self.is_small_int() {
            return None;
        }
        ObjectRef::from_address(self.0 & !TAG_MASK)
    }
}

impl fmt::Debug for Tagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_small_int() {
            #[allow(clippy::cast_possible_wrap)]
            let value = (self.0 as isize) >> 1;
            write!(f, "Smi({value})")
        } else if self.is_cleared() {
            f.write_str("Cleared")
        } else if self.is_weak() {
            write!(f, "Weak({:#x})", self.0 & !TAG_MASK)
        } else {
            write!(f, "Strong({:#x})", self.0 & !TAG_MASK)
        }
    }
}

/// Address of a heap object.
///
/// Always non-null and word aligned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(NonZeroUsize);

impl ObjectRef {
    /// Wrap an object address. Returns `None` for null.
    #[must_use]
    pub const fn from_address(address: usize) -> Option<Self> {
        debug_assert!(address % 4 == 0);
        match NonZeroUsize::new(address) {
            Some(address) => Some(Self(address)),
            None => None,
        }
    }

    /// The object's address.
    #[must_use]
    pub const fn address(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.0.get())
    }
}

/// Whether an object category carries outgoing references at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFields {
    /// No reference fields; never needs body traversal.
    DataOnly,
    /// May contain reference fields.
    MaybePointers,
}

/// Traversal category of an object, as recorded in its type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitorId {
    /// Raw bytes, numbers and other payload without references.
    DataObject,
    /// Sequential string characters.
    SeqString,
    /// Generic array of references.
    FixedArray,
    /// Cons string that is not a shortcut candidate.
    ConsString,
    /// Cons string that may be collapsed into its first part.
    ShortcutCandidate,
    /// Forwarding string pointing at an internalized string.
    ThinString,
    /// Regular object.
    JsObject,
    /// Regular object with in-object fields only.
    JsObjectFast,
    /// Object backed by an embedder wrapper.
    JsApiObject,
    /// Array buffer with an off-heap backing store extension.
    JsArrayBuffer,
    /// Typed view over an array buffer.
    JsTypedArray,
    /// Data view over an array buffer.
    JsDataView,
    /// Hash table with weak keys and values.
    EphemeronHashTable,
}

impl VisitorId {
    /// Field shape for this category.
    #[must_use]
    pub const fn object_fields(self) -> ObjectFields {
        match self {
            Self::DataObject | Self::SeqString => ObjectFields::DataOnly,
            _ => ObjectFields::MaybePointers,
        }
    }

    /// Whether objects of this category may carry an embedder wrapper.
    #[must_use]
    pub const fn is_embedder_tracing_subclass(self) -> bool {
        matches!(
            self,
            Self::JsApiObject | Self::JsArrayBuffer | Self::JsTypedArray | Self::JsDataView
        )
    }
}

/// Per-object metadata the marker reads: category, size and allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Traversal category.
    pub visitor_id: VisitorId,
    /// Object size in bytes.
    pub size: usize,
    /// Allocation site that produced the object, if tracked.
    pub allocation_site: Option<AllocationSiteId>,
}

impl TypeDescriptor {
    /// Descriptor without an allocation site.
    #[must_use]
    pub const fn new(visitor_id: VisitorId, size: usize) -> Self {
        Self {
            visitor_id,
            size,
            allocation_site: None,
        }
    }

    /// Attach an allocation site.
    #[must_use]
    pub const fn with_allocation_site(mut self, site: AllocationSiteId) -> Self {
        self.allocation_site = Some(site);
        self
    }

    /// Shorthand for `visitor_id.object_fields()`.
    #[must_use]
    pub const fn object_fields(&self) -> ObjectFields {
        self.visitor_id.object_fields()
    }
}

/// Index of the target field in a thin string body.
pub const THIN_STRING_ACTUAL_INDEX: usize = 0;
/// Index of the first part in a cons string body.
pub const CONS_STRING_FIRST_INDEX: usize = 0;
/// Index of the second part in a cons string body.
pub const CONS_STRING_SECOND_INDEX: usize = 1;
/// Fields per ephemeron table entry (key, value).
pub const EPHEMERON_ENTRY_SIZE: usize = 2;

/// Field index of the value of ephemeron table entry `entry`.
#[must_use]
pub const fn ephemeron_value_index(entry: usize) -> usize {
    entry * EPHEMERON_ENTRY_SIZE + 1
}
