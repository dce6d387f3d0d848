//! Visitor configuration.
//!
//! All mode-dependent behavior is fixed when a visitor is constructed. There
//! is no global or environment state.

use crate::object::TAGGED_SIZE;
use crate::slot::LoadMode;

/// Execution mode of a marking visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkingMode {
    /// Many workers, possibly alongside the running program. Relaxed loads,
    /// every discovered object goes through the worklist.
    #[default]
    Parallel,
    /// One worker while the program is paused. Plain loads, inline
    /// visitation on request.
    Sequential,
}

impl MarkingMode {
    /// How slots and descriptors are loaded in this mode.
    #[must_use]
    pub const fn load_mode(self) -> LoadMode {
        match self {
            Self::Parallel => LoadMode::Relaxed,
            Self::Sequential => LoadMode::Plain,
        }
    }

    /// Whether slots may be rewritten while visiting them.
    #[must_use]
    pub const fn allows_slot_rewrite(self) -> bool {
        matches!(self, Self::Parallel)
    }
}

/// What to do with a newly claimed object that needs body traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectVisitationMode {
    /// Queue it on the local worklist.
    #[default]
    PushToWorklist,
    /// Visit its body right away. Only honored in sequential mode.
    VisitDirectly,
}

/// Default allocation alignment: one tagged word.
pub const DEFAULT_ALLOCATION_ALIGNMENT: usize = TAGGED_SIZE;

/// Capability flags for a marking visitor.
///
/// # Example
///
/// ```
/// use young_mark::{MarkingMode, VisitorConfig};
///
/// let config = VisitorConfig::parallel()
///     .with_shortcut_strings(true)
///     .with_allocation_alignment(16);
/// assert_eq!(config.mode, MarkingMode::Parallel);
/// assert!(config.shortcut_strings);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisitorConfig {
    /// Parallel or sequential traversal.
    pub mode: MarkingMode,
    /// Collapse thin strings and cons strings with an empty second part
    /// while visiting slots. Only takes effect in parallel mode.
    pub shortcut_strings: bool,
    /// Diagnostic builds: perform a synchronizing read on the region of
    /// every newly discovered object.
    pub synchronized_heap_load: bool,
    /// Recorded live sizes are rounded up to this many bytes.
    pub allocation_alignment: usize,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self::parallel()
    }
}

impl VisitorConfig {
    /// Parallel mode with string shortcutting enabled.
    #[must_use]
    pub const fn parallel() -> Self {
        Self {
            mode: MarkingMode::Parallel,
            shortcut_strings: true,
            synchronized_heap_load: false,
            allocation_alignment: DEFAULT_ALLOCATION_ALIGNMENT,
        }
    }

    /// Sequential mode.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            mode: MarkingMode::Sequential,
            shortcut_strings: false,
            synchronized_heap_load: false,
            allocation_alignment: DEFAULT_ALLOCATION_ALIGNMENT,
        }
    }

    /// Enable or disable string shortcutting.
    #[must_use]
    pub const fn with_shortcut_strings(mut self, enabled: bool) -> Self {
        self.shortcut_strings = enabled;
        self
    }

    /// Enable or disable the diagnostic synchronizing read.
    #[must_use]
    pub const fn with_synchronized_heap_load(mut self, enabled: bool) -> Self {
        self.synchronized_heap_load = enabled;
        self
    }

    /// Set the allocation alignment.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two or is smaller than a
    /// tagged word.
    #[must_use]
    pub const fn with_allocation_alignment(mut self, alignment: usize) -> Self {
        assert!(
            alignment.is_power_of_two() && alignment >= TAGGED_SIZE,
            "allocation alignment must be a power of two of at least one word"
        );
        self.allocation_alignment = alignment;
        self
    }

    /// Whether string shortcutting is active for this configuration.
    #[must_use]
    pub const fn shortcuts_strings(&self) -> bool {
        self.shortcut_strings && self.mode.allows_slot_rewrite()
    }

    /// Round `size` up to the allocation alignment.
    #[must_use]
    pub const fn align_to_allocation_alignment(&self, size: usize) -> usize {
        (size + self.allocation_alignment - 1) & !(self.allocation_alignment - 1)
    }
}
