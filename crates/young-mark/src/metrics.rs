//! Marking statistics.

/// Counters collected by one marking visitor over its lifetime.
///
/// Plain integers: a visitor is owned by one worker, so nothing here is
/// shared. Combine per-worker stats with [`merge`](Self::merge) after marking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitorStats {
    /// Slots loaded and classified.
    pub slots_visited: usize,
    /// Objects this visitor won the claim for.
    pub objects_marked: usize,
    /// Claimed objects queued on the worklist.
    pub objects_pushed: usize,
    /// Claimed data-only objects recorded without traversal.
    pub data_only_objects: usize,
    /// Claimed objects whose bodies were visited inline.
    pub objects_visited_directly: usize,
    /// Objects popped from the worklist and visited.
    pub objects_processed: usize,
    /// Slots rewritten by string shortcutting.
    pub strings_shortcut: usize,
    /// Wrapper snapshots forwarded to the embedder.
    pub wrappers_extracted: usize,
    /// Ephemeron tables registered.
    pub ephemeron_tables: usize,
    /// Bytes recorded into live-byte accounting.
    pub live_bytes_recorded: usize,
}

impl VisitorStats {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.slots_visited += other.slots_visited;
        self.objects_marked += other.objects_marked;
        self.objects_pushed += other.objects_pushed;
        self.data_only_objects += other.data_only_objects;
        self.objects_visited_directly += other.objects_visited_directly;
        self.objects_processed += other.objects_processed;
        self.strings_shortcut += other.strings_shortcut;
        self.wrappers_extracted += other.wrappers_extracted;
        self.ephemeron_tables += other.ephemeron_tables;
        self.live_bytes_recorded += other.live_bytes_recorded;
    }
}
