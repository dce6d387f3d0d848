//! Marking tracing spans.
//!
//! Only compiled with the `tracing` feature. Per-slot paths never log; these
//! helpers cover visitor lifetime and worklist draining.

use tracing::Span;

use crate::config::MarkingMode;
use crate::metrics::VisitorStats;

/// Create a span covering one visitor's lifetime.
pub fn span_marking_visitor(mode: MarkingMode) -> Span {
    tracing::debug_span!("young_marking_visitor", mode = ?mode)
}

/// Log a drained local worklist.
pub fn log_worklist_drained(objects_processed: usize) {
    tracing::debug!(objects_processed, "worklist_drained");
}

/// Log the final state of a visitor when it publishes and flushes.
pub fn log_visitor_teardown(stats: &VisitorStats, live_bytes_flushed: usize) {
    tracing::debug!(
        objects_marked = stats.objects_marked,
        objects_pushed = stats.objects_pushed,
        objects_processed = stats.objects_processed,
        strings_shortcut = stats.strings_shortcut,
        ephemeron_tables = stats.ephemeron_tables,
        live_bytes_recorded = stats.live_bytes_recorded,
        live_bytes_flushed,
        "visitor_teardown"
    );
}
