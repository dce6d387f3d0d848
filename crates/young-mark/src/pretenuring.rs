//! Pretenuring feedback collected while marking.
//!
//! Each visitor owns a [`PretenuringFeedbackMap`] and records survivors per
//! allocation site into it. Nothing here touches shared statistics on the hot
//! path; after all workers finish, their maps are merged into a
//! [`GlobalPretenuringFeedback`] once per worker.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::object::{ObjectRef, TypeDescriptor};

/// Identifier of an allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationSiteId(pub u32);

/// Survivor counts per allocation site, local to one visitor.
pub type PretenuringFeedbackMap = HashMap<AllocationSiteId, usize>;

/// Hook invoked after an object body has been visited successfully.
///
/// The pretenuring decision heuristic lives behind this trait; the marker
/// only reports survivors.
pub trait PretenuringHandler: Sync {
    /// Record that `object`, described by `descriptor`, survived.
    fn update_allocation_site(
        &self,
        descriptor: &TypeDescriptor,
        object: ObjectRef,
        feedback: &mut PretenuringFeedbackMap,
    );
}

/// Counts one survivor per visited object that carries an allocation site.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurvivalTracker;

impl PretenuringHandler for SurvivalTracker {
    fn update_allocation_site(
        &self,
        descriptor: &TypeDescriptor,
        _object: ObjectRef,
        feedback: &mut PretenuringFeedbackMap,
    ) {
        if let Some(site) = descriptor.allocation_site {
            *feedback.entry(site).or_insert(0) += 1;
        }
    }
}

/// Ignores all feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPretenuring;

impl PretenuringHandler for NoPretenuring {
    fn update_allocation_site(
        &self,
        _descriptor: &TypeDescriptor,
        _object: ObjectRef,
        _feedback: &mut PretenuringFeedbackMap,
    ) {
    }
}

/// Cycle-wide survivor counts, filled after marking completes.
#[derive(Debug, Default)]
pub struct GlobalPretenuringFeedback {
    sites: Mutex<PretenuringFeedbackMap>,
}

impl GlobalPretenuringFeedback {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one worker's local feedback and clear it.
    pub fn merge(&self, local: &mut PretenuringFeedbackMap) {
        let mut sites = self.sites.lock();
        for (site, count) in local.drain() {
            *sites.entry(site).or_insert(0) += count;
        }
    }

    /// Survivor count recorded for `site`.
    #[must_use]
    pub fn survivors(&self, site: AllocationSiteId) -> usize {
        self.sites.lock().get(&site).copied().unwrap_or(0)
    }

    /// Take the merged table, leaving it empty for the next cycle.
    #[must_use]
    pub fn take(&self) -> PretenuringFeedbackMap {
        std::mem::take(&mut *self.sites.lock())
    }
}
