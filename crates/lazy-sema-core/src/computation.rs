//! Cycle detection and deduplication for one top-level resolution call.
//!
//! A computation session is created at the root of an externally-triggered
//! resolve for a single phase and shared by reference with every target
//! resolver spawned under it, including resolvers spawned to chase
//! dependencies into other files. Cycle detection is therefore global to
//! the call tree, not per resolver instance. The session is discarded when
//! the root call returns, so a declaration deferred by a cycle is eligible
//! again on the next top-level request.

use lazy_sema_types::DeclId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Status of a declaration within one computation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    InProgress,
    Done,
}

/// Tracks in-flight resolution requests for a single phase.
#[derive(Debug, Default)]
pub struct ComputationSession {
    statuses: Mutex<HashMap<DeclId, ResolutionStatus>>,
    cycles_deferred: AtomicU64,
}

impl ComputationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a declaration for resolution. Returns `false` if it is already
    /// claimed: in flight (a cycle back-edge) or finished. Callers check
    /// [`ComputationSession::is_done`] first to tell the two apart.
    pub fn mark_in_progress(&self, decl: DeclId) -> bool {
        let mut statuses = self.statuses.lock();
        match statuses.get(&decl) {
            Some(_) => false,
            None => {
                statuses.insert(decl, ResolutionStatus::InProgress);
                true
            }
        }
    }

    pub fn mark_done(&self, decl: DeclId) {
        self.statuses.lock().insert(decl, ResolutionStatus::Done);
    }

    pub fn is_in_progress(&self, decl: DeclId) -> bool {
        matches!(
            self.statuses.lock().get(&decl),
            Some(ResolutionStatus::InProgress)
        )
    }

    pub fn is_done(&self, decl: DeclId) -> bool {
        matches!(self.statuses.lock().get(&decl), Some(ResolutionStatus::Done))
    }

    /// Record a cycle back-edge that was deferred rather than recursed into.
    pub fn note_deferred(&self) {
        self.cycles_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deferred_count(&self) -> u64 {
        self.cycles_deferred.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_signals_a_cycle() {
        let session = ComputationSession::new();
        let decl = DeclId(5);

        assert!(session.mark_in_progress(decl));
        assert!(session.is_in_progress(decl));
        assert!(!session.mark_in_progress(decl));

        session.mark_done(decl);
        assert!(session.is_done(decl));
        assert!(!session.is_in_progress(decl));
        assert!(!session.mark_in_progress(decl));
    }

    #[test]
    fn deferred_count_accumulates() {
        let session = ComputationSession::new();
        assert_eq!(session.deferred_count(), 0);
        session.note_deferred();
        session.note_deferred();
        assert_eq!(session.deferred_count(), 2);
    }
}
