// SPDX-License-Identifier: MIT
//! Snapshot aggregation and the one-shot status check.

use crate::model::{ActivitySnapshot, StabilityVerdict};
use crate::probe::ActivityProbe;
use crate::sampler::compute_verdict;
use tracing::debug;

/// Collapse a snapshot into one total pending-operation count: the sum of
/// the five counts, plus one when a render cycle is active.
///
/// Diagnostics only ("timed out, 7 operations still pending"). Stability is
/// never decided from this scalar; that is [`compute_verdict`]'s job.
pub fn scalar_pending_count(snapshot: &ActivitySnapshot) -> u64 {
    let render = u64::from(snapshot.render_cycle_active);
    snapshot.pending_macro_tasks
        + snapshot.pending_micro_tasks
        + snapshot.pending_network_requests
        + snapshot.pending_timers
        + snapshot.pending_deferred_computations
        + render
}

/// Answers "is the target quiescent right now?" without waiting.
pub struct ActivityAggregator {
    probe: ActivityProbe,
}

impl ActivityAggregator {
    /// Aggregator over an already-discovered probe.
    pub fn new(probe: ActivityProbe) -> Self {
        Self { probe }
    }

    /// Take exactly one sample and evaluate it.
    ///
    /// No loop, no timer, and the identical predicate the polling wait uses,
    /// so this check and a wait's final sample can never disagree about what
    /// "stable" means.
    pub async fn status_check(&self) -> StabilityVerdict {
        let snapshot = self.probe.sample().await;
        let verdict = compute_verdict(&snapshot);
        debug!(
            is_stable = verdict.is_stable,
            pending = scalar_pending_count(&snapshot),
            "one-shot quiescence status"
        );
        verdict
    }
}
