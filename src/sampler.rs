// SPDX-License-Identifier: MIT
//! Stability evaluation: the pure predicate and the bounded sample history.
//!
//! [`compute_verdict`] is the single place stability is decided. Both the
//! polling wait and the one-shot status check go through it, so the two APIs
//! can never disagree about what "stable" means.

use crate::model::{ActivitySnapshot, SampleHistoryEntry, StabilityVerdict};
use std::collections::VecDeque;

/// Decide stability for one snapshot.
///
/// Stable iff every pending count is zero and no render cycle is active.
/// Pure and total: defined for every snapshot, including degraded ones —
/// degraded confidence is carried alongside the boolean, never folded into
/// it, so callers can distinguish "idle" from "idle as far as we can tell".
pub fn compute_verdict(snapshot: &ActivitySnapshot) -> StabilityVerdict {
    let is_stable = snapshot.pending_macro_tasks == 0
        && snapshot.pending_micro_tasks == 0
        && snapshot.pending_network_requests == 0
        && snapshot.pending_timers == 0
        && snapshot.pending_deferred_computations == 0
        && !snapshot.render_cycle_active;
    StabilityVerdict {
        snapshot: snapshot.clone(),
        is_stable,
    }
}

// ─── Sample history ──────────────────────────────────────────────────────────

/// Bounded FIFO ring of the samples taken by one wait.
///
/// Holds at most `cap` entries; appending beyond that drops the oldest. The
/// retained content depends only on the order entries were appended, never on
/// timing.
#[derive(Debug)]
pub struct SampleHistory {
    entries: VecDeque<SampleHistoryEntry>,
    cap: usize,
}

impl SampleHistory {
    /// Empty history with the given capacity.
    ///
    /// `cap` comes from a validated [`crate::model::WaitConfig`], so it is at
    /// least 1.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append an entry, dropping the oldest if the ring is full.
    pub fn append(&mut self, entry: SampleHistoryEntry) {
        self.entries.push_back(entry);
        if self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Number of retained entries. Never exceeds the capacity.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fixed capacity this ring was created with.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Consume the ring, returning the retained entries oldest first.
    pub fn into_vec(self) -> Vec<SampleHistoryEntry> {
        self.entries.into_iter().collect()
    }
}
