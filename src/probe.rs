// SPDX-License-Identifier: MIT
//! Activity probing.
//!
//! An [`ActivityProbe`] is a pure sensor: each [`ActivityProbe::sample`] call
//! reads every measurable dimension once and returns an immutable
//! [`ActivitySnapshot`]. Sampling never fails — a dimension that cannot be
//! read defaults to zero and flags the snapshot as degraded.

use crate::model::ActivitySnapshot;
use crate::target::{Dimension, DimensionSource, TargetHandle};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads pending-work counts from a target.
///
/// Capabilities are discovered once, at construction: the probe asks the
/// target for each dimension's source and the answers are fixed for the
/// probe's lifetime. No per-call feature sniffing happens after that.
///
/// Cheaply cloneable; clones share the target, the discovered sources, and
/// the sample counter. Concurrent `sample` calls are safe — the probe only
/// reads.
#[derive(Clone)]
pub struct ActivityProbe {
    target: Arc<dyn TargetHandle>,
    macro_tasks: Option<Arc<dyn DimensionSource>>,
    micro_tasks: Option<Arc<dyn DimensionSource>>,
    network_requests: Option<Arc<dyn DimensionSource>>,
    timers: Option<Arc<dyn DimensionSource>>,
    deferred_computations: Option<Arc<dyn DimensionSource>>,
    render_cycle: Option<Arc<dyn DimensionSource>>,
    samples_taken: Arc<AtomicU64>,
}

impl ActivityProbe {
    /// Build a probe for the given target, querying each dimension's source
    /// exactly once.
    pub fn discover(target: Arc<dyn TargetHandle>) -> Self {
        Self {
            macro_tasks: lookup(&target, Dimension::MacroTasks),
            micro_tasks: lookup(&target, Dimension::MicroTasks),
            network_requests: lookup(&target, Dimension::NetworkRequests),
            timers: lookup(&target, Dimension::Timers),
            deferred_computations: lookup(&target, Dimension::DeferredComputations),
            render_cycle: lookup(&target, Dimension::RenderCycle),
            samples_taken: Arc::new(AtomicU64::new(0)),
            target,
        }
    }

    /// Capture one snapshot of pending activity.
    ///
    /// Infallible: a missing capability or a failing source defaults that
    /// dimension to zero and sets `degraded_confidence` on the snapshot.
    /// Cost is bounded by the number of dimensions; no history is kept here.
    pub async fn sample(&self) -> ActivitySnapshot {
        self.samples_taken.fetch_add(1, Ordering::Relaxed);

        let mut degraded = false;
        let pending_macro_tasks = self
            .measure(&self.macro_tasks, Dimension::MacroTasks, &mut degraded)
            .await;
        let pending_micro_tasks = self
            .measure(&self.micro_tasks, Dimension::MicroTasks, &mut degraded)
            .await;
        let pending_network_requests = self
            .measure(
                &self.network_requests,
                Dimension::NetworkRequests,
                &mut degraded,
            )
            .await;
        let pending_timers = self
            .measure(&self.timers, Dimension::Timers, &mut degraded)
            .await;
        let pending_deferred_computations = self
            .measure(
                &self.deferred_computations,
                Dimension::DeferredComputations,
                &mut degraded,
            )
            .await;
        let render_in_flight = self
            .measure(&self.render_cycle, Dimension::RenderCycle, &mut degraded)
            .await;

        ActivitySnapshot {
            captured_at: Utc::now(),
            pending_macro_tasks,
            pending_micro_tasks,
            pending_network_requests,
            pending_timers,
            pending_deferred_computations,
            render_cycle_active: render_in_flight != 0,
            degraded_confidence: degraded,
        }
    }

    /// Total number of `sample` calls made through this probe and its clones.
    pub fn samples_taken(&self) -> u64 {
        self.samples_taken.load(Ordering::Relaxed)
    }

    async fn measure(
        &self,
        source: &Option<Arc<dyn DimensionSource>>,
        dimension: Dimension,
        degraded: &mut bool,
    ) -> u64 {
        // A missing capability was already logged once at discovery; only a
        // failing read is worth a warning per sample.
        match source {
            None => {
                *degraded = true;
                0
            }
            Some(source) => match source.pending().await {
                Ok(count) => count,
                Err(e) => {
                    warn!(
                        app = %self.target.describe(),
                        dimension = %dimension,
                        error = %e,
                        "dimension read failed, defaulting to zero"
                    );
                    *degraded = true;
                    0
                }
            },
        }
    }
}

fn lookup(
    target: &Arc<dyn TargetHandle>,
    dimension: Dimension,
) -> Option<Arc<dyn DimensionSource>> {
    let source = target.dimension_source(dimension);
    if source.is_none() {
        debug!(
            app = %target.describe(),
            dimension = %dimension,
            "dimension not measurable on this target"
        );
    }
    source
}

impl std::fmt::Debug for ActivityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityProbe")
            .field("app", &self.target.describe())
            .field("samples_taken", &self.samples_taken())
            .finish()
    }
}
