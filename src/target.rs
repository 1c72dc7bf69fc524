// SPDX-License-Identifier: MIT
//! The boundary between the detector and whatever supplies activity data.
//!
//! The detector never talks to a browser protocol or framework directly. It
//! sees a [`TargetHandle`], which exposes one optional [`DimensionSource`]
//! per activity [`Dimension`]. The session layer decides what backs those
//! sources; [`InstrumentedTarget`] is the in-process, counter-backed
//! implementation it feeds from protocol events, and the one the test suite
//! drives.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One independently measured kind of pending activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Queued event-loop macro tasks.
    MacroTasks,
    /// Queued micro tasks (continuations).
    MicroTasks,
    /// In-flight network requests.
    NetworkRequests,
    /// Armed timers.
    Timers,
    /// Scheduled deferred computations.
    DeferredComputations,
    /// In-flight render/update cycles.
    RenderCycle,
}

impl Dimension {
    /// Every dimension, in snapshot field order.
    pub const ALL: [Dimension; 6] = [
        Dimension::MacroTasks,
        Dimension::MicroTasks,
        Dimension::NetworkRequests,
        Dimension::Timers,
        Dimension::DeferredComputations,
        Dimension::RenderCycle,
    ];
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::MacroTasks => write!(f, "macro_tasks"),
            Dimension::MicroTasks => write!(f, "micro_tasks"),
            Dimension::NetworkRequests => write!(f, "network_requests"),
            Dimension::Timers => write!(f, "timers"),
            Dimension::DeferredComputations => write!(f, "deferred_computations"),
            Dimension::RenderCycle => write!(f, "render_cycle"),
        }
    }
}

/// Reads the pending count for a single dimension.
///
/// An `Err` means "this dimension could not be measured right now". The probe
/// absorbs it as degraded confidence; it is never propagated to the caller.
#[async_trait]
pub trait DimensionSource: Send + Sync {
    /// Current number of pending operations on this dimension. For
    /// [`Dimension::RenderCycle`] any nonzero value means a cycle is active.
    async fn pending(&self) -> anyhow::Result<u64>;
}

/// Opaque handle to the monitored application, supplied by the session layer.
pub trait TargetHandle: Send + Sync {
    /// Short human-readable description for logging (e.g. an app URL or tab id).
    fn describe(&self) -> &str;

    /// Whether the target still exists. A wait observing `false` terminates
    /// with a detached outcome instead of polling a dead handle.
    fn is_attached(&self) -> bool;

    /// Source for one dimension, or `None` when the target cannot measure it.
    ///
    /// Queried once per dimension when a probe is built; the answer is fixed
    /// for the probe's lifetime.
    fn dimension_source(&self, dimension: Dimension) -> Option<Arc<dyn DimensionSource>>;
}

// ─── Counter-backed reference target ─────────────────────────────────────────

/// One atomic pending counter per dimension.
///
/// The session layer increments and decrements these from protocol events
/// (request sent / response received, timer armed / fired, …). Decrements
/// saturate at zero so a missed increment can never produce a negative count.
#[derive(Debug, Default)]
pub struct ActivityCounters {
    macro_tasks: AtomicU64,
    micro_tasks: AtomicU64,
    network_requests: AtomicU64,
    timers: AtomicU64,
    deferred_computations: AtomicU64,
    render_cycles: AtomicU64,
}

impl ActivityCounters {
    /// All counters start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, dimension: Dimension) -> &AtomicU64 {
        match dimension {
            Dimension::MacroTasks => &self.macro_tasks,
            Dimension::MicroTasks => &self.micro_tasks,
            Dimension::NetworkRequests => &self.network_requests,
            Dimension::Timers => &self.timers,
            Dimension::DeferredComputations => &self.deferred_computations,
            Dimension::RenderCycle => &self.render_cycles,
        }
    }

    /// Current value of one counter.
    pub fn get(&self, dimension: Dimension) -> u64 {
        self.cell(dimension).load(Ordering::Relaxed)
    }

    /// Overwrite one counter.
    pub fn set(&self, dimension: Dimension, value: u64) {
        self.cell(dimension).store(value, Ordering::Relaxed);
    }

    /// Add one pending operation.
    pub fn increment(&self, dimension: Dimension) {
        self.cell(dimension).fetch_add(1, Ordering::Relaxed);
    }

    /// Retire one pending operation. Saturates at zero.
    pub fn decrement(&self, dimension: Dimension) {
        let _ = self
            .cell(dimension)
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }
}

/// Adapter exposing one [`ActivityCounters`] cell as a [`DimensionSource`].
struct CounterSource {
    counters: Arc<ActivityCounters>,
    dimension: Dimension,
}

#[async_trait]
impl DimensionSource for CounterSource {
    async fn pending(&self) -> anyhow::Result<u64> {
        Ok(self.counters.get(self.dimension))
    }
}

/// A [`TargetHandle`] backed by in-process [`ActivityCounters`].
///
/// The capability set is fixed at construction: dimensions outside it report
/// no source, which a probe records as degraded confidence.
pub struct InstrumentedTarget {
    description: String,
    counters: Arc<ActivityCounters>,
    capabilities: Vec<Dimension>,
    attached: AtomicBool,
}

impl InstrumentedTarget {
    /// Target able to measure every dimension.
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_capabilities(description, &Dimension::ALL)
    }

    /// Target able to measure only the given dimensions.
    pub fn with_capabilities(description: impl Into<String>, capabilities: &[Dimension]) -> Self {
        Self {
            description: description.into(),
            counters: Arc::new(ActivityCounters::new()),
            capabilities: capabilities.to_vec(),
            attached: AtomicBool::new(true),
        }
    }

    /// The counters backing this target, for the session layer to drive.
    pub fn counters(&self) -> Arc<ActivityCounters> {
        Arc::clone(&self.counters)
    }

    /// Mark the target as gone. Waits in progress observe this on their next
    /// tick and terminate with a detached outcome.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Relaxed);
    }
}

impl TargetHandle for InstrumentedTarget {
    fn describe(&self) -> &str {
        &self.description
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    fn dimension_source(&self, dimension: Dimension) -> Option<Arc<dyn DimensionSource>> {
        if !self.capabilities.contains(&dimension) {
            return None;
        }
        Some(Arc::new(CounterSource {
            counters: Arc::clone(&self.counters),
            dimension,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let counters = ActivityCounters::new();
        for dimension in Dimension::ALL {
            assert_eq!(counters.get(dimension), 0);
        }
    }

    #[test]
    fn increment_decrement_roundtrip() {
        let counters = ActivityCounters::new();
        counters.increment(Dimension::NetworkRequests);
        counters.increment(Dimension::NetworkRequests);
        assert_eq!(counters.get(Dimension::NetworkRequests), 2);
        counters.decrement(Dimension::NetworkRequests);
        assert_eq!(counters.get(Dimension::NetworkRequests), 1);
        // Other dimensions are untouched.
        assert_eq!(counters.get(Dimension::Timers), 0);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let counters = ActivityCounters::new();
        counters.decrement(Dimension::MicroTasks);
        assert_eq!(counters.get(Dimension::MicroTasks), 0);
    }

    #[test]
    fn set_overwrites() {
        let counters = ActivityCounters::new();
        counters.set(Dimension::Timers, 7);
        assert_eq!(counters.get(Dimension::Timers), 7);
    }

    #[tokio::test]
    async fn full_target_exposes_every_dimension() {
        let target = InstrumentedTarget::new("app-under-test");
        assert_eq!(target.describe(), "app-under-test");
        assert!(target.is_attached());
        for dimension in Dimension::ALL {
            let source = target.dimension_source(dimension);
            assert!(source.is_some(), "missing source for {dimension}");
            assert_eq!(source.unwrap().pending().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn restricted_target_reports_missing_capabilities() {
        let target = InstrumentedTarget::with_capabilities(
            "partial",
            &[Dimension::MacroTasks, Dimension::Timers],
        );
        assert!(target.dimension_source(Dimension::MacroTasks).is_some());
        assert!(target.dimension_source(Dimension::Timers).is_some());
        assert!(target.dimension_source(Dimension::NetworkRequests).is_none());
        assert!(target.dimension_source(Dimension::RenderCycle).is_none());
    }

    #[tokio::test]
    async fn source_tracks_counter_changes() {
        let target = InstrumentedTarget::new("live");
        let source = target.dimension_source(Dimension::MacroTasks).unwrap();
        target.counters().set(Dimension::MacroTasks, 3);
        assert_eq!(source.pending().await.unwrap(), 3);
        target.counters().decrement(Dimension::MacroTasks);
        assert_eq!(source.pending().await.unwrap(), 2);
    }

    #[test]
    fn detach_flips_attachment() {
        let target = InstrumentedTarget::new("tab");
        assert!(target.is_attached());
        target.detach();
        assert!(!target.is_attached());
    }
}
