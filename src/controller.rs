// SPDX-License-Identifier: MIT
//! The bounded-wait polling loop.
//!
//! Drives an [`ActivityProbe`] until the target is quiescent, the target goes
//! away, or the budget runs out. This is the synchronization primitive the
//! automation layer calls before inspecting application state.
//!
//! # State machine
//!
//! ```text
//! INIT ──(config invalid)──► INVALID_CONFIG
//!   │
//!   ▼ (first sample immediately, no delay)
//! POLLING ──(every count zero)──► STABLE
//!   │ │
//!   │ ├─(target gone)──► TARGET_DETACHED
//!   │ └─(budget spent)─► TIMED_OUT
//!   └──(sleep pollIntervalMs, tick again)
//! ```
//!
//! - **INVALID_CONFIG**: the only error path, rejected before any probing.
//! - **STABLE / TIMED_OUT / TARGET_DETACHED**: terminal result variants, never
//!   errors. Stability is evaluated before the deadline on every tick, so a
//!   target that goes quiet exactly at the budget boundary reports stable.
//!
//! Wall-clock guarantee: a wait terminates within `timeoutMs` plus at most
//! one `pollIntervalMs` of slack (the final grace sample).

use crate::aggregator::scalar_pending_count;
use crate::model::{
    ActivitySnapshot, ConfigError, QuiescenceResult, SampleHistoryEntry, WaitConfig,
};
use crate::probe::ActivityProbe;
use crate::sampler::{compute_verdict, SampleHistory};
use crate::target::TargetHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs quiescence waits against one target.
///
/// Cheaply cloneable; clones share the target handle and the probe. Each
/// [`QuiescenceController::wait`] call is an independent invocation with its
/// own timing, sequence numbers, and history — concurrent waits on the same
/// controller do not interfere.
///
/// A wait is a plain future: dropping it (directly or via
/// `JoinHandle::abort`) cancels at the current suspension point and no
/// further samples are taken.
///
/// # Example
/// ```rust,ignore
/// use quiesce::{QuiescenceController, WaitConfig};
///
/// let controller = QuiescenceController::new(target);
/// let result = controller.wait(&WaitConfig::default()).await?;
/// if result.reached_stability {
///     // safe to inspect or act on application state
/// }
/// ```
#[derive(Clone)]
pub struct QuiescenceController {
    target: Arc<dyn TargetHandle>,
    probe: ActivityProbe,
}

impl QuiescenceController {
    /// Build a controller for the given target, discovering probe
    /// capabilities once up front.
    pub fn new(target: Arc<dyn TargetHandle>) -> Self {
        let probe = ActivityProbe::discover(Arc::clone(&target));
        Self { target, probe }
    }

    /// The probe this controller samples through. Clones share its call
    /// counter, which is how callers observe sampling activity from outside.
    pub fn probe(&self) -> &ActivityProbe {
        &self.probe
    }

    /// Poll until the target is quiescent, detached, or the budget elapses.
    ///
    /// The first sample is taken immediately. Timeout and detachment are
    /// reported inside the `Ok` result; the only `Err` is a rejected
    /// configuration, returned before a single sample is taken.
    pub async fn wait(&self, config: &WaitConfig) -> Result<QuiescenceResult, ConfigError> {
        config.validate()?;

        let wait_id = Uuid::new_v4();
        let timeout = Duration::from_millis(config.timeout_ms);
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let started = Instant::now();
        let mut history = SampleHistory::new(config.history_cap);
        let mut sequence: u64 = 0;
        let mut last_snapshot: Option<ActivitySnapshot> = None;

        debug!(
            wait_id = %wait_id,
            app = %self.target.describe(),
            timeout_ms = config.timeout_ms,
            poll_interval_ms = config.poll_interval_ms,
            history_cap = config.history_cap,
            "quiescence wait started"
        );

        loop {
            // Detachment is checked at the top of every tick; a target torn
            // down during the sleep is caught within one interval.
            if !self.target.is_attached() {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!(
                    wait_id = %wait_id,
                    app = %self.target.describe(),
                    elapsed_ms,
                    samples = sequence,
                    "target detached mid-wait"
                );
                return Ok(QuiescenceResult::target_detached(
                    wait_id,
                    elapsed_ms,
                    sequence,
                    last_snapshot,
                    history.into_vec(),
                ));
            }

            let snapshot = self.probe.sample().await;
            let verdict = compute_verdict(&snapshot);
            sequence += 1;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;
            history.append(SampleHistoryEntry {
                sequence_number: sequence,
                verdict: verdict.clone(),
                elapsed_ms,
            });
            debug!(
                wait_id = %wait_id,
                sequence,
                elapsed_ms,
                is_stable = verdict.is_stable,
                pending = scalar_pending_count(&snapshot),
                "sample evaluated"
            );

            if verdict.is_stable {
                info!(
                    wait_id = %wait_id,
                    app = %self.target.describe(),
                    "stabilized after {elapsed_ms}ms ({sequence} samples)"
                );
                return Ok(QuiescenceResult::stable(
                    wait_id,
                    elapsed_ms,
                    sequence,
                    snapshot,
                    history.into_vec(),
                ));
            }

            // This tick doubles as the final grace sample once the budget is
            // spent; its stability was evaluated above, so the boundary case
            // resolves in favor of stable.
            if elapsed >= timeout {
                let pending = scalar_pending_count(&snapshot);
                info!(
                    wait_id = %wait_id,
                    app = %self.target.describe(),
                    "timed out after {elapsed_ms}ms, {pending} operations still pending"
                );
                return Ok(QuiescenceResult::timed_out(
                    wait_id,
                    elapsed_ms,
                    sequence,
                    snapshot,
                    history.into_vec(),
                ));
            }

            last_snapshot = Some(snapshot);
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl std::fmt::Debug for QuiescenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiescenceController")
            .field("app", &self.target.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WaitOutcome;
    use crate::target::{Dimension, InstrumentedTarget};

    fn fast_config() -> WaitConfig {
        WaitConfig {
            timeout_ms: 200,
            poll_interval_ms: 20,
            history_cap: 50,
        }
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_sample() {
        let controller = QuiescenceController::new(Arc::new(InstrumentedTarget::new("app")));
        let config = WaitConfig {
            timeout_ms: 50,
            poll_interval_ms: 100,
            history_cap: 50,
        };
        let result = controller.wait(&config).await;
        assert!(matches!(
            result,
            Err(ConfigError::IntervalNotBelowTimeout { .. })
        ));
        assert_eq!(controller.probe().samples_taken(), 0);
    }

    #[tokio::test]
    async fn idle_target_stabilizes_on_first_sample() {
        let controller = QuiescenceController::new(Arc::new(InstrumentedTarget::new("idle")));
        let result = controller.wait(&fast_config()).await.unwrap();

        assert_eq!(result.outcome, WaitOutcome::Stable);
        assert!(result.reached_stability);
        assert!(!result.timed_out);
        assert_eq!(result.sample_count, 1);
        assert!(result.total_elapsed_ms < 50, "tick 0 must be immediate");
        assert_eq!(result.truncated_history.len(), 1);
        assert!(result.final_snapshot.unwrap().pending_macro_tasks == 0);
    }

    #[tokio::test]
    async fn busy_target_times_out() {
        let target = Arc::new(InstrumentedTarget::new("busy"));
        target.counters().set(Dimension::NetworkRequests, 2);
        let controller = QuiescenceController::new(target);

        let result = controller.wait(&fast_config()).await.unwrap();
        assert_eq!(result.outcome, WaitOutcome::TimedOut);
        assert!(result.timed_out);
        assert!(!result.reached_stability);
        assert!(result.total_elapsed_ms >= 200);
        assert!(result.sample_count >= 2);
        let snapshot = result.final_snapshot.unwrap();
        assert_eq!(snapshot.pending_network_requests, 2);
    }

    #[tokio::test]
    async fn detached_target_short_circuits_with_no_samples() {
        let target = Arc::new(InstrumentedTarget::new("gone"));
        target.detach();
        let controller = QuiescenceController::new(Arc::clone(&target) as Arc<dyn TargetHandle>);

        let result = controller.wait(&fast_config()).await.unwrap();
        assert_eq!(result.outcome, WaitOutcome::TargetDetached);
        assert_eq!(result.sample_count, 0);
        assert!(result.final_snapshot.is_none());
        assert!(result.truncated_history.is_empty());
        assert_eq!(controller.probe().samples_taken(), 0);
    }

    #[tokio::test]
    async fn history_keeps_most_recent_entries_in_order() {
        let target = Arc::new(InstrumentedTarget::new("busy"));
        target.counters().set(Dimension::Timers, 1);
        let controller = QuiescenceController::new(target);

        let config = WaitConfig {
            timeout_ms: 200,
            poll_interval_ms: 20,
            history_cap: 3,
        };
        let result = controller.wait(&config).await.unwrap();

        assert_eq!(result.truncated_history.len(), 3);
        let last = result.truncated_history.last().unwrap();
        assert_eq!(last.sequence_number, result.sample_count);
        let seqs: Vec<u64> = result
            .truncated_history
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(
            seqs,
            vec![
                result.sample_count - 2,
                result.sample_count - 1,
                result.sample_count
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_waits_do_not_interfere() {
        let target = Arc::new(InstrumentedTarget::new("shared"));
        let controller = QuiescenceController::new(target);
        let (config_a, config_b) = (fast_config(), fast_config());
        let (a, b) = tokio::join!(controller.wait(&config_a), controller.wait(&config_b));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a.reached_stability && b.reached_stability);
        assert_ne!(a.wait_id, b.wait_id);
        assert_eq!(a.sample_count, 1);
        assert_eq!(b.sample_count, 1);
    }
}
