// SPDX-License-Identifier: MIT
//! Data model for quiescence detection.
//!
//! Everything that crosses the RPC boundary lives here and serializes with
//! camelCase field names (`reachedStability`, `totalElapsedMs`, …) so the
//! JSON contract falls out of the type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default wait timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default interval between polling samples in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Default capacity of the retained sample history.
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Pending-work counts across every tracked dimension, captured at one instant.
///
/// Snapshots are immutable once constructed. Counts are unsigned, so a
/// negative pending count cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    /// Wall-clock time the snapshot was captured. Elapsed-time math never
    /// uses this field; it exists so callers can correlate with their logs.
    pub captured_at: DateTime<Utc>,

    /// Event-loop macro tasks queued but not yet run.
    pub pending_macro_tasks: u64,

    /// Micro tasks (continuations) queued but not yet run.
    pub pending_micro_tasks: u64,

    /// Network requests issued but not yet completed.
    pub pending_network_requests: u64,

    /// Armed one-shot or repeating timers.
    pub pending_timers: u64,

    /// Deferred computations scheduled but not yet executed.
    pub pending_deferred_computations: u64,

    /// Whether a render/update cycle is currently in flight.
    pub render_cycle_active: bool,

    /// True when one or more dimensions could not be measured and were
    /// defaulted to zero. Stability reported under this flag is best-effort.
    pub degraded_confidence: bool,
}

/// A snapshot together with the stability decision derived from it.
///
/// Built only by [`crate::sampler::compute_verdict`]; `is_stable` is true iff
/// every count in the snapshot is zero and no render cycle is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityVerdict {
    /// The snapshot the decision was made from.
    pub snapshot: ActivitySnapshot,
    /// Whether the snapshot shows zero pending activity.
    pub is_stable: bool,
}

/// One polling sample as recorded in a wait's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleHistoryEntry {
    /// 1-based position of this sample within its wait.
    pub sequence_number: u64,
    /// The verdict computed for this sample.
    pub verdict: StabilityVerdict,
    /// Milliseconds elapsed since the wait started when this sample was taken.
    pub elapsed_ms: u64,
}

/// Configuration for a single quiescence wait.
///
/// Validated once by [`WaitConfig::validate`] before any probing happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    /// Total wait budget in milliseconds. Must be greater than zero.
    ///
    /// Default: 10000
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between consecutive samples in milliseconds. Must be greater
    /// than zero and strictly less than `timeout_ms`.
    ///
    /// Default: 100
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of history entries retained. Must be at least 1; older
    /// entries are dropped once the cap is exceeded.
    ///
    /// Default: 50
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl WaitConfig {
    /// Check the configuration invariants.
    ///
    /// Runs before the first sample, so an invalid configuration is rejected
    /// with zero probe calls.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::TimeoutNotPositive);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::IntervalNotPositive);
        }
        if self.poll_interval_ms >= self.timeout_ms {
            return Err(ConfigError::IntervalNotBelowTimeout {
                interval_ms: self.poll_interval_ms,
                timeout_ms: self.timeout_ms,
            });
        }
        if self.history_cap == 0 {
            return Err(ConfigError::HistoryCapZero);
        }
        Ok(())
    }
}

/// Rejected wait configuration.
///
/// The only error-return path of a wait; timeouts and detachment are result
/// variants, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("timeoutMs must be greater than zero")]
    TimeoutNotPositive,
    #[error("pollIntervalMs must be greater than zero")]
    IntervalNotPositive,
    #[error("pollIntervalMs ({interval_ms}ms) must be less than timeoutMs ({timeout_ms}ms)")]
    IntervalNotBelowTimeout { interval_ms: u64, timeout_ms: u64 },
    #[error("historyCap must be at least 1")]
    HistoryCapZero,
}

/// Terminal outcome of a completed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The target reached zero pending activity within the budget.
    Stable,
    /// The budget elapsed with activity still pending.
    TimedOut,
    /// The target went away mid-wait (tab closed, session torn down).
    TargetDetached,
}

impl std::fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitOutcome::Stable => write!(f, "stable"),
            WaitOutcome::TimedOut => write!(f, "timed_out"),
            WaitOutcome::TargetDetached => write!(f, "target_detached"),
        }
    }
}

/// Final report of one quiescence wait.
///
/// Created exactly once when the polling loop terminates and immutable
/// thereafter. The boolean fields are derived from `outcome` by the
/// constructors below, so the two representations cannot disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuiescenceResult {
    /// Identifier of this wait invocation, for log and RPC correlation.
    pub wait_id: Uuid,

    /// How the wait ended.
    pub outcome: WaitOutcome,

    /// True iff the target was observed stable.
    pub reached_stability: bool,

    /// True iff the wait budget elapsed without stability.
    pub timed_out: bool,

    /// Total milliseconds between wait start and termination.
    pub total_elapsed_ms: u64,

    /// Number of samples taken by this wait.
    pub sample_count: u64,

    /// The last snapshot captured. Absent only when the target detached
    /// before a single sample completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_snapshot: Option<ActivitySnapshot>,

    /// The most recent samples, oldest first, at most `historyCap` entries.
    pub truncated_history: Vec<SampleHistoryEntry>,
}

impl QuiescenceResult {
    /// Result for a wait that observed stability.
    pub fn stable(
        wait_id: Uuid,
        total_elapsed_ms: u64,
        sample_count: u64,
        final_snapshot: ActivitySnapshot,
        truncated_history: Vec<SampleHistoryEntry>,
    ) -> Self {
        Self {
            wait_id,
            outcome: WaitOutcome::Stable,
            reached_stability: true,
            timed_out: false,
            total_elapsed_ms,
            sample_count,
            final_snapshot: Some(final_snapshot),
            truncated_history,
        }
    }

    /// Result for a wait whose budget elapsed with activity still pending.
    pub fn timed_out(
        wait_id: Uuid,
        total_elapsed_ms: u64,
        sample_count: u64,
        final_snapshot: ActivitySnapshot,
        truncated_history: Vec<SampleHistoryEntry>,
    ) -> Self {
        Self {
            wait_id,
            outcome: WaitOutcome::TimedOut,
            reached_stability: false,
            timed_out: true,
            total_elapsed_ms,
            sample_count,
            final_snapshot: Some(final_snapshot),
            truncated_history,
        }
    }

    /// Result for a wait whose target went away before it could finish.
    ///
    /// `final_snapshot` is the last completed sample, or `None` when the
    /// target detached before the first sample.
    pub fn target_detached(
        wait_id: Uuid,
        total_elapsed_ms: u64,
        sample_count: u64,
        final_snapshot: Option<ActivitySnapshot>,
        truncated_history: Vec<SampleHistoryEntry>,
    ) -> Self {
        Self {
            wait_id,
            outcome: WaitOutcome::TargetDetached,
            reached_stability: false,
            timed_out: false,
            total_elapsed_ms,
            sample_count,
            final_snapshot,
            truncated_history,
        }
    }
}
