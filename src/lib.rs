// SPDX-License-Identifier: MIT
//! Bounded-wait quiescence detection for event-loop applications.
//!
//! Before an automation harness can safely inspect or act on an app it has
//! to know the app is done working: no queued macro or micro tasks, no
//! in-flight network requests, no armed timers, no pending deferred
//! computations, no render cycle mid-frame. This crate answers that
//! question within a bounded wait.
//!
//! - [`target`] — the seam to whatever supplies activity data
//! - [`probe`] — one immutable snapshot per sample; degrades, never fails
//! - [`sampler`] — the single stability predicate and the history ring
//! - [`controller`] — the polling state machine behind `wait`
//! - [`aggregator`] — one-shot status check and the diagnostic scalar
//! - [`monitor`] — continuous observation with broadcast fan-out
//! - [`handlers`] — the JSON boundary for the tool façade
//!
//! # Example
//! ```rust,ignore
//! use quiesce::{InstrumentedTarget, QuiescenceController, WaitConfig};
//! use std::sync::Arc;
//!
//! let target = Arc::new(InstrumentedTarget::new("checkout-page"));
//! let controller = QuiescenceController::new(target);
//! let result = controller.wait(&WaitConfig::default()).await?;
//! if result.reached_stability {
//!     // the app is quiet — safe to read its state
//! }
//! ```

pub mod aggregator;
pub mod controller;
pub mod handlers;
pub mod model;
pub mod monitor;
pub mod probe;
pub mod sampler;
pub mod target;

pub use aggregator::{scalar_pending_count, ActivityAggregator};
pub use controller::QuiescenceController;
pub use model::{
    ActivitySnapshot, ConfigError, QuiescenceResult, SampleHistoryEntry, StabilityVerdict,
    WaitConfig, WaitOutcome,
};
pub use monitor::{MonitorEvent, QuiescenceMonitor};
pub use probe::ActivityProbe;
pub use sampler::{compute_verdict, SampleHistory};
pub use target::{ActivityCounters, Dimension, DimensionSource, InstrumentedTarget, TargetHandle};
