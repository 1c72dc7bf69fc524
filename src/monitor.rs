// SPDX-License-Identifier: MIT
//! Continuous quiescence observation.
//!
//! Where the controller answers "wait until quiet", the monitor answers
//! "keep me posted": a background task samples on an interval, caches the
//! latest verdict, and broadcasts every verdict to subscribers until an
//! optional max duration elapses or [`QuiescenceMonitor::shutdown`] is
//! called. It reuses the probe and the shared stability predicate and adds
//! no decision logic of its own.

use crate::model::StabilityVerdict;
use crate::probe::ActivityProbe;
use crate::sampler::compute_verdict;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Instant};
use tracing::{debug, info};

/// Event published on the monitor's broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A fresh verdict from one monitor tick.
    Verdict(StabilityVerdict),
    /// The monitor exited (max duration reached or shutdown requested).
    Stopped,
}

/// Periodic sampler with broadcast fan-out.
///
/// One-to-many: any number of subscribers can watch the same monitor. The
/// latest verdict is also cached so callers who only want "how do things
/// look right now" never pay for a fresh sample.
pub struct QuiescenceMonitor {
    probe: ActivityProbe,
    latest: Arc<RwLock<Option<StabilityVerdict>>>,
    event_tx: broadcast::Sender<MonitorEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl QuiescenceMonitor {
    /// Monitor over an already-discovered probe.
    pub fn new(probe: ActivityProbe) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            probe,
            latest: Arc::new(RwLock::new(None)),
            event_tx,
            shutdown_tx,
        }
    }

    /// Spawn the sampling task.
    ///
    /// The first sample is taken immediately, then one per
    /// `interval_duration`. With `max_duration` set, the task stops on its
    /// own once that much time has passed; either way it broadcasts
    /// [`MonitorEvent::Stopped`] on exit. Returns the task's `JoinHandle`.
    pub fn start(
        &self,
        interval_duration: Duration,
        max_duration: Option<Duration>,
    ) -> tokio::task::JoinHandle<()> {
        let probe = self.probe.clone();
        let latest = Arc::clone(&self.latest);
        let event_tx = self.event_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(interval_duration);
            let deadline = max_duration.map(|d| Instant::now() + d);
            info!(
                interval_ms = interval_duration.as_millis() as u64,
                bounded = max_duration.is_some(),
                "quiescence monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = probe.sample().await;
                        let verdict = compute_verdict(&snapshot);
                        {
                            let mut cached = latest.write().await;
                            *cached = Some(verdict.clone());
                        }
                        let _ = event_tx.send(MonitorEvent::Verdict(verdict.clone()));
                        debug!(is_stable = verdict.is_stable, "verdict broadcast");

                        if let Some(deadline) = deadline {
                            if Instant::now() >= deadline {
                                info!("quiescence monitor reached max duration");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("quiescence monitor shutting down");
                        break;
                    }
                }
            }

            let _ = event_tx.send(MonitorEvent::Stopped);
            info!("quiescence monitor stopped");
        })
    }

    /// The most recent verdict, or `None` before the first tick.
    ///
    /// Reads the cache only; never triggers a sample.
    pub async fn latest(&self) -> Option<StabilityVerdict> {
        self.latest.read().await.clone()
    }

    /// Subscribe to monitor events. Multiple receivers are fine.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the sampling task to stop. Use the `JoinHandle` from
    /// [`QuiescenceMonitor::start`] to wait for it.
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.shutdown_tx
            .send(())
            .context("failed to send monitor shutdown signal")?;
        Ok(())
    }
}
