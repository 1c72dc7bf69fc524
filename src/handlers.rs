// SPDX-License-Identifier: MIT
//! RPC handlers for quiescence detection.
//!
//! Exposed methods:
//! - `quiescence.waitFor` — bounded wait until the target shows no activity
//! - `quiescence.status` — one-shot stability check, no waiting
//!
//! The session layer resolves which application a request refers to and
//! passes the [`TargetHandle`] in; these functions only shape JSON.

use crate::aggregator::{scalar_pending_count, ActivityAggregator};
use crate::controller::QuiescenceController;
use crate::model::WaitConfig;
use crate::probe::ActivityProbe;
use crate::target::TargetHandle;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

/// `quiescence.waitFor` — poll the target until it is quiet or the budget
/// runs out.
///
/// Params (all optional):
/// - `timeoutMs`: integer — total wait budget (default: 10000)
/// - `pollIntervalMs`: integer — delay between samples (default: 100)
/// - `historyCap`: integer — retained history length (default: 50)
///
/// Returns the serialized wait result; a semantically invalid configuration
/// comes back as `{"error": {"code": "invalid_config", ...}}`.
pub async fn wait_for_quiescence(params: Value, target: Arc<dyn TargetHandle>) -> Result<Value> {
    let config: WaitConfig = if params.is_null() {
        WaitConfig::default()
    } else {
        serde_json::from_value(params)?
    };

    let controller = QuiescenceController::new(target);
    match controller.wait(&config).await {
        Ok(result) => Ok(serde_json::to_value(result)?),
        Err(e) => Ok(json!({
            "error": {
                "code": "invalid_config",
                "message": e.to_string(),
            }
        })),
    }
}

/// `quiescence.status` — report current stability from a single sample.
///
/// Takes no params. The response is the serialized verdict plus
/// `pendingTotal`, the diagnostic sum of all pending operations.
pub async fn quiescence_status(_params: Value, target: Arc<dyn TargetHandle>) -> Result<Value> {
    let aggregator = ActivityAggregator::new(ActivityProbe::discover(target));
    let verdict = aggregator.status_check().await;
    let pending_total = scalar_pending_count(&verdict.snapshot);

    let mut value = serde_json::to_value(&verdict)?;
    if let Value::Object(map) = &mut value {
        map.insert("pendingTotal".to_string(), json!(pending_total));
    }
    Ok(value)
}
