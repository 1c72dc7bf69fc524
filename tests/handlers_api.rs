//! Tests of the JSON surface: field names, error shape, and snapshot
//! contents as a tool caller would see them.

use quiesce::handlers::{quiescence_status, wait_for_quiescence};
use quiesce::{Dimension, InstrumentedTarget, TargetHandle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn timed_out_wait_reports_the_full_contract() {
    let target = Arc::new(InstrumentedTarget::new("busy-app"));
    target.counters().set(Dimension::MacroTasks, 1);
    target.counters().set(Dimension::NetworkRequests, 2);

    let params = json!({"timeoutMs": 200, "pollIntervalMs": 40, "historyCap": 3});
    let response = wait_for_quiescence(params, target).await.unwrap();

    assert_eq!(response["outcome"], "timed_out");
    assert_eq!(response["timedOut"], true);
    assert_eq!(response["reachedStability"], false);
    assert!(response["totalElapsedMs"].as_u64().unwrap() >= 200);

    let snapshot = &response["finalSnapshot"];
    assert_eq!(snapshot["pendingMacroTasks"], 1);
    assert_eq!(snapshot["pendingNetworkRequests"], 2);
    assert_eq!(snapshot["renderCycleActive"], false);
    assert_eq!(snapshot["degradedConfidence"], false);

    let history = response["truncatedHistory"].as_array().unwrap();
    assert_eq!(history.len(), 3, "history must honor the requested cap");
    for entry in history {
        assert!(entry["sequenceNumber"].is_number());
        assert!(entry["elapsedMs"].is_number());
        assert_eq!(entry["verdict"]["isStable"], false);
    }
}

#[tokio::test]
async fn detached_target_omits_final_snapshot() {
    let target = Arc::new(InstrumentedTarget::new("closed-tab"));
    target.detach();

    let params = json!({"timeoutMs": 500, "pollIntervalMs": 50});
    let response = wait_for_quiescence(params, target).await.unwrap();

    assert_eq!(response["outcome"], "target_detached");
    assert_eq!(response["reachedStability"], false);
    assert_eq!(response["timedOut"], false);
    assert_eq!(response["sampleCount"], 0);
    assert!(
        response.get("finalSnapshot").is_none(),
        "no sample completed, so the field must be absent"
    );
    assert_eq!(response["truncatedHistory"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn detachment_during_a_wait_surfaces_in_the_response() {
    let target = Arc::new(InstrumentedTarget::new("closing-tab"));
    target.counters().set(Dimension::Timers, 1);

    let detacher = Arc::clone(&target);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        detacher.detach();
    });

    let params = json!({"timeoutMs": 2000, "pollIntervalMs": 40});
    let response = wait_for_quiescence(params, target as Arc<dyn TargetHandle>)
        .await
        .unwrap();

    assert_eq!(response["outcome"], "target_detached");
    assert!(response["sampleCount"].as_u64().unwrap() >= 1);
    assert!(
        response["finalSnapshot"].is_object(),
        "samples completed before the detach, so the last one is reported"
    );
}

#[tokio::test]
async fn degraded_confidence_is_visible_to_callers() {
    let target = Arc::new(InstrumentedTarget::with_capabilities(
        "legacy-app",
        &[Dimension::MacroTasks, Dimension::Timers],
    ));

    let response = wait_for_quiescence(json!({"timeoutMs": 300, "pollIntervalMs": 30}), target)
        .await
        .unwrap();

    assert_eq!(response["reachedStability"], true);
    assert_eq!(response["finalSnapshot"]["degradedConfidence"], true);
}

#[tokio::test]
async fn invalid_config_error_shape_matches_the_taxonomy() {
    let target = Arc::new(InstrumentedTarget::new("app"));

    for params in [
        json!({"timeoutMs": 0}),
        json!({"pollIntervalMs": 0}),
        json!({"timeoutMs": 50, "pollIntervalMs": 100}),
        json!({"historyCap": 0}),
    ] {
        let response = wait_for_quiescence(params.clone(), Arc::clone(&target) as Arc<dyn TargetHandle>)
            .await
            .unwrap();
        assert_eq!(
            response["error"]["code"], "invalid_config",
            "params {params} should be rejected"
        );
        assert!(response["error"]["message"].is_string());
        assert!(response.get("outcome").is_none(), "no result on rejection");
    }
}

#[tokio::test]
async fn status_pending_total_matches_the_snapshot() {
    let target = Arc::new(InstrumentedTarget::new("app"));
    let counters = target.counters();
    counters.set(Dimension::MacroTasks, 2);
    counters.set(Dimension::MicroTasks, 1);
    counters.set(Dimension::RenderCycle, 1);

    let response = quiescence_status(serde_json::Value::Null, target)
        .await
        .unwrap();

    assert_eq!(response["isStable"], false);
    assert_eq!(response["pendingTotal"], 4, "2 macro + 1 micro + active render");
    assert_eq!(response["snapshot"]["pendingMacroTasks"], 2);
    assert_eq!(response["snapshot"]["renderCycleActive"], true);
}
