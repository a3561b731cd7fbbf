mod common;

use axum::http::StatusCode;
use common::{
    build_signed_context, build_sqlite_context, build_test_context, get, post, post_json,
    TEST_KEY,
};
use serde_json::json;
use yamon_common::types::{Counter, Gauge, MetricEnvelope};
use yamon_common::HashKey;

fn signed(mut envelope: MetricEnvelope) -> serde_json::Value {
    envelope.sign(&HashKey::new(TEST_KEY).unwrap()).unwrap();
    serde_json::to_value(envelope).unwrap()
}

#[tokio::test]
async fn path_updates_store_counters_and_gauges() {
    let ctx = build_test_context();

    assert_eq!(post(&ctx.app, "/update/counter/requests/5").await.status, StatusCode::OK);
    assert_eq!(post(&ctx.app, "/update/counter/requests/7").await.status, StatusCode::OK);
    assert_eq!(post(&ctx.app, "/update/gauge/temp/36.6").await.status, StatusCode::OK);
    assert_eq!(post(&ctx.app, "/update/gauge/temp/37.1").await.status, StatusCode::OK);

    let resp = get(&ctx.app, "/value/counter/requests").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "12");
    assert!(resp.content_type.unwrap().starts_with("text/plain"));

    let resp = get(&ctx.app, "/value/gauge/temp").await;
    assert_eq!(resp.body, "37.1");
}

#[tokio::test]
async fn path_updates_reject_bad_values() {
    let ctx = build_test_context();

    let resp = post(&ctx.app, "/update/counter/x/-1").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(get(&ctx.app, "/value/counter/x").await.status, StatusCode::NOT_FOUND);

    for uri in [
        "/update/counter/x/1.5",
        "/update/counter/x/abc",
        "/update/gauge/g/abc",
        "/update/gauge/g/NaN",
        "/update/gauge/g/inf",
        "/update/histogram/h/1",
    ] {
        assert_eq!(post(&ctx.app, uri).await.status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(ctx.repo.list_stored_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn value_lookup_unknown_metric_or_kind_is_not_found() {
    let ctx = build_test_context();
    assert_eq!(get(&ctx.app, "/value/gauge/missing").await.status, StatusCode::NOT_FOUND);
    assert_eq!(get(&ctx.app, "/value/summary/x").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_update_and_value_round_trip() {
    let ctx = build_test_context();

    let resp = post_json(&ctx.app, "/update/", json!({"id": "Alloc", "type": "gauge", "value": 1024.5})).await;
    assert_eq!(resp.status, StatusCode::OK);
    let resp = post_json(&ctx.app, "/update/", json!({"id": "PollCount", "type": "counter", "delta": 3})).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = post_json(&ctx.app, "/value/", json!({"id": "Alloc", "type": "gauge"})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), json!({"id": "Alloc", "type": "gauge", "value": 1024.5}));

    let resp = post_json(&ctx.app, "/value/", json!({"id": "PollCount", "type": "counter"})).await;
    assert_eq!(resp.json(), json!({"id": "PollCount", "type": "counter", "delta": 3}));

    let resp = post_json(&ctx.app, "/value/", json!({"id": "nope", "type": "counter"})).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_envelopes_are_rejected() {
    let ctx = build_test_context();

    let cases = [
        json!({"type": "gauge", "value": 1.0}),
        json!({"id": "", "type": "gauge", "value": 1.0}),
        json!({"id": "g", "type": "histogram", "value": 1.0}),
        json!({"id": "g", "type": "gauge"}),
        json!({"id": "c", "type": "counter", "value": 1.0}),
        json!({"id": "c", "type": "counter", "delta": -4}),
    ];
    for body in cases {
        let resp = post_json(&ctx.app, "/update/", body.clone()).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{body}");
    }

    let resp = common::send(&ctx.app, "POST", "/update/", Some("{not json".to_string())).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(ctx.repo.list_stored_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn batch_update_merges_counters_and_overwrites_gauges() {
    let ctx = build_test_context();
    let batch = json!([
        {"id": "RandomValue", "type": "gauge", "value": 0.25},
        {"id": "PollCount", "type": "counter", "delta": 2},
        {"id": "PollCount", "type": "counter", "delta": 3},
        {"id": "RandomValue", "type": "gauge", "value": 0.75},
    ]);

    let resp = post_json(&ctx.app, "/updates/", batch).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(ctx.repo.retrieve_counter("PollCount").unwrap().value, 5);
    assert_eq!(ctx.repo.retrieve_gauge("RandomValue").unwrap().value, 0.75);
}

#[tokio::test]
async fn batch_with_invalid_entry_writes_nothing() {
    let ctx = build_test_context();
    let batch = json!([
        {"id": "ok", "type": "counter", "delta": 1},
        {"id": "bad", "type": "counter", "delta": -1},
    ]);

    let resp = post_json(&ctx.app, "/updates/", batch).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(ctx.repo.list_stored_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn signed_updates_are_verified() {
    let ctx = build_signed_context();

    let good = signed(MetricEnvelope::from(&Gauge::new("g1", 1.02)));
    let resp = post_json(&ctx.app, "/update/", good.clone()).await;
    assert_eq!(resp.status, StatusCode::OK);

    let mut tampered = good;
    tampered["value"] = json!(1.03);
    let resp = post_json(&ctx.app, "/update/", tampered).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.repo.retrieve_gauge("g1").unwrap().value, 1.02);

    // Unsigned envelopes are accepted even when the server has a key.
    let resp = post_json(&ctx.app, "/update/", json!({"id": "g2", "type": "gauge", "value": 2.0})).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn signed_batch_with_full_precision_gauge_is_accepted() {
    let ctx = build_signed_context();
    let batch = json!([
        signed(MetricEnvelope::from(&Gauge::new("RandomValue", 0.9856906946328695))),
        signed(MetricEnvelope::from(&Counter::new("PollCount", 1))),
    ]);

    let resp = post_json(&ctx.app, "/updates/", batch).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(
        ctx.repo.retrieve_gauge("RandomValue").unwrap().value,
        0.9856906946328695
    );
}

#[tokio::test]
async fn batch_with_one_bad_hash_is_rejected_whole() {
    let ctx = build_signed_context();
    let mut forged = signed(MetricEnvelope::from(&Counter::new("PollCount", 1)));
    forged["delta"] = json!(100);
    let batch = json!([
        signed(MetricEnvelope::from(&Gauge::new("Alloc", 10.0))),
        forged,
    ]);

    let resp = post_json(&ctx.app, "/updates/", batch).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("hash"));
    assert!(ctx.repo.list_stored_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn value_response_is_signed_when_key_configured() {
    let ctx = build_signed_context();
    post(&ctx.app, "/update/counter/requests/9").await;

    let resp = post_json(&ctx.app, "/value/", json!({"id": "requests", "type": "counter"})).await;
    assert_eq!(resp.status, StatusCode::OK);
    let reply: MetricEnvelope = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(reply.delta, Some(9));
    assert!(reply.hash.is_some());
    reply.verify(HashKey::new(TEST_KEY).as_ref()).unwrap();
}

#[tokio::test]
async fn index_lists_all_metrics_sorted() {
    let ctx = build_test_context();
    post(&ctx.app, "/update/gauge/zeta/2.5").await;
    post(&ctx.app, "/update/gauge/alpha/1").await;
    post(&ctx.app, "/update/counter/requests/4").await;

    let resp = get(&ctx.app, "/").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.content_type.unwrap().starts_with("text/html"));
    assert_eq!(resp.body, "alpha\t\t1\nzeta\t\t2.5\nrequests\t\t4\n");
}

#[tokio::test]
async fn ping_and_trace_header() {
    let ctx = build_test_context();
    let resp = get(&ctx.app, "/ping").await;
    assert_eq!(resp.status, StatusCode::OK);
    let trace = resp.trace_id.expect("trace id header");
    assert_eq!(trace.len(), 16);
}

#[tokio::test]
async fn sqlite_backend_serves_same_api() {
    let ctx = build_sqlite_context();
    let batch = json!([
        {"id": "PollCount", "type": "counter", "delta": 2},
        {"id": "Alloc", "type": "gauge", "value": 512.0},
    ]);
    assert_eq!(post_json(&ctx.app, "/updates/", batch.clone()).await.status, StatusCode::OK);
    assert_eq!(post_json(&ctx.app, "/updates/", batch).await.status, StatusCode::OK);

    assert_eq!(get(&ctx.app, "/value/counter/PollCount").await.body, "4");
    assert_eq!(get(&ctx.app, "/value/gauge/Alloc").await.body, "512");
    assert_eq!(get(&ctx.app, "/ping").await.status, StatusCode::OK);
}
