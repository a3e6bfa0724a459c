// tests/api_http.rs
//
// HTTP-level tests for the dashboard Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use common::{delivery_loop, tech_config, FakeFetcher, ScriptedDispatcher};
use whatsapp_news_bot::api::{self, AppState};
use whatsapp_news_bot::delivery::DeliveryLoop;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_app(items: usize, fail_on: &[usize]) -> (Router, Arc<DeliveryLoop>) {
    let dl = delivery_loop(
        tech_config(),
        Arc::new(FakeFetcher::with_items(items)),
        Arc::new(ScriptedDispatcher::failing_on(fail_on)),
    );
    let app = api::create_router(AppState {
        delivery: dl.clone(),
    });
    (app, dl)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_app(0, &[]);
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("ok".into()));
}

#[tokio::test]
async fn config_read_exposes_settings_only() {
    let (app, _) = test_app(0, &[]);
    let (status, v) = call(&app, "GET", "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["interval_minutes"], 60);
    assert_eq!(v["topics"], json!(["tech"]));
    let obj = v.as_object().unwrap();
    assert!(obj.keys().all(|k| !k.contains("key") && !k.contains("token")));
}

#[tokio::test]
async fn config_update_applies_changed_fields() {
    let (app, dl) = test_app(0, &[]);
    let (status, v) = call(
        &app,
        "PUT",
        "/api/config",
        Some(json!({ "interval_minutes": 30, "countries": ["GB", "us"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {v}");
    assert_eq!(v["interval_minutes"], 30);
    assert_eq!(v["countries"], json!(["gb", "us"]));
    assert_eq!(v["topics"], json!(["tech"]));
    assert_eq!(dl.store().get().interval_minutes, 30);
}

#[tokio::test]
async fn invalid_update_is_422_and_leaves_config() {
    let (app, dl) = test_app(0, &[]);
    let before = dl.store().get();
    let (status, v) = call(
        &app,
        "POST",
        "/api/config",
        Some(json!({ "interval_minutes": 0, "topics": ["sports"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["field"], "interval_minutes");
    assert_eq!(dl.store().get(), before);

    let (status, v) = call(
        &app,
        "PUT",
        "/api/config",
        Some(json!({ "recipient": "not-a-number" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["field"], "recipient");
}

#[tokio::test]
async fn malformed_update_body_is_json_error() {
    let (app, dl) = test_app(0, &[]);
    let before = dl.store().get();

    for bad in [
        json!({ "interval_minutes": "abc" }),
        json!({ "interval": 30 }),
    ] {
        let (status, v) = call(&app, "PUT", "/api/config", Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(v["field"], "body");
        assert!(v["error"].as_str().is_some_and(|e| !e.is_empty()), "{v}");
    }
    assert_eq!(dl.store().get(), before);
}

#[tokio::test]
async fn tick_then_activity_then_clear() {
    let (app, _) = test_app(3, &[2]);

    let (status, v) = call(&app, "POST", "/api/bot/tick", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["outcome"], "completed");
    assert_eq!(v["sent"], 2);
    assert_eq!(v["failed"], 1);

    let (_, v) = call(&app, "GET", "/api/activity?limit=2", None).await;
    let arr = v.as_array().expect("activity array");
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["status"], "failed");
    assert_eq!(arr[1]["status"], "sent");

    let (_, v) = call(&app, "GET", "/api/activity", None).await;
    assert_eq!(v.as_array().unwrap().len(), 3);

    let (status, v) = call(&app, "DELETE", "/api/activity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["cleared"], 3);
    let (_, v) = call(&app, "GET", "/api/activity", None).await;
    assert!(v.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn start_stop_and_status() {
    let (app, dl) = test_app(0, &[]);

    let (_, v) = call(&app, "GET", "/api/status", None).await;
    assert_eq!(v["running"], false);
    assert_eq!(v["busy"], false);

    let (_, v) = call(&app, "POST", "/api/bot/start", None).await;
    assert_eq!(v, json!({ "running": true, "changed": true }));
    assert!(dl.is_running());
    let (_, v) = call(&app, "POST", "/api/bot/start", None).await;
    assert_eq!(v["changed"], false);

    let (_, v) = call(&app, "POST", "/api/bot/stop", None).await;
    assert_eq!(v, json!({ "running": false, "changed": true }));
    assert!(!dl.is_running());
}

#[tokio::test]
async fn test_message_endpoint_returns_test_record() {
    let (app, _) = test_app(2, &[]);
    let (status, v) = call(&app, "POST", "/api/test-message", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["kind"], "test");
    assert_eq!(v["status"], "sent");
    assert_eq!(v["message_sid"], "SM1");
}
