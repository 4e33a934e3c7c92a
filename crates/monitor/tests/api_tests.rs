//! Integration tests for the monitor API endpoints

#[allow(dead_code)]
#[path = "../src/api.rs"]
mod api;

use api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use monitor_lib::{
    alerting::AlertDecision,
    health::{components, HealthRegistry},
    models::Priority,
    observability::MonitorMetrics,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = MonitorMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_while_source_failing() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::SOURCE, "2 consecutive failures: timeout")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded still returns 200 (monitoring continues)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["source"]["message"],
        "2 consecutive failures: timeout"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_alarm_undelivered() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::NOTIFIER, "SustainedLow alarm undelivered")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_tick() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_first_tick() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_source_escalated() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::SOURCE, "6 consecutive failures")
        .await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(readiness["reason"].as_str().unwrap().contains("source"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.record_reading(5.4);
    state.metrics.record_source_failure(1);
    state.metrics.inc_alert_dispatched(AlertDecision::SustainedLow);
    state.metrics.inc_delivery_failure(Priority::Emergency);
    state.metrics.observe_tick_duration(0.3);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("glucose_monitor_latest_reading_mmol"));
    assert!(metrics_text.contains("glucose_monitor_readings_total"));
    assert!(metrics_text.contains("glucose_monitor_source_failures_total"));
    assert!(metrics_text.contains("glucose_monitor_alerts_dispatched_total{decision=\"sustained_low\"}"));
    assert!(metrics_text.contains("glucose_monitor_delivery_failures_total{priority=\"emergency\"}"));
    assert!(metrics_text.contains("glucose_monitor_tick_duration_seconds_bucket"));
    assert!(metrics_text.contains("glucose_monitor_tick_duration_seconds_count"));
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let (_, health) = get_json(app, "/healthz").await;

    assert!(health["components"].is_object());
    assert!(health["components"]["source"].is_object());
    assert!(health["components"]["notifier"].is_object());
}
