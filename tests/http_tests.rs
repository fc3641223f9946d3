// Integration tests for the HTTP panel API
//
// Requests go straight through the router with tower's oneshot; a real
// controller loop runs behind the command channel.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{raster_display, FakeHost};
use periph_diag::{create_router, AppState, LogNotifier, MonitorController, MonitorSettings, MonitorState};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

struct Harness {
    state: AppState,
    host: Arc<FakeHost>,
}

fn harness(mics: usize) -> Harness {
    let host = FakeHost::with_mics(mics);
    let display = raster_display();
    let controller = MonitorController::new(
        host.clone(),
        display.clone(),
        Arc::new(LogNotifier),
        MonitorSettings {
            auto_start: false,
            ..MonitorSettings::default()
        },
    );
    let status = controller.subscribe_status();
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(controller.run(rx));

    Harness {
        state: AppState::new(tx, status, display),
        host,
    }
}

async fn send(state: &AppState, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = create_router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn json(state: &AppState, uri: &str) -> Value {
    let (status, body) = send(state, "GET", uri).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let h = harness(1);
    let (status, body) = send(&h.state, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_devices_after_enumeration() {
    let h = harness(2);
    let mut status = h.state.status.clone();
    status.wait_for(|s| s.state == MonitorState::Ready).await.unwrap();

    let devices = json(&h.state, "/devices").await;
    assert_eq!(devices["devices"].as_array().map(|d| d.len()), Some(2));
    assert_eq!(devices["selected"], 0);
    assert!(devices["placeholder"].is_null());
}

#[tokio::test]
async fn test_start_and_stop_through_api() {
    let h = harness(2);
    let mut status = h.state.status.clone();
    status.wait_for(|s| s.state == MonitorState::Ready).await.unwrap();

    let (code, _) = send(&h.state, "POST", "/monitor/select/1").await;
    assert_eq!(code, StatusCode::ACCEPTED);
    let (code, _) = send(&h.state, "POST", "/monitor/start").await;
    assert_eq!(code, StatusCode::ACCEPTED);
    status.wait_for(|s| s.state == MonitorState::Capturing).await.unwrap();
    assert_eq!(h.host.open_streams(), 1);

    let body = json(&h.state, "/status").await;
    assert_eq!(body["state"]["state"], "Capturing");
    assert_eq!(body["session"]["device"]["id"], "mic-1");
    assert_eq!(body["panel"]["toggle"]["label"], "Stop");
    assert!(body["level_text"].as_str().is_some_and(|t| t.ends_with('%')));

    let (code, _) = send(&h.state, "POST", "/monitor/toggle").await;
    assert_eq!(code, StatusCode::ACCEPTED);
    status.wait_for(|s| s.state == MonitorState::Ready).await.unwrap();
    assert_eq!(h.host.open_streams(), 0);
}

#[tokio::test]
async fn test_no_devices_placeholder() {
    let h = harness(0);
    let mut status = h.state.status.clone();
    status
        .wait_for(|s| s.panel.selector.placeholder() == Some("No microphones found"))
        .await
        .unwrap();

    let devices = json(&h.state, "/devices").await;
    assert_eq!(devices["placeholder"], "No microphones found");
    assert_eq!(devices["devices"].as_array().map(|d| d.len()), Some(0));
}

#[tokio::test]
async fn test_snapshot_is_png() {
    let h = harness(1);
    let (status, body) = send(&h.state, "GET", "/snapshot.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn test_commands_rejected_after_shutdown() {
    let h = harness(1);
    h.state
        .commands
        .send(periph_diag::MonitorCommand::Shutdown)
        .await
        .unwrap();
    h.state.commands.closed().await;

    let (status, _) = send(&h.state, "POST", "/devices/refresh").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
