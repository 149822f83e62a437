//! Sessions driven through a kernel bridge over real HTTP.
//!
//! A small axum app on an ephemeral port plays the bridge: it answers each
//! execute request with newline-delimited messages.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use dfnb_server::backend::ExecuteRequest;
use dfnb_server::config::ServerConfig;
use dfnb_server::router::build_router;
use dfnb_server::state::AppState;

use common::*;

async fn answer(Json(request): Json<ExecuteRequest>) -> String {
    let cell = request.auxiliary.uuid;
    let lines = [
        json!({
            "channel": "iopub",
            "header": { "msg_type": "status" },
            "content": { "execution_state": "busy" }
        }),
        json!({
            "channel": "iopub",
            "header": { "msg_type": "stream" },
            "content": { "name": "stdout", "text": format!("ran {}\n", request.code) }
        }),
        json!({
            "channel": "reply",
            "header": { "msg_type": "execute_reply" },
            "content": {
                "status": "ok",
                "execution_count": cell.raw(),
                "nodes": [cell],
                "cells": [cell]
            }
        }),
    ];
    lines.iter().map(|line| format!("{line}\n")).collect()
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Starts the bridge and returns its base URL.
async fn spawn_bridge() -> String {
    let app = Router::new()
        .route("/execute", post(answer))
        .route("/broken/execute", post(broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn call(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn new_session(app: &Router) -> (String, Value) {
    let (status, created) = call(app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    (created["session_id"].as_str().unwrap().to_string(), created)
}

async fn register(app: &Router, session: &str, raw: u32, code: &str) {
    let (status, _) = call(
        app,
        "POST",
        &format!("/sessions/{session}/cells"),
        Some(json!({ "cell_id": long(raw), "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attached_bridge_runs_cells() {
    let bridge = spawn_bridge().await;
    let app = build_router(AppState::in_memory());
    let (session, created) = new_session(&app).await;
    assert_eq!(created["connected"], false);

    let (status, summary) = call(
        &app,
        "PUT",
        &format!("/sessions/{session}/backend"),
        Some(json!({ "url": bridge })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["connected"], true);

    register(&app, &session, 0xa, "x = 1").await;
    let (status, body) = call(
        &app,
        "POST",
        &format!("/sessions/{session}/cells/0000000a/execute"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"]["outcome"], "completed");
    assert_eq!(body["cell"]["execution_count"], 0xa);
    assert_eq!(body["cell"]["outputs"][0]["content"]["text"], "ran x = 1\n");
    assert_eq!(body["cell"]["clean"], true);

    let (status, _) = call(&app, "GET", &format!("/sessions/{session}/graph"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, summary) = call(&app, "DELETE", &format!("/sessions/{session}/backend"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["connected"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_bridge_is_used_by_new_sessions() {
    let bridge = spawn_bridge().await;
    let config = ServerConfig {
        backend_url: Some(bridge),
        ..ServerConfig::default()
    };
    let app = build_router(AppState::new(config));
    let (session, created) = new_session(&app).await;
    assert_eq!(created["connected"], true);

    register(&app, &session, 0xa, "x = 1").await;
    register(&app, &session, 0xb, "y = 2").await;
    let (status, body) = call(
        &app,
        "POST",
        &format!("/sessions/{session}/run"),
        Some(json!({ "cells": ["0000000a", "0000000b"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let (_, dirty) = call(&app, "GET", &format!("/sessions/{session}/dirty"), None).await;
    assert_eq!(dirty["clean"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_bridge_is_bad_gateway() {
    let bridge = spawn_bridge().await;
    let app = build_router(AppState::in_memory());
    let (session, _) = new_session(&app).await;
    call(
        &app,
        "PUT",
        &format!("/sessions/{session}/backend"),
        Some(json!({ "url": format!("{bridge}/broken") })),
    )
    .await;
    register(&app, &session, 0xa, "x = 1").await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/sessions/{session}/cells/0000000a/execute"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");

    let (_, cell) = call(&app, "GET", &format!("/sessions/{session}/cells/0000000a"), None).await;
    assert_eq!(cell["prompt"], "0000000a");
}
