//! In-process stand-in for the tag-group service, used by tests

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockState {
    pub groups: Vec<Value>,
    pub members: HashMap<String, Value>,
    pub member_delays: HashMap<String, Duration>,
    pub tag_groups: HashMap<String, BTreeMap<String, Value>>,
    pub legacy_members: Vec<String>,
    pub fail_create: bool,
    /// "METHOD path" for every request served
    pub requests: Vec<String>,
    pub triggers: Vec<Value>,
}

pub type SharedState = Arc<Mutex<MockState>>;

fn record(state: &SharedState, line: String) {
    state.lock().unwrap().requests.push(line);
}

async fn groups(State(state): State<SharedState>) -> Json<Value> {
    record(&state, "GET /api/groups".to_string());
    let groups = state.lock().unwrap().groups.clone();
    Json(json!({ "groups": groups }))
}

async fn legacy_members(State(state): State<SharedState>) -> Json<Value> {
    record(&state, "GET /api/members".to_string());
    let names = state.lock().unwrap().legacy_members.clone();
    Json(json!(names))
}

async fn members(State(state): State<SharedState>, Path(chat_id): Path<String>) -> Response {
    record(&state, format!("GET /api/members/{}", chat_id));
    let delay = state.lock().unwrap().member_delays.get(&chat_id).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let found = state.lock().unwrap().members.get(&chat_id).cloned();
    match found {
        Some(list) => Json(list).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn tag_groups(State(state): State<SharedState>, Path(chat_id): Path<String>) -> Json<Value> {
    record(&state, format!("GET /api/taggroups/{}", chat_id));
    let map = state
        .lock()
        .unwrap()
        .tag_groups
        .get(&chat_id)
        .cloned()
        .unwrap_or_default();
    Json(json!({ "tag_groups": map }))
}

async fn create_tag_group(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    record(&state, "POST /api/taggroups".to_string());
    let mut guard = state.lock().unwrap();
    if guard.fail_create {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let chat_id = match &body["chat_id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let name = body["name"].as_str().unwrap_or_default().to_string();
    guard
        .tag_groups
        .entry(chat_id)
        .or_default()
        .insert(name, body["members"].clone());
    Json(json!({ "ok": true })).into_response()
}

async fn trigger(State(state): State<SharedState>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "POST /api/trigger".to_string());
    state.lock().unwrap().triggers.push(body);
    Json(json!({ "ok": true }))
}

/// Serve `state` on an ephemeral local port and return the base URL
pub async fn spawn(state: SharedState) -> String {
    let router = Router::new()
        .route("/api/groups", get(groups))
        .route("/api/members", get(legacy_members))
        .route("/api/members/{chat_id}", get(members))
        .route("/api/taggroups", post(create_tag_group))
        .route("/api/taggroups/{chat_id}", get(tag_groups))
        .route("/api/trigger", post(trigger))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
