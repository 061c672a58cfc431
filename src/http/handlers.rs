use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::state::AppState;
use crate::backend::ChannelSelection;
use crate::buffer::Modality;
use crate::config::IndexingOverrides;
use crate::session::LifecycleNotification;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartRecordRequest {
    /// Channels to record; the coordinator picks defaults when omitted.
    pub channels: Option<Vec<ChannelSelection>>,
    /// Runtime indexing overrides for this recording.
    pub indexing_config: Option<IndexingOverrides>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(alias = "rtstreamId")]
    pub rtstream_id: Option<String>,
    pub query: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePromptRequest {
    #[serde(alias = "rtstreamId")]
    pub rtstream_id: Option<String>,
    #[serde(alias = "scene_index_id", alias = "sceneIndexId")]
    pub index_id: Option<String>,
    pub prompt: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverlayShowRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub loading: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PermissionPromptRequest {
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
}

fn ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn err(message: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "status": "error", "error": message.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/status
/// Recording state snapshot plus assistant and buffer diagnostics.
pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.recording.snapshot().await;
    let mut body = match serde_json::to_value(&snapshot) {
        Ok(Value::Object(map)) => map,
        _ => return err("failed to serialize recording state"),
    };
    body.insert("status".to_string(), json!("ok"));
    body.insert(
        "assistant_session_id".to_string(),
        json!(state.assistant.session_id()),
    );
    body.insert(
        "assistant_pid".to_string(),
        json!(state.assistant.child_pid()),
    );
    body.insert("buffer_counts".to_string(), json!(state.buffer.counts()));
    Json(Value::Object(body))
}

/// POST /api/record/start
pub async fn start_record(
    State(state): State<AppState>,
    body: Option<Json<StartRecordRequest>>,
) -> Json<Value> {
    let Json(req) = body.unwrap_or_default();
    match state
        .coordinator
        .start_recording(req.channels, req.indexing_config)
        .await
    {
        Ok(session_id) => Json(json!({ "status": "ok", "session_id": session_id })),
        Err(e) => {
            error!("start recording failed: {:#}", e);
            err(e)
        }
    }
}

/// POST /api/record/stop
pub async fn stop_record(State(state): State<AppState>) -> Json<Value> {
    match state.coordinator.stop_recording().await {
        Ok(duration) => Json(json!({ "status": "ok", "duration_secs": duration })),
        Err(e) => {
            error!("stop recording failed: {:#}", e);
            err(e)
        }
    }
}

/// GET /api/context/:modality
/// One modality's recent entries, or every buffer for `all`.
pub async fn get_context(
    State(state): State<AppState>,
    Path(modality): Path<String>,
) -> Json<Value> {
    if modality == "all" {
        let mut body = match serde_json::to_value(state.buffer.all()) {
            Ok(Value::Object(map)) => map,
            _ => return err("failed to serialize context buffers"),
        };
        body.insert("status".to_string(), json!("ok"));
        return Json(Value::Object(body));
    }

    match Modality::parse(&modality) {
        Some(m) => {
            let mut body = serde_json::Map::new();
            body.insert("status".to_string(), json!("ok"));
            body.insert(modality, json!(state.buffer.recent(m, 20)));
            Json(Value::Object(body))
        }
        None => err(format!("unknown context type: {}", modality)),
    }
}

/// POST /api/rtstream/search
pub async fn rtstream_search(
    State(state): State<AppState>,
    body: Option<Json<SearchRequest>>,
) -> Json<Value> {
    let Json(req) = body.unwrap_or_default();
    let (Some(rtstream_id), Some(Value::String(query))) = (req.rtstream_id, req.query) else {
        return err("rtstream_id and query (string) required");
    };

    match state.coordinator.search(&rtstream_id, &query).await {
        Ok(Value::Object(results)) => {
            let mut body = results;
            body.insert("status".to_string(), json!("ok"));
            Json(Value::Object(body))
        }
        Ok(other) => Json(json!({ "status": "ok", "data": other })),
        Err(e) => {
            error!("rtstream search failed: {:#}", e);
            err(e)
        }
    }
}

/// POST /api/rtstream/update-prompt
pub async fn update_prompt(
    State(state): State<AppState>,
    body: Option<Json<UpdatePromptRequest>>,
) -> Json<Value> {
    let Json(req) = body.unwrap_or_default();
    let (Some(rtstream_id), Some(index_id), Some(Value::String(prompt))) =
        (req.rtstream_id, req.index_id, req.prompt)
    else {
        return err("rtstream_id, index_id, and prompt (string) required");
    };

    match state
        .coordinator
        .update_prompt(&rtstream_id, &index_id, &prompt)
        .await
    {
        Ok(kind) => Json(json!({
            "status": "ok",
            "message": "index prompt updated",
            "index_kind": kind.unwrap_or_else(|| "unknown".to_string()),
        })),
        Err(e) => {
            error!("update prompt failed: {:#}", e);
            err(e)
        }
    }
}

/// POST /api/overlay/show
pub async fn overlay_show(
    State(state): State<AppState>,
    body: Option<Json<OverlayShowRequest>>,
) -> Json<Value> {
    let Json(req) = body.unwrap_or_default();
    state.overlay.show(&req.text, req.loading).await;
    ok()
}

/// POST /api/overlay/hide
pub async fn overlay_hide(State(state): State<AppState>) -> Json<Value> {
    state.overlay.hide().await;
    ok()
}

/// POST /api/permission-prompt
pub async fn permission_prompt(
    State(state): State<AppState>,
    body: Option<Json<PermissionPromptRequest>>,
) -> Json<Value> {
    let Json(req) = body.unwrap_or_default();
    let tool_name = req.tool_name.unwrap_or_else(|| "Unknown".to_string());
    info!("permission prompt for tool: {}", tool_name);
    let decision = state
        .overlay
        .show_permission_prompt(&tool_name, &req.tool_input)
        .await;
    Json(json!({ "status": "ok", "decision": decision }))
}

/// GET /api/assistant-session
pub async fn assistant_session(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "assistant_session_id": state.assistant.session_id(),
    }))
}

/// POST /api/shutdown
/// Responds immediately; teardown runs after the response is on the wire.
pub async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    state.shutdown.clone().trigger("api shutdown");
    Json(json!({ "status": "ok", "message": "shutdown initiated" }))
}

/// POST /webhook
/// Lifecycle notifications are acknowledged immediately and processed in
/// the background; the notifying side never sees a processing error.
pub async fn webhook(State(state): State<AppState>, body: Option<Json<Value>>) -> Json<Value> {
    let Json(body) = body.unwrap_or_else(|| Json(Value::Null));
    match LifecycleNotification::from_value(&body) {
        Some(notification) => {
            info!(
                session = notification.session_id.as_deref(),
                "webhook: {:?}", notification.event
            );
            let coordinator = state.coordinator.clone();
            tokio::spawn(async move {
                coordinator.handle_lifecycle(notification).await;
            });
        }
        None => info!("webhook payload without event type, ignoring"),
    }
    ok()
}
