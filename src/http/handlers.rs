use super::state::AppState;
use crate::model::{normalize_selects, object_types, session_participants, NewObject};
use crate::persistence::{self, StoredRecording, RECORDINGS_FOLDER};
use crate::recording::{Recorder, RecordingError, RecordingState, RecordingUpdate};
use crate::store::{NewMedia, ObjectKey, StoreError};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,

    /// Object type (default: recording-sessions)
    #[serde(rename = "type")]
    pub object_type: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub success: bool,
    pub session: crate::model::CosmicObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn store_error_response(e: &StoreError, message: &str) -> Response {
    if e.is_not_found() {
        return error_response(StatusCode::NOT_FOUND, "Session not found");
    }
    error!("{}: {}", message, e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn recording_error_response(session_id: &str, e: RecordingError) -> Response {
    let status = match &e {
        RecordingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        RecordingError::DeviceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RecordingError::EncoderFailure { .. } | RecordingError::Closed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    warn!("Recorder for session {}: {}", session_id, e);
    error_response(status, e.to_string())
}

fn no_recorder(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("No recorder for session {}", session_id),
    )
}

// ============================================================================
// Session handlers
// ============================================================================

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let mut object = NewObject {
        title: req.title,
        object_type: req
            .object_type
            .unwrap_or_else(|| object_types::RECORDING_SESSIONS.to_string()),
        metadata: req.metadata,
    };
    if let Err(e) = normalize_selects(&object.object_type, &mut object.metadata) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    match state.store.insert(object).await {
        Ok(created) => {
            info!("Created session: {}", created.id);
            (StatusCode::OK, Json(created)).into_response()
        }
        Err(e) => {
            error!("Failed to create session: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
        }
    }
}

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.find_one(&ObjectKey::id(&session_id)).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => store_error_response(&e, "Failed to fetch session"),
    }
}

/// PATCH /api/sessions/:session_id
/// Merge the body into the session metadata
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(mut updates): Json<Map<String, Value>>,
) -> impl IntoResponse {
    if let Err(e) = normalize_selects(object_types::RECORDING_SESSIONS, &mut updates) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    match state.store.update_metadata(&session_id, updates).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => store_error_response(&e, "Failed to update session"),
    }
}

/// PATCH /api/sessions/:session_id/status
pub async fn update_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<RecordingUpdate>,
) -> impl IntoResponse {
    match persistence::apply_update(state.store.as_ref(), &session_id, &update).await {
        Ok(session) => (
            StatusCode::OK,
            Json(StatusUpdateResponse {
                success: true,
                session,
            }),
        )
            .into_response(),
        Err(e) => store_error_response(&e, "Failed to update session status"),
    }
}

/// POST /api/recordings/upload
/// Multipart form: `audio` (file), `sessionId`, `duration` (seconds)
pub async fn upload_recording(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut audio: Option<(String, String, Bytes)> = None;
    let mut session_id: Option<String> = None;
    let mut duration = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let result = match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or("recording.webm").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                field
                    .bytes()
                    .await
                    .map(|data| audio = Some((file_name, content_type, data)))
            }
            "sessionId" => field.text().await.map(|text| session_id = Some(text)),
            "duration" => field.text().await.map(|text| duration = text),
            _ => Ok(()),
        };

        if let Err(e) = result {
            warn!("Failed to read upload field {}: {}", name, e);
            return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
        }
    }

    let (Some((file_name, content_type, data)), Some(session_id)) =
        (audio, session_id.filter(|s| !s.is_empty()))
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let duration_secs = parse_duration(&duration);
    let media = NewMedia {
        file_name,
        content_type,
        data,
        folder: Some(RECORDINGS_FOLDER.to_string()),
    };

    match persistence::upload_clip(state.store.as_ref(), &session_id, media, duration_secs).await {
        Ok(stored) => (StatusCode::OK, Json::<StoredRecording>(stored)).into_response(),
        Err(e) => {
            error!("Failed to upload recording: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to upload recording")
        }
    }
}

/// Whole seconds from a form value; anything unparseable counts as 0
fn parse_duration(value: &str) -> u64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d as u64)
        .unwrap_or(0)
}

// ============================================================================
// Recorder handlers
// ============================================================================

/// POST /api/sessions/:session_id/record/start
/// Create (or replace a stopped) recorder for the session and start it
pub async fn start_recorder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match state.store.find_one(&ObjectKey::id(&session_id)).await {
        Ok(session) => session,
        Err(e) => return store_error_response(&e, "Failed to fetch session"),
    };

    // The snapshot can queue behind an in-flight start, so no lock is held here
    let current = state.recorder(&session_id).await;
    let live = match &current {
        Some(existing) => matches!(
            existing.snapshot().await,
            Ok(snapshot) if snapshot.state != RecordingState::Stopped
        ),
        None => false,
    };

    let (recorder, created) = match current {
        Some(existing) if live => (existing, false),
        stale => {
            let mut recorders = state.recorders.write().await;
            // Replaced by a concurrent start since the check above
            let replaced = recorders
                .get(&session_id)
                .filter(|other| !stale.as_ref().is_some_and(|s| Arc::ptr_eq(s, *other)))
                .cloned();
            match replaced {
                Some(other) => (other, false),
                None => {
                    let (events_tx, events_rx) = mpsc::unbounded_channel();
                    tokio::spawn(persistence::persist_events(state.store.clone(), events_rx));

                    let recorder = Arc::new(Recorder::spawn(
                        session_id.clone(),
                        session_participants(&session),
                        state.input.clone(),
                        state.options.clone(),
                        events_tx,
                    ));
                    recorders.insert(session_id.clone(), recorder.clone());
                    (recorder, true)
                }
            }
        }
    };

    if let Err(e) = recorder.start().await {
        if created && !e.is_invalid_transition() {
            let mut recorders = state.recorders.write().await;
            if recorders
                .get(&session_id)
                .is_some_and(|r| Arc::ptr_eq(r, &recorder))
            {
                recorders.remove(&session_id);
            }
        }
        return recording_error_response(&session_id, e);
    }

    info!("Recording started for session: {}", session_id);
    recorder_snapshot(&session_id, &recorder).await
}

/// POST /api/sessions/:session_id/record/pause
pub async fn pause_recorder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(recorder) = state.recorder(&session_id).await else {
        return no_recorder(&session_id);
    };
    match recorder.pause().await {
        Ok(()) => recorder_snapshot(&session_id, &recorder).await,
        Err(e) => recording_error_response(&session_id, e),
    }
}

/// POST /api/sessions/:session_id/record/resume
pub async fn resume_recorder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(recorder) = state.recorder(&session_id).await else {
        return no_recorder(&session_id);
    };
    match recorder.resume().await {
        Ok(()) => recorder_snapshot(&session_id, &recorder).await,
        Err(e) => recording_error_response(&session_id, e),
    }
}

/// POST /api/sessions/:session_id/record/stop
pub async fn stop_recorder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(recorder) = state.recorder(&session_id).await else {
        return no_recorder(&session_id);
    };
    match recorder.stop().await {
        Ok(()) => {
            info!("Recording stopped for session: {}", session_id);
            recorder_snapshot(&session_id, &recorder).await
        }
        Err(e) => recording_error_response(&session_id, e),
    }
}

/// GET /api/sessions/:session_id/record
pub async fn get_recorder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => recorder_snapshot(&session_id, &recorder).await,
        None => no_recorder(&session_id),
    }
}

async fn recorder_snapshot(session_id: &str, recorder: &Recorder) -> Response {
    match recorder.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => recording_error_response(session_id, e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
