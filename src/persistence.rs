//! Recording lifecycle persistence
//!
//! Turns recorder events into session metadata updates and uploads the
//! finished take as an audio clip. Everything here runs downstream of the
//! recorder: failures are logged and never reach the recording machine.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::audio::encode_wav;
use crate::model::{object_types, ClipType, CosmicObject, NewObject, SessionStatus};
use crate::recording::{Payload, RecordingEvent, RecordingUpdate, UpdateKind};
use crate::store::{Media, NewMedia, ObjectStore, StoreError};

/// Media folder for uploaded takes
pub const RECORDINGS_FOLDER: &str = "recordings";

const DEFAULT_PCM_RATE: u32 = 48_000;
const DEFAULT_PCM_CHANNELS: u16 = 1;

/// Result of a successful upload handoff
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecording {
    pub success: bool,
    pub clip: CosmicObject,
    pub media: Media,
}

fn iso_timestamp(ts: chrono::DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Session metadata patch for a status update
///
/// Paused and resumed sessions stay `live`; only stop/complete close them.
pub fn status_patch(update: &RecordingUpdate) -> Map<String, Value> {
    let timestamp = Value::String(iso_timestamp(update.timestamp.unwrap_or_else(Utc::now)));
    let mut patch = Map::new();

    let status = match update.kind {
        UpdateKind::RecordingStarted => {
            patch.insert("recording_started_at".to_string(), timestamp);
            SessionStatus::Live
        }
        UpdateKind::RecordingPaused => {
            patch.insert("recording_paused_at".to_string(), timestamp);
            SessionStatus::Live
        }
        UpdateKind::RecordingResumed => {
            patch.insert("recording_resumed_at".to_string(), timestamp);
            SessionStatus::Live
        }
        UpdateKind::RecordingStopped | UpdateKind::RecordingComplete => {
            patch.insert("recording_completed_at".to_string(), timestamp);
            if let Some(seconds) = update.duration.filter(|d| *d > 0.0) {
                let minutes = (seconds / 60.0).round() as i64;
                patch.insert("actual_duration".to_string(), json!(minutes));
            }
            SessionStatus::Completed
        }
    };

    patch.insert("status".to_string(), json!(status));
    patch
}

pub async fn apply_update(
    store: &dyn ObjectStore,
    session_id: &str,
    update: &RecordingUpdate,
) -> Result<CosmicObject, StoreError> {
    store
        .update_metadata(session_id, status_patch(update))
        .await
}

/// Upload media for a session's take, recording PCM data as WAV
pub fn media_from_payload(payload: &Payload) -> Result<NewMedia> {
    if payload.essence() == "audio/pcm" {
        let sample_rate = payload
            .mime_param("rate")
            .and_then(|r| r.parse().ok())
            .unwrap_or(DEFAULT_PCM_RATE);
        let channels = payload
            .mime_param("channels")
            .and_then(|c| c.parse().ok())
            .unwrap_or(DEFAULT_PCM_CHANNELS);

        let wav = encode_wav(&payload.data, sample_rate, channels)
            .context("Failed to wrap PCM payload as WAV")?;

        return Ok(NewMedia {
            file_name: "recording.wav".to_string(),
            content_type: "audio/wav".to_string(),
            data: Bytes::from(wav),
            folder: Some(RECORDINGS_FOLDER.to_string()),
        });
    }

    Ok(NewMedia {
        file_name: payload.file_name(),
        content_type: payload.essence().to_string(),
        data: payload.data.clone(),
        folder: Some(RECORDINGS_FOLDER.to_string()),
    })
}

/// Upload a file and register it as a content clip of the session
pub async fn upload_clip(
    store: &dyn ObjectStore,
    session_id: &str,
    media: NewMedia,
    duration_secs: u64,
) -> Result<StoredRecording> {
    let media = store
        .insert_media(media)
        .await
        .context("Failed to upload recording media")?;

    let mut metadata = Map::new();
    metadata.insert("session_id".to_string(), json!(session_id));
    metadata.insert("audio_file".to_string(), serde_json::to_value(&media)?);
    metadata.insert("duration".to_string(), json!(duration_secs));
    metadata.insert("clip_type".to_string(), json!(ClipType::Content));
    metadata.insert("is_included".to_string(), json!(true));
    metadata.insert("notes".to_string(), json!("Raw recording from session"));

    let clip = store
        .insert(NewObject {
            title: format!("Recording - {}", iso_timestamp(Utc::now())),
            object_type: object_types::AUDIO_CLIPS.to_string(),
            metadata,
        })
        .await
        .context("Failed to create audio clip")?;

    info!(
        "Stored recording for session {}: clip {} ({} bytes)",
        session_id, clip.id, media.size
    );

    Ok(StoredRecording {
        success: true,
        clip,
        media,
    })
}

pub async fn store_recording(
    store: &dyn ObjectStore,
    session_id: &str,
    payload: &Payload,
    duration: Duration,
) -> Result<StoredRecording> {
    let media = media_from_payload(payload)?;
    upload_clip(store, session_id, media, duration.as_secs()).await
}

/// Consume recorder events until the recorder goes away
///
/// Each lifecycle event becomes a status update. A stopped take is uploaded
/// and then marked complete.
pub async fn persist_events(
    store: Arc<dyn ObjectStore>,
    mut events: mpsc::UnboundedReceiver<RecordingEvent>,
) {
    while let Some(event) = events.recv().await {
        let session_id = event.session_id().to_string();

        if let Some(update) = event.to_update() {
            if let Err(e) = apply_update(store.as_ref(), &session_id, &update).await {
                warn!(
                    "Failed to record {} for session {}: {}",
                    event.kind(),
                    session_id,
                    e
                );
            }
        }

        match event {
            RecordingEvent::Stopped {
                duration, payload, ..
            } => {
                if payload.is_empty() {
                    info!("Session {}: empty take, nothing to upload", session_id);
                    continue;
                }

                match store_recording(store.as_ref(), &session_id, &payload, duration).await {
                    Ok(_) => {
                        let complete = RecordingUpdate {
                            kind: UpdateKind::RecordingComplete,
                            timestamp: Some(Utc::now()),
                            duration: Some(duration.as_secs_f64()),
                        };
                        if let Err(e) = apply_update(store.as_ref(), &session_id, &complete).await {
                            warn!("Failed to mark session {} complete: {}", session_id, e);
                        }
                    }
                    Err(e) => error!("Failed to store recording for session {}: {:#}", session_id, e),
                }
            }
            RecordingEvent::Truncated { reason, .. } => {
                warn!("Session {}: recording truncated: {}", session_id, reason);
            }
            _ => {}
        }
    }
}
