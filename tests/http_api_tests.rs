// Integration tests for the HTTP API
//
// These tests drive the axum router in-process with `oneshot` requests,
// backed by the in-memory store and a mock audio input.

mod common;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{MockDevice, MockInput};
use podcast_studio::model::{object_types, NewObject, SessionStatus};
use podcast_studio::recording::{AudioInput, RecorderOptions};
use podcast_studio::store::{MemoryStore, ObjectKey, ObjectStore};
use podcast_studio::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt;

const BOUNDARY: &str = "podcast-studio-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new(input: Arc<dyn AudioInput>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), input, RecorderOptions::default());
        Self {
            router: create_router(state),
            store,
        }
    }

    fn with_device(device: &MockDevice) -> Self {
        Self::new(Arc::new(MockInput::new(device.clone())))
    }

    async fn session(&self) -> Result<String> {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "participants".to_string(),
            json!([{"id": "p1", "title": "Ada", "metadata": {"avatar": {"imgix_url": "https://img/ada.png"}}}]),
        );
        let created = self
            .store
            .insert(NewObject {
                title: "Pilot".to_string(),
                object_type: object_types::RECORDING_SESSIONS.to_string(),
                metadata,
            })
            .await?;
        Ok(created.id)
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        Ok((status, value))
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    async fn empty(&self, method: Method, uri: &str) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())?;
        self.send(request).await
    }
}

fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/webm\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(parts: &[(&str, Option<&str>, &[u8])]) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/api/recordings/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))?)
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());
    let (status, body) = app.empty(Method::GET, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_session_crud() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());

    let (status, created) = app
        .json(
            Method::POST,
            "/api/sessions",
            json!({"title": "Episode 3 session", "metadata": {"session_date": "2025-03-01"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["type"], json!("recording-sessions"));
    let id = created["id"].as_str().expect("id").to_string();

    let (status, patched) = app
        .json(
            Method::PATCH,
            &format!("/api/sessions/{}", id),
            json!({"notes": "Bring the good mic"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["metadata"]["session_date"], json!("2025-03-01"));
    assert_eq!(patched["metadata"]["notes"], json!("Bring the good mic"));

    let (status, fetched) = app.empty(Method::GET, &format!("/api/sessions/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], json!("Episode 3 session"));

    let (status, body) = app.empty(Method::GET, "/api/sessions/unknown").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Session not found"}));

    Ok(())
}

#[tokio::test]
async fn test_session_select_fields() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());

    let (status, created) = app
        .json(
            Method::POST,
            "/api/sessions",
            json!({"title": "Pilot", "metadata": {"status": "scheduled", "recording_quality": "high"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        created["metadata"]["recording_quality"],
        json!({"key": "high", "value": "High"})
    );
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/api/sessions/{}", id),
            json!({"recording_quality": "lossless"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "invalid recording_quality: unknown option lossless"})
    );

    let (status, episode) = app
        .json(
            Method::POST,
            "/api/sessions",
            json!({"title": "Episode 1", "type": "episodes", "metadata": {"status": "review"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(episode["metadata"]["status"], json!({"key": "review", "value": "Review"}));

    Ok(())
}

#[tokio::test]
async fn test_status_update_endpoint() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());
    let id = app.session().await?;

    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/api/sessions/{}/status", id),
            json!({"type": "recording_stopped", "timestamp": "2025-01-02T03:04:05Z", "duration": 600}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["session"]["metadata"]["actual_duration"], json!(10));
    assert_eq!(
        body["session"]["metadata"]["status"],
        json!({"key": "completed", "value": "Completed"})
    );

    let (status, _) = app
        .json(
            Method::PATCH,
            "/api/sessions/unknown/status",
            json!({"type": "recording_started"}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_upload_creates_clip() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());
    let id = app.session().await?;

    let request = upload_request(&[
        ("audio", Some("take.webm"), b"webm-bytes"),
        ("sessionId", None, id.as_bytes()),
        ("duration", None, b"42"),
    ])?;
    let (status, body) = app.send(request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["media"]["folder"], json!("recordings"));
    assert_eq!(body["clip"]["metadata"]["duration"], json!(42));
    assert_eq!(body["clip"]["metadata"]["session_id"], json!(id));
    assert_eq!(
        body["clip"]["metadata"]["clip_type"],
        json!({"key": "content", "value": "Content"})
    );

    let media = app.store.media().await;
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].original_name, "take.webm");
    assert_eq!(media[0].content_type, "audio/webm");

    Ok(())
}

#[tokio::test]
async fn test_upload_missing_fields() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());

    let request = upload_request(&[("sessionId", None, b"abc"), ("duration", None, b"10")])?;
    let (status, body) = app.send(request).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing required fields"}));
    assert!(app.store.media().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_recorder_control_flow() -> Result<()> {
    let device = MockDevice::new();
    let app = TestApp::with_device(&device);
    let id = app.session().await?;
    let base = format!("/api/sessions/{}/record", id);

    let (status, _) = app.empty(Method::GET, &base).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, snapshot) = app.empty(Method::POST, &format!("{}/start", base)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], json!("recording"));
    assert_eq!(snapshot["label"], json!("Recording Live"));
    assert_eq!(snapshot["participants"][0]["display_name"], json!("Ada"));

    let (status, body) = app.empty(Method::POST, &format!("{}/start", base)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap_or_default().contains("cannot"));

    let (status, snapshot) = app.empty(Method::POST, &format!("{}/pause", base)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], json!("paused"));

    let (status, _) = app.empty(Method::POST, &format!("{}/resume", base)).await?;
    assert_eq!(status, StatusCode::OK);

    device.push_chunk(0, b"chunk");
    let (status, snapshot) = app.empty(Method::POST, &format!("{}/stop", base)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], json!("stopped"));
    assert_eq!(device.released_count(), 1);

    let (status, _) = app.empty(Method::POST, &format!("{}/pause", base)).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Events reach the store in the background
    let mut completed = false;
    for _ in 0..100 {
        let session = app.store.find_one(&ObjectKey::id(&id)).await?;
        if session.meta_as::<SessionStatus>("status") == Some(SessionStatus::Completed)
            && !app.store.media().await.is_empty()
        {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(completed, "stopped take should be persisted");

    Ok(())
}

#[tokio::test]
async fn test_pending_start_does_not_block_other_sessions() -> Result<()> {
    // The first acquire goes straight through, later ones wait on the gate
    let gate = Arc::new(Semaphore::new(1));
    let app = Arc::new(TestApp::new(Arc::new(MockInput::gated(
        MockDevice::new(),
        gate.clone(),
    ))));
    let other = app.session().await?;
    let pending = app.session().await?;

    let (status, _) = app
        .empty(Method::POST, &format!("/api/sessions/{}/record/start", other))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let start = |app: Arc<TestApp>| {
        let uri = format!("/api/sessions/{}/record/start", pending);
        tokio::spawn(async move { app.empty(Method::POST, &uri).await })
    };
    // One start waits in acquire, the second waits on that recorder's state
    let first = start(app.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = start(app.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, snapshot) = tokio::time::timeout(
        Duration::from_secs(2),
        app.empty(Method::POST, &format!("/api/sessions/{}/record/pause", other)),
    )
    .await??;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], json!("paused"));

    gate.add_permits(1);
    let (status, snapshot) = first.await??;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], json!("recording"));
    let (status, _) = second.await??;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn test_recorder_device_failure_is_503() -> Result<()> {
    let app = TestApp::new(Arc::new(MockInput::denied("no microphone")));
    let id = app.session().await?;

    let (status, body) = app
        .empty(Method::POST, &format!("/api/sessions/{}/record/start", id))
        .await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Unable to access microphone. Please check permissions."));

    // The failed recorder is not kept around
    let (status, _) = app
        .empty(Method::GET, &format!("/api/sessions/{}/record", id))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_recorder_for_unknown_session() -> Result<()> {
    let app = TestApp::with_device(&MockDevice::new());
    let (status, body) = app
        .empty(Method::POST, "/api/sessions/nope/record/start")
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Session not found"}));
    Ok(())
}
