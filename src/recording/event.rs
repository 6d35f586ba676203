use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::payload::Payload;

/// Lifecycle notification emitted to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Started {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    Paused {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    Resumed {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Final event of a take, carrying the assembled payload
    Stopped {
        session_id: String,
        timestamp: DateTime<Utc>,
        /// Time spent in `Recording` only
        duration: Duration,
        payload: Payload,
    },
    /// Follows `Stopped` when the encoder failed and the payload is partial
    Truncated {
        session_id: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

impl RecordingEvent {
    pub fn session_id(&self) -> &str {
        match self {
            RecordingEvent::Started { session_id, .. }
            | RecordingEvent::Paused { session_id, .. }
            | RecordingEvent::Resumed { session_id, .. }
            | RecordingEvent::Stopped { session_id, .. }
            | RecordingEvent::Truncated { session_id, .. } => session_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RecordingEvent::Started { timestamp, .. }
            | RecordingEvent::Paused { timestamp, .. }
            | RecordingEvent::Resumed { timestamp, .. }
            | RecordingEvent::Stopped { timestamp, .. }
            | RecordingEvent::Truncated { timestamp, .. } => *timestamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordingEvent::Started { .. } => "started",
            RecordingEvent::Paused { .. } => "paused",
            RecordingEvent::Resumed { .. } => "resumed",
            RecordingEvent::Stopped { .. } => "stopped",
            RecordingEvent::Truncated { .. } => "truncated",
        }
    }

    /// Wire form for the session status endpoint (None for `Truncated`)
    pub fn to_update(&self) -> Option<RecordingUpdate> {
        let (kind, duration_seconds) = match self {
            RecordingEvent::Started { .. } => (UpdateKind::RecordingStarted, None),
            RecordingEvent::Paused { .. } => (UpdateKind::RecordingPaused, None),
            RecordingEvent::Resumed { .. } => (UpdateKind::RecordingResumed, None),
            RecordingEvent::Stopped { duration, .. } => {
                (UpdateKind::RecordingStopped, Some(duration.as_secs_f64()))
            }
            RecordingEvent::Truncated { .. } => return None,
        };

        Some(RecordingUpdate {
            kind,
            timestamp: Some(self.timestamp()),
            duration: duration_seconds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    RecordingStarted,
    RecordingPaused,
    RecordingResumed,
    RecordingStopped,
    /// Sent by clients once the payload has been uploaded
    RecordingComplete,
}

/// Status update body: `{"type": "recording_started", "timestamp": ..., "duration": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Elapsed recording time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Receiver of lifecycle events
///
/// Sinks must not call back into the recorder synchronously; the provided
/// channel implementation decouples delivery from the emitting transition.
pub trait EventSink: Send + 'static {
    fn emit(&mut self, event: RecordingEvent);
}

impl EventSink for mpsc::UnboundedSender<RecordingEvent> {
    fn emit(&mut self, event: RecordingEvent) {
        if self.send(event).is_err() {
            debug!("Recording event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_wire_format() {
        let update = RecordingUpdate {
            kind: UpdateKind::RecordingStopped,
            timestamp: None,
            duration: Some(9.0),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"type":"recording_stopped","duration":9.0}"#);

        let parsed: RecordingUpdate =
            serde_json::from_str(r#"{"type":"recording_complete","timestamp":"2025-01-02T03:04:05Z"}"#)
                .unwrap();
        assert_eq!(parsed.kind, UpdateKind::RecordingComplete);
        assert!(parsed.timestamp.is_some());
        assert_eq!(parsed.duration, None);
    }

    #[test]
    fn test_truncated_has_no_wire_update() {
        let event = RecordingEvent::Truncated {
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            reason: "input ended".to_string(),
        };
        assert!(event.to_update().is_none());
        assert_eq!(event.kind(), "truncated");
    }

    #[test]
    fn test_channel_sink_delivers_every_event() {
        let (mut sink, mut rx) = mpsc::unbounded_channel::<RecordingEvent>();
        for _ in 0..1000 {
            EventSink::emit(
                &mut sink,
                RecordingEvent::Resumed {
                    session_id: "s1".to_string(),
                    timestamp: Utc::now(),
                },
            );
        }
        EventSink::emit(
            &mut sink,
            RecordingEvent::Stopped {
                session_id: "s1".to_string(),
                timestamp: Utc::now(),
                duration: Duration::from_secs(3),
                payload: Payload::empty("audio/pcm;rate=48000;channels=1"),
            },
        );

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 1001);
        assert_eq!(received.last().map(|e| e.kind()), Some("stopped"));
    }
}
