use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object types used by the dashboard
pub mod object_types {
    pub const EPISODES: &str = "episodes";
    pub const PARTICIPANTS: &str = "participants";
    pub const RECORDING_SESSIONS: &str = "recording-sessions";
    pub const AUDIO_CLIPS: &str = "audio-clips";
    pub const QUALITY_CHECKS: &str = "quality-checks";
    pub const SPONSOR_SEGMENTS: &str = "sponsor-segments";
    pub const PODCAST_SERIES: &str = "podcast-series";
}

/// A stored object: fixed envelope plus free-form metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmicObject {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub object_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CosmicObject {
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key).filter(|v| !v.is_null())
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta(key).and_then(Value::as_str)
    }

    /// Decode a metadata field, ignoring values of the wrong shape
    pub fn meta_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.meta(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Object creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObject {
    pub title: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Slugify a title the way the store does for new objects
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
