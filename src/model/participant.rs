use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::object::CosmicObject;

/// Read-only participant reference shown next to the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParticipant {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl SessionParticipant {
    pub fn from_object(object: &CosmicObject) -> Self {
        let display_name = if object.title.is_empty() {
            object.meta_str("name").unwrap_or_default().to_string()
        } else {
            object.title.clone()
        };
        let avatar_url = object
            .meta("avatar")
            .and_then(|avatar| avatar.get("imgix_url").or_else(|| avatar.get("url")))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            id: object.id.clone(),
            display_name,
            avatar_url,
        }
    }

    /// Placeholder letter for participants without an avatar
    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('U')
    }

    /// 48px square crop of the avatar
    pub fn avatar_thumbnail_url(&self) -> Option<String> {
        self.avatar_url
            .as_ref()
            .map(|url| format!("{}?w=48&h=48&fit=crop&auto=format,compress", url))
    }
}

/// Participants embedded in a recording session (depth-1 objects only)
pub fn session_participants(session: &CosmicObject) -> Vec<SessionParticipant> {
    session
        .meta("participants")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<CosmicObject>(item.clone()).ok())
                .map(|object| SessionParticipant::from_object(&object))
                .collect()
        })
        .unwrap_or_default()
}
