// Select-dropdown values
//
// The object store keeps dropdown fields as `{"key": "...", "value": "..."}`
// pairs. Internally they are plain enums; the label table lives next to each
// variant and is only used for the wire form and display.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use super::object::object_types;

/// Wire form of a dropdown value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectValue {
    pub key: String,
    pub value: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectRepr {
    Tagged { key: String },
    Bare(String),
}

/// Metadata dropdown holding a key outside its option table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: unknown option {key}")]
pub struct InvalidSelect {
    pub field: String,
    pub key: String,
}

/// Common surface of the dropdown enums
pub trait SelectOption: Copy {
    fn from_key(key: &str) -> Option<Self>;
    fn to_select(self) -> SelectValue;
}

impl SelectRepr {
    fn into_key(self) -> String {
        match self {
            SelectRepr::Tagged { key } => key,
            SelectRepr::Bare(key) => key,
        }
    }
}

macro_rules! select_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($key:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn key(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn to_select(self) -> SelectValue {
                SelectValue {
                    key: self.key().to_string(),
                    value: self.label().to_string(),
                }
            }
        }

        impl SelectOption for $name {
            fn from_key(key: &str) -> Option<Self> {
                $name::from_key(key)
            }

            fn to_select(self) -> SelectValue {
                $name::to_select(self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.to_select().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let key = SelectRepr::deserialize(deserializer)?.into_key();
                Self::from_key(&key)
                    .ok_or_else(|| de::Error::unknown_variant(&key, &[$($key),+]))
            }
        }
    };
}

select_enum! {
    pub enum EpisodeStatus {
        Draft => ("draft", "Draft"),
        Recording => ("recording", "Recording"),
        Editing => ("editing", "Editing"),
        Review => ("review", "Review"),
        Published => ("published", "Published"),
    }
}

select_enum! {
    pub enum ParticipantRole {
        Host => ("host", "Host"),
        Cohost => ("cohost", "Co-host"),
        Guest => ("guest", "Guest"),
        Producer => ("producer", "Producer"),
    }
}

select_enum! {
    /// Lifecycle of a recording session record
    pub enum SessionStatus {
        Scheduled => ("scheduled", "Scheduled"),
        Live => ("live", "Live"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

select_enum! {
    pub enum RecordingQuality {
        Standard => ("standard", "Standard"),
        High => ("high", "High"),
        Broadcast => ("broadcast", "Broadcast"),
    }
}

select_enum! {
    pub enum ClipType {
        Intro => ("intro", "Intro"),
        Content => ("content", "Content"),
        Outro => ("outro", "Outro"),
        Ad => ("ad", "Ad"),
        Transition => ("transition", "Transition"),
        Music => ("music", "Music"),
    }
}

select_enum! {
    pub enum ApprovalStatus {
        Pending => ("pending", "Pending"),
        Approved => ("approved", "Approved"),
        NeedsWork => ("needs_work", "Needs Work"),
        Rejected => ("rejected", "Rejected"),
    }
}

select_enum! {
    pub enum SponsorPlacement {
        PreRoll => ("pre_roll", "Pre-roll"),
        MidRoll => ("mid_roll", "Mid-roll"),
        PostRoll => ("post_roll", "Post-roll"),
    }
}

/// Rewrite the dropdown fields of an object's metadata as `{key, value}` pairs
///
/// Bare keys and pairs are both accepted; null or absent fields are left alone.
pub fn normalize_selects(
    object_type: &str,
    metadata: &mut Map<String, Value>,
) -> Result<(), InvalidSelect> {
    match object_type {
        object_types::EPISODES => normalize::<EpisodeStatus>(metadata, "status"),
        object_types::PARTICIPANTS => normalize::<ParticipantRole>(metadata, "role"),
        object_types::RECORDING_SESSIONS => {
            normalize::<SessionStatus>(metadata, "status")?;
            normalize::<RecordingQuality>(metadata, "recording_quality")
        }
        object_types::AUDIO_CLIPS => normalize::<ClipType>(metadata, "clip_type"),
        object_types::QUALITY_CHECKS => normalize::<ApprovalStatus>(metadata, "approval_status"),
        object_types::SPONSOR_SEGMENTS => normalize::<SponsorPlacement>(metadata, "placement"),
        _ => Ok(()),
    }
}

fn normalize<T: SelectOption>(
    metadata: &mut Map<String, Value>,
    field: &str,
) -> Result<(), InvalidSelect> {
    let Some(raw) = metadata.get(field).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let key = match SelectRepr::deserialize(raw.clone()) {
        Ok(repr) => repr.into_key(),
        Err(_) => raw.to_string(),
    };
    let option = T::from_key(&key).ok_or_else(|| InvalidSelect {
        field: field.to_string(),
        key,
    })?;

    let select = option.to_select();
    let mut pair = Map::new();
    pair.insert("key".to_string(), Value::String(select.key));
    pair.insert("value".to_string(), Value::String(select.value));
    metadata.insert(field.to_string(), Value::Object(pair));
    Ok(())
}
