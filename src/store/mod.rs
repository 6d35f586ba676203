//! Object store boundary
//!
//! Sessions, clips and uploaded media live in a hosted headless CMS bucket.
//! The service only needs a handful of operations, captured by `ObjectStore`:
//! - `find` / `find_one` for reads (projected to id, title, slug, metadata)
//! - `insert` and `update_metadata` for writes
//! - `insert_media` for binary uploads
//!
//! `CosmicStore` talks to the hosted REST API; `MemoryStore` keeps everything
//! in-process and is used when no bucket is configured.

mod cosmic;
mod error;
mod memory;

pub use cosmic::CosmicStore;
pub use error::StoreError;
pub use memory::MemoryStore;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{CosmicObject, NewObject};

/// How to locate a single object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKey {
    Id(String),
    Slug { object_type: String, slug: String },
}

impl ObjectKey {
    pub fn id(id: impl Into<String>) -> Self {
        ObjectKey::Id(id.into())
    }

    pub fn slug(object_type: impl Into<String>, slug: impl Into<String>) -> Self {
        ObjectKey::Slug {
            object_type: object_type.into(),
            slug: slug.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKey::Id(id) => write!(f, "id {}", id),
            ObjectKey::Slug { object_type, slug } => write!(f, "{} '{}'", object_type, slug),
        }
    }
}

/// Binary upload request
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    pub folder: Option<String>,
}

/// Uploaded media descriptor as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub original_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgix_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// All objects of a type; an empty or missing type yields no objects
    async fn find(&self, object_type: &str) -> Result<Vec<CosmicObject>, StoreError>;

    async fn find_one(&self, key: &ObjectKey) -> Result<CosmicObject, StoreError>;

    async fn insert(&self, object: NewObject) -> Result<CosmicObject, StoreError>;

    /// Merge `patch` into the object's metadata; keys not in `patch` are kept
    async fn update_metadata(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<CosmicObject, StoreError>;

    async fn insert_media(&self, media: NewMedia) -> Result<Media, StoreError>;
}
