use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Media, NewMedia, ObjectKey, ObjectStore, StoreError};
use crate::model::{slugify, CosmicObject, NewObject};

#[derive(Default)]
struct Inner {
    objects: Vec<CosmicObject>,
    media: Vec<Media>,
    blobs: HashMap<String, Bytes>,
}

/// In-process object store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with objects
    pub fn with_objects(objects: Vec<CosmicObject>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                objects,
                ..Inner::default()
            }),
        }
    }

    pub async fn media(&self) -> Vec<Media> {
        self.inner.read().await.media.clone()
    }

    /// Bytes uploaded for a media id
    pub async fn media_data(&self, id: &str) -> Option<Bytes> {
        self.inner.read().await.blobs.get(id).cloned()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, object_type: &str) -> Result<Vec<CosmicObject>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .objects
            .iter()
            .filter(|o| o.object_type == object_type)
            .cloned()
            .collect())
    }

    async fn find_one(&self, key: &ObjectKey) -> Result<CosmicObject, StoreError> {
        let inner = self.inner.read().await;
        inner
            .objects
            .iter()
            .find(|o| match key {
                ObjectKey::Id(id) => &o.id == id,
                ObjectKey::Slug { object_type, slug } => {
                    &o.object_type == object_type && &o.slug == slug
                }
            })
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn insert(&self, object: NewObject) -> Result<CosmicObject, StoreError> {
        let now = Utc::now();
        let created = CosmicObject {
            id: uuid::Uuid::new_v4().simple().to_string(),
            slug: slugify(&object.title),
            title: object.title,
            content: None,
            object_type: object.object_type,
            metadata: object.metadata,
            created_at: Some(now),
            modified_at: Some(now),
            status: Some("published".to_string()),
        };

        debug!("memory store: inserted {} {}", created.object_type, created.id);
        self.inner.write().await.objects.push(created.clone());
        Ok(created)
    }

    async fn update_metadata(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<CosmicObject, StoreError> {
        let mut inner = self.inner.write().await;
        let object = inner
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("id {}", id)))?;

        for (key, value) in patch {
            object.metadata.insert(key, value);
        }
        object.modified_at = Some(Utc::now());
        Ok(object.clone())
    }

    async fn insert_media(&self, media: NewMedia) -> Result<Media, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", id, media.file_name);
        let stored = Media {
            id: id.clone(),
            url: format!("memory://media/{}", name),
            name,
            original_name: media.file_name,
            imgix_url: None,
            folder: media.folder,
            content_type: media.content_type,
            size: media.data.len() as u64,
        };

        let mut inner = self.inner.write().await;
        inner.blobs.insert(id, media.data);
        inner.media.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_object(title: &str, object_type: &str, metadata: Value) -> NewObject {
        NewObject {
            title: title.to_string(),
            object_type: object_type.to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_update_metadata_merges_keys() {
        let store = MemoryStore::new();
        let created = store
            .insert(new_object(
                "Session",
                "recording-sessions",
                json!({"session_date": "2025-01-02", "status": "scheduled"}),
            ))
            .await
            .unwrap();

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!({"key": "live", "value": "Live"}));
        let updated = store.update_metadata(&created.id, patch).await.unwrap();

        assert_eq!(updated.metadata["session_date"], json!("2025-01-02"));
        assert_eq!(updated.metadata["status"]["key"], json!("live"));
    }

    #[tokio::test]
    async fn test_find_one_by_slug_and_missing_id() {
        let store = MemoryStore::new();
        store
            .insert(new_object("Pilot Episode", "episodes", json!({})))
            .await
            .unwrap();

        let found = store
            .find_one(&ObjectKey::slug("episodes", "pilot-episode"))
            .await
            .unwrap();
        assert_eq!(found.title, "Pilot Episode");

        let err = store.find_one(&ObjectKey::id("nope")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find("participants").await.unwrap().is_empty());
    }
}
