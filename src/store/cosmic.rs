use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use super::{Media, NewMedia, ObjectKey, ObjectStore, StoreError};
use crate::model::{CosmicObject, NewObject};

const API_URL: &str = "https://api.cosmicjs.com/v3";
const WORKERS_URL: &str = "https://workers.cosmicjs.com/v3";
const PROPS: &str = "id,title,slug,metadata";

#[derive(Deserialize)]
struct ObjectsResponse {
    #[serde(default)]
    objects: Vec<CosmicObject>,
}

#[derive(Deserialize)]
struct ObjectResponse {
    object: CosmicObject,
}

#[derive(Deserialize)]
struct MediaResponse {
    media: Media,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// REST client for a hosted bucket
pub struct CosmicStore {
    client: Client,
    bucket_slug: String,
    read_key: String,
    write_key: Option<String>,
    api_url: String,
    workers_url: String,
}

impl CosmicStore {
    pub fn new(
        bucket_slug: impl Into<String>,
        read_key: impl Into<String>,
        write_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            bucket_slug: bucket_slug.into(),
            read_key: read_key.into(),
            write_key: write_key.filter(|k| !k.is_empty()),
            api_url: API_URL.to_string(),
            workers_url: WORKERS_URL.to_string(),
        }
    }

    /// Point the client at other API hosts (self-hosted or staging buckets)
    pub fn with_endpoints(mut self, api_url: impl Into<String>, workers_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.workers_url = workers_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket_slug(&self) -> &str {
        &self.bucket_slug
    }

    fn objects_url(&self) -> String {
        format!("{}/buckets/{}/objects", self.api_url, self.bucket_slug)
    }

    fn media_url(&self) -> String {
        format!("{}/buckets/{}/media", self.workers_url, self.bucket_slug)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let key = self.write_key.as_ref().ok_or(StoreError::MissingWriteKey)?;
        Ok(request.bearer_auth(key))
    }

    async fn query(&self, query: Value, limit: Option<u32>) -> Result<Vec<CosmicObject>, StoreError> {
        let query = serde_json::to_string(&query)?;
        let mut params = vec![
            ("read_key", self.read_key.clone()),
            ("query", query),
            ("props", PROPS.to_string()),
            ("depth", "1".to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }

        let response = self
            .client
            .get(self.objects_url())
            .query(&params)
            .send()
            .await?;

        // The API answers 404 when nothing matches
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let body: ObjectsResponse = read_json(response).await?;
        Ok(body.objects)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if status.is_success() {
        let text = response.text().await?;
        return Ok(serde_json::from_str(&text)?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    error!("Object store API error ({}): {}", status.as_u16(), message);

    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait::async_trait]
impl ObjectStore for CosmicStore {
    fn name(&self) -> &'static str {
        "cosmic"
    }

    async fn find(&self, object_type: &str) -> Result<Vec<CosmicObject>, StoreError> {
        let objects = self.query(json!({ "type": object_type }), None).await?;
        debug!("Fetched {} {} objects", objects.len(), object_type);
        Ok(objects)
    }

    async fn find_one(&self, key: &ObjectKey) -> Result<CosmicObject, StoreError> {
        let query = match key {
            ObjectKey::Id(id) => json!({ "id": id }),
            ObjectKey::Slug { object_type, slug } => json!({ "type": object_type, "slug": slug }),
        };

        self.query(query, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn insert(&self, object: NewObject) -> Result<CosmicObject, StoreError> {
        let request = self.authorized(self.client.post(self.objects_url()))?;
        let response = request.json(&object).send().await?;
        let body: ObjectResponse = read_json(response).await?;

        info!("Created {} object {}", object.object_type, body.object.id);
        Ok(body.object)
    }

    async fn update_metadata(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<CosmicObject, StoreError> {
        let url = format!("{}/{}", self.objects_url(), id);
        let request = self.authorized(self.client.patch(url))?;
        let response = request
            .json(&json!({ "metadata": patch }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }

        let body: ObjectResponse = read_json(response).await?;
        Ok(body.object)
    }

    async fn insert_media(&self, media: NewMedia) -> Result<Media, StoreError> {
        let size = media.data.len();
        let part = Part::bytes(media.data.to_vec())
            .file_name(media.file_name.clone())
            .mime_str(&media.content_type)?;

        let mut form = Form::new().part("media", part);
        if let Some(folder) = media.folder {
            form = form.text("folder", folder);
        }

        info!("Uploading media {} ({} bytes)", media.file_name, size);

        let request = self.authorized(self.client.post(self.media_url()))?;
        let response = request.multipart(form).send().await?;
        let body: MediaResponse = read_json(response).await?;
        Ok(body.media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_endpoints() {
        let store = CosmicStore::new("podcast", "r", None)
            .with_endpoints("http://localhost:9000/v3/", "http://localhost:9001/v3");
        assert_eq!(
            store.objects_url(),
            "http://localhost:9000/v3/buckets/podcast/objects"
        );
        assert_eq!(store.media_url(), "http://localhost:9001/v3/buckets/podcast/media");
    }

    #[tokio::test]
    async fn test_writes_require_write_key() {
        let store = CosmicStore::new("podcast", "r", Some(String::new()));
        let err = store
            .insert_media(NewMedia {
                file_name: "recording.wav".to_string(),
                content_type: "audio/wav".to_string(),
                data: Bytes::from_static(b"RIFF"),
                folder: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingWriteKey));
    }
}
