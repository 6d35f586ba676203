use crate::recording::{AudioInput, Recorder, RecorderOptions};
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,

    /// Input device new recorders acquire
    pub input: Arc<dyn AudioInput>,

    pub options: RecorderOptions,

    /// Server-side recorders (session_id → recorder)
    pub recorders: Arc<RwLock<HashMap<String, Arc<Recorder>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        input: Arc<dyn AudioInput>,
        options: RecorderOptions,
    ) -> Self {
        Self {
            store,
            input,
            options,
            recorders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn recorder(&self, session_id: &str) -> Option<Arc<Recorder>> {
        self.recorders.read().await.get(session_id).cloned()
    }
}
