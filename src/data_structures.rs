use crate::config::AppConfig;
use axum::extract::FromRef;
use ganttlab::services::Workbook;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

// --- Uploaded Workbooks ---

/// A parsed upload kept around so the researcher can switch sheets without
/// sending the file again.
#[derive(Clone, Debug)]
pub struct StoredUpload {
    pub filename: String,
    pub workbook: Arc<Workbook>,
    pub stored_at: Instant,
}

impl StoredUpload {
    pub fn new(filename: String, workbook: Workbook) -> Self {
        Self {
            filename,
            workbook: Arc::new(workbook),
            stored_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

// --- Type Aliases for Shared State ---

pub type UploadStore = HashMap<Uuid, StoredUpload>;
pub type SharedUploads = Arc<Mutex<UploadStore>>;
pub type SharedConfig = Arc<AppConfig>;

#[derive(Clone)]
pub struct AppState {
    pub uploads: SharedUploads,
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            uploads: Arc::new(Mutex::new(UploadStore::new())),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for SharedUploads {
    fn from_ref(app_state: &AppState) -> SharedUploads {
        app_state.uploads.clone()
    }
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

// --- Upload Store Utility Functions ---

/// Store an upload under a fresh id, evicting the oldest entries while the
/// store is at capacity.
pub fn insert_upload(store: &mut UploadStore, upload: StoredUpload, capacity: usize) -> Uuid {
    while store.len() >= capacity.max(1) {
        let oldest = store
            .iter()
            .min_by_key(|(_, stored)| stored.stored_at)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                store.remove(&id);
                tracing::debug!(%id, "Evicted oldest upload to make room");
            }
            None => break,
        }
    }

    let id = Uuid::new_v4();
    store.insert(id, upload);
    id
}

/// Drop uploads older than `ttl`. Returns how many were removed.
pub fn evict_expired(store: &mut UploadStore, ttl: Duration, now: Instant) -> usize {
    let before = store.len();
    store.retain(|_, upload| !upload.is_expired(ttl, now));
    before - store.len()
}
