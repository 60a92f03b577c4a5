//! In-memory object store and run-state builders for pipeline tests

use async_trait::async_trait;
use bucket_watermark::{
    app_state::AppState,
    config::PipelineSettings,
    services::{
        compositor::Placement,
        storage::{ObjectInfo, ObjectStore, StorageError},
        watermark_source::WatermarkPair,
    },
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::fixtures;

/// An uploaded object as seen by the store.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Bucket held in memory, with per-key failure injection.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<BTreeMap<String, Upload>>,
    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
    fail_list: bool,
    get_delay: Option<Duration>,
    gets: Mutex<Vec<String>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self
    }

    pub fn failing_get(mut self, key: &str) -> Self {
        self.fail_get.insert(key.to_string());
        self
    }

    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_put.insert(key.to_string());
        self
    }

    /// Make every `get` stall for `delay` before answering.
    pub fn slow_get(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn uploads(&self) -> BTreeMap<String, Upload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Keys passed to `get`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "memory"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        if self.fail_list {
            return Err(StorageError::Status {
                key: prefix.to_string(),
                code: 403,
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.gets.lock().unwrap().push(key.to_string());
        match self.get_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        if self.fail_get.contains(key) {
            return Err(StorageError::Status {
                key: key.to_string(),
                code: 500,
            });
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.contains(key) {
            return Err(StorageError::Status {
                key: key.to_string(),
                code: 507,
            });
        }
        let data = tokio::fs::read(path).await?;
        self.uploads.lock().unwrap().insert(
            key.to_string(),
            Upload {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

pub fn settings(workers: usize, temp_dir: Option<PathBuf>) -> PipelineSettings {
    PipelineSettings {
        source_prefix: "raw/".to_string(),
        target_prefix: "marked/".to_string(),
        placement: Placement {
            max_height: 100,
            padding: 20,
        },
        workers,
        jpeg_quality: 90,
        temp_dir,
    }
}

/// Red 50x100 watermark on the left, blue 120x300 (scaled to 40x100) on the right.
pub fn watermarks() -> Arc<WatermarkPair> {
    Arc::new(WatermarkPair {
        left: fixtures::watermark(50, 100, fixtures::RED),
        right: fixtures::watermark(120, 300, fixtures::BLUE),
    })
}

pub fn state(store: Arc<MemoryStore>, settings: PipelineSettings) -> AppState {
    AppState::new(store, watermarks(), settings)
}
