use std::sync::Arc;

use crate::config::PipelineSettings;
use crate::services::{storage::ObjectStore, watermark_source::WatermarkPair};

/// Shared run state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub watermarks: Arc<WatermarkPair>,
    pub settings: Arc<PipelineSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        watermarks: Arc<WatermarkPair>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            watermarks,
            settings: Arc::new(settings),
        }
    }
}
