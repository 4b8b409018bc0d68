use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::AppError;
use crate::models::progress::IndexingProgress;
use crate::services::registry_service::Registry;

pub struct AppState {
    pub registry: Registry,
    pub config: Config,
    pub cancel_flag: Arc<AtomicBool>,
    pub indexing_status: Arc<Mutex<IndexingProgress>>,
}

impl AppState {
    pub fn new(registry: Registry, config: Config) -> Self {
        Self {
            registry,
            config,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            indexing_status: Arc::new(Mutex::new(IndexingProgress::idle())),
        }
    }

    /// Claims the indexing slot, failing if a run is already in flight.
    pub fn begin_indexing(&self) -> Result<Arc<AtomicBool>, AppError> {
        let mut status = self
            .indexing_status
            .lock()
            .map_err(|e| AppError::General(e.to_string()))?;
        if status.is_running() {
            return Err(AppError::General("indexing already in progress".to_string()));
        }
        status.begin_loading();
        self.cancel_flag.store(false, Ordering::Relaxed);
        Ok(self.cancel_flag.clone())
    }

    pub fn mark_cancelled(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn publish_progress(&self, progress: &IndexingProgress) {
        let mut guard = self
            .indexing_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = progress.clone();
    }

    pub fn current_progress(&self) -> IndexingProgress {
        self.indexing_status
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}
