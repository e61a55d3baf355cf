//! # Prediction Storage
//!
//! Sink for finished predictions. Real storage backends are out of scope;
//! `DevNull` discards (optionally logging) and `Memory` keeps everything for
//! inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageConfig, StorageKind};
use crate::error::Result;
use crate::models::PredictionData;

#[async_trait]
pub trait PredictionStorageProvider: Send + Sync {
    async fn put_predictions(&self, prediction_data: &PredictionData) -> Result<()>;
}

pub fn build_storage(config: &StorageConfig) -> Arc<dyn PredictionStorageProvider> {
    match config.kind {
        StorageKind::DevNull => Arc::new(DevNullStorageProvider::new(config.do_log)),
        StorageKind::Memory => Arc::new(InMemoryStorageProvider::default()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DevNullStorageProvider {
    do_log: bool,
}

impl DevNullStorageProvider {
    pub fn new(do_log: bool) -> Self {
        Self { do_log }
    }
}

#[async_trait]
impl PredictionStorageProvider for DevNullStorageProvider {
    async fn put_predictions(&self, prediction_data: &PredictionData) -> Result<()> {
        if self.do_log {
            info!(prediction = %prediction_data, "Discarding prediction data");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorageProvider {
    stored: Mutex<Vec<PredictionData>>,
}

impl InMemoryStorageProvider {
    pub fn stored(&self) -> Vec<PredictionData> {
        self.stored.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.stored.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.lock().is_empty()
    }
}

#[async_trait]
impl PredictionStorageProvider for InMemoryStorageProvider {
    async fn put_predictions(&self, prediction_data: &PredictionData) -> Result<()> {
        self.stored.lock().push(prediction_data.clone());
        Ok(())
    }
}
