//! Mock boundary service for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::feature::Feature;
use crate::field::BoundingBox;
use crate::source::{BoundaryService, SourceError};

/// Mock implementation of the [`BoundaryService`] trait.
///
/// Returns configurable features, records the bounds of every call for
/// assertions, and can simulate failures and slow endpoints.
#[derive(Default)]
pub struct MockBoundaryService {
    /// Configured features to return.
    features: RwLock<Vec<Feature>>,
    /// If set, every call fails with a rejection carrying this message.
    error: RwLock<Option<String>>,
    /// Simulated endpoint latency.
    delay: RwLock<Option<Duration>>,
    /// Recorded call bounds.
    calls: RwLock<Vec<BoundingBox>>,
}

impl MockBoundaryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A mock answering every call with these features.
    pub fn with_features(features: Vec<Feature>) -> Arc<Self> {
        Arc::new(Self {
            features: RwLock::new(features),
            ..Self::default()
        })
    }

    /// A mock failing every call with this message.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            error: RwLock::new(Some(message.to_string())),
            ..Self::default()
        })
    }

    pub async fn set_features(&self, features: Vec<Feature>) {
        *self.features.write().await = features;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Bounds of every call made so far.
    pub async fn recorded_calls(&self) -> Vec<BoundingBox> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl BoundaryService for MockBoundaryService {
    async fn boundaries_in(&self, bounds: &BoundingBox) -> Result<Vec<Feature>, SourceError> {
        self.calls.write().await.push(*bounds);
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.error.read().await.clone() {
            return Err(SourceError::Rejected(message));
        }
        Ok(self.features.read().await.clone())
    }
}
