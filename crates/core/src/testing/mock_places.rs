//! Mock places service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::feature::Feature;
use crate::field::BoundingBox;
use crate::source::{PlacesService, SourceError};

/// A recorded places call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPlacesCall {
    pub bounds: BoundingBox,
    pub place_type: String,
}

/// Mock implementation of the [`PlacesService`] trait.
///
/// Answers per place type: configured types return their features,
/// failing types return a rejection, anything else returns no features.
/// Every call is recorded for assertions.
#[derive(Default)]
pub struct MockPlacesService {
    /// Features keyed by place type.
    features: RwLock<HashMap<String, Vec<Feature>>>,
    /// Place types whose calls fail.
    failing: RwLock<HashSet<String>>,
    /// Simulated endpoint latency, applied per call.
    delay: RwLock<Option<Duration>>,
    /// Recorded calls in order.
    calls: RwLock<Vec<RecordedPlacesCall>>,
}

impl MockPlacesService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn respond(&self, place_type: &str, features: Vec<Feature>) {
        self.features
            .write()
            .await
            .insert(place_type.to_string(), features);
    }

    /// Make calls for this place type fail.
    pub async fn fail_type(&self, place_type: &str) {
        self.failing.write().await.insert(place_type.to_string());
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Every call made so far, in order.
    pub async fn recorded_calls(&self) -> Vec<RecordedPlacesCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl PlacesService for MockPlacesService {
    async fn places_in(
        &self,
        bounds: &BoundingBox,
        place_type: &str,
    ) -> Result<Vec<Feature>, SourceError> {
        self.calls.write().await.push(RecordedPlacesCall {
            bounds: *bounds,
            place_type: place_type.to_string(),
        });
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(place_type) {
            return Err(SourceError::Rejected(format!(
                "no data for type {place_type}"
            )));
        }
        Ok(self
            .features
            .read()
            .await
            .get(place_type)
            .cloned()
            .unwrap_or_default())
    }
}
