//! HTTP implementations of the data-fetch collaborators.
//!
//! Both endpoints answer with the same envelope: `result` carries the
//! feature array on success and the error message otherwise.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{BoundaryServiceConfig, PlacesServiceConfig};
use crate::feature::Feature;
use crate::field::BoundingBox;

use super::{BoundaryService, PlacesService, SourceError};

/// Response envelope shared by the filter endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    result: Value,
}

impl Envelope {
    fn into_features(self) -> Result<Vec<Feature>, SourceError> {
        if self.status == "success" {
            serde_json::from_value(self.result).map_err(|e| SourceError::Decode(e.to_string()))
        } else {
            let message = self.result.as_str().unwrap_or("(no message)").to_string();
            Err(SourceError::Rejected(message))
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::ConnectionFailed(e.to_string())
    }
}

async fn fetch_envelope(client: &Client, url: &str) -> Result<Vec<Feature>, SourceError> {
    debug!(url, "querying filter endpoint");

    let response = client.get(url).send().await.map_err(classify_send_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Api(status.as_u16()));
    }

    let envelope: Envelope = response
        .json()
        .await
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    envelope.into_features()
}

fn bounds_params(bounds: &BoundingBox) -> String {
    format!(
        "top_left_lat={}&top_left_lng={}&bottom_right_lat={}&bottom_right_lng={}",
        bounds.top_left_lat, bounds.top_left_lng, bounds.bottom_right_lat, bounds.bottom_right_lng
    )
}

fn build_client(timeout_secs: u32) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs as u64))
        .build()
        .expect("Failed to create HTTP client")
}

/// Boundary lookup against the configured HTTP endpoint.
pub struct HttpBoundaryService {
    client: Client,
    config: BoundaryServiceConfig,
}

impl HttpBoundaryService {
    /// Create a new service with the given configuration.
    pub fn new(config: BoundaryServiceConfig) -> Self {
        let client = build_client(config.timeout_secs);
        Self { client, config }
    }

    fn build_url(&self, bounds: &BoundingBox) -> String {
        format!(
            "{}?{}",
            self.config.url.trim_end_matches('/'),
            bounds_params(bounds)
        )
    }
}

#[async_trait]
impl BoundaryService for HttpBoundaryService {
    async fn boundaries_in(&self, bounds: &BoundingBox) -> Result<Vec<Feature>, SourceError> {
        fetch_envelope(&self.client, &self.build_url(bounds)).await
    }
}

/// Places lookup against the configured HTTP endpoint.
pub struct HttpPlacesService {
    client: Client,
    config: PlacesServiceConfig,
}

impl HttpPlacesService {
    /// Create a new service with the given configuration.
    pub fn new(config: PlacesServiceConfig) -> Self {
        let client = build_client(config.timeout_secs);
        Self { client, config }
    }

    fn build_url(&self, bounds: &BoundingBox, place_type: &str) -> String {
        format!(
            "{}?{}&type={}",
            self.config.url.trim_end_matches('/'),
            bounds_params(bounds),
            urlencoding::encode(place_type)
        )
    }
}

#[async_trait]
impl PlacesService for HttpPlacesService {
    async fn places_in(
        &self,
        bounds: &BoundingBox,
        place_type: &str,
    ) -> Result<Vec<Feature>, SourceError> {
        fetch_envelope(&self.client, &self.build_url(bounds, place_type)).await
    }
}
