//! External data-fetch collaborators.
//!
//! The engine itself performs no network I/O and parses no wire format.
//! Filters delegate to these traits and only require the collaborator to
//! ultimately resolve to a sequence of [`Feature`]s or a failure. Caching
//! of upstream records (so repeated bounding-box queries don't re-hit a
//! rate-limited API) is the collaborator's concern, behind the endpoint.

mod http;

pub use http::{HttpBoundaryService, HttpPlacesService};

use async_trait::async_trait;
use thiserror::Error;

use crate::feature::Feature;
use crate::field::BoundingBox;

/// Errors produced by data-fetch collaborators.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Could not reach the remote endpoint.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint did not answer in time.
    #[error("request timeout")]
    Timeout,

    /// Transport-level failure (non-2xx response).
    #[error("endpoint returned HTTP {0}")]
    Api(u16),

    /// Well-formed response reporting an unsuccessful operation.
    #[error("endpoint rejected the request: {0}")]
    Rejected(String),

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Locality boundary lookup.
#[async_trait]
pub trait BoundaryService: Send + Sync {
    /// Boundary features within, or overlapping, `bounds`.
    async fn boundaries_in(&self, bounds: &BoundingBox) -> Result<Vec<Feature>, SourceError>;
}

/// Places lookup over an external, rate-limited API, one call per type.
#[async_trait]
pub trait PlacesService: Send + Sync {
    /// Place features of one type within `bounds`.
    async fn places_in(
        &self,
        bounds: &BoundingBox,
        place_type: &str,
    ) -> Result<Vec<Feature>, SourceError>;
}
