use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Boundary endpoint (omit to leave the boundary filter unwired).
    #[serde(default)]
    pub boundary: Option<BoundaryServiceConfig>,
    /// Places endpoint (omit to leave the places filter unwired).
    #[serde(default)]
    pub places: Option<PlacesServiceConfig>,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Boundary endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoundaryServiceConfig {
    /// Endpoint URL serving locality boundary features.
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Places endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlacesServiceConfig {
    /// Endpoint URL serving place features, one type per request.
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Default session caps used when a caller does not pick its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Maximum simultaneously fetching filters (0 = unlimited).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum features before a session exits early (0 = unlimited).
    /// Checked at filter completion boundaries, so the final count may
    /// overshoot by one filter's results.
    #[serde(default)]
    pub feature_limit: usize,
}

fn default_timeout() -> u32 {
    30
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            feature_limit: 0,
        }
    }
}
