//! Testing utilities and mock implementations.
//!
//! Mock services stand in for the HTTP endpoints, and
//! [`ScriptedFilter`] exercises the fetch scheduler without any service
//! at all.

mod mock_boundary;
mod mock_places;
mod scripted;

pub use mock_boundary::MockBoundaryService;
pub use mock_places::{MockPlacesService, RecordedPlacesCall};
pub use scripted::{ConcurrencyGauge, ScriptedFetch, ScriptedFilter};

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::feature::Feature;
    use crate::field::BoundingBox;

    /// A point feature with a `name` property.
    pub fn point_feature(name: &str, lat: f64, lng: f64) -> Feature {
        Feature::new(json!({ "type": "Point", "coordinates": [lng, lat] }))
            .with_property("name", json!(name))
    }

    /// `count` distinct point features.
    pub fn point_features(count: usize) -> Vec<Feature> {
        (0..count)
            .map(|i| point_feature(&format!("point-{i}"), -27.0 - i as f64 * 0.01, 153.0))
            .collect()
    }

    /// A bounding box around inner Brisbane.
    pub fn brisbane_bounds() -> BoundingBox {
        BoundingBox {
            top_left_lat: -27.38,
            top_left_lng: 152.95,
            bottom_right_lat: -27.55,
            bottom_right_lng: 153.12,
        }
    }

    /// [`brisbane_bounds`] as a JSON field value.
    pub fn brisbane_bounds_value() -> Value {
        json!({
            "top_left_lat": -27.38,
            "top_left_lng": 152.95,
            "bottom_right_lat": -27.55,
            "bottom_right_lng": 153.12,
        })
    }
}
