//! Places filter.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::feature::Feature;
use crate::field::{Field, FieldKind};
use crate::source::PlacesService;
use crate::status::{FetchState, Status};

use super::{FetchContext, Filter, FilterCore, BOUNDS_FIELD};

#[derive(Default)]
struct Progress {
    done: AtomicUsize,
    total: AtomicUsize,
}

/// Fetches place features of the selected types for the shared bounds.
///
/// The upstream places API answers one type per request, so the filter
/// issues one sub-fetch per selected type, sequentially to stay inside
/// upstream rate limits. A type whose sub-fetch fails is skipped; the
/// filter still finishes successfully with whatever the other types
/// produced, tallying the skips in its status message.
pub struct PlacesFilter {
    core: FilterCore,
    service: Arc<dyn PlacesService>,
    progress: Arc<Progress>,
}

impl PlacesFilter {
    pub const NAME: &'static str = "places";
    /// Private field holding the selected place types.
    pub const TYPES_FIELD: &'static str = "place_types";

    pub fn new(service: Arc<dyn PlacesService>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(
            Self::TYPES_FIELD.to_string(),
            Field::new(FieldKind::PlaceTypes),
        );
        Self {
            core: FilterCore::with_fields(Self::NAME, fields),
            service,
            progress: Arc::new(Progress::default()),
        }
    }

    fn annotate(features: Vec<Feature>, place_type: &str) -> Vec<Feature> {
        features
            .into_iter()
            .map(|f| f.with_property("place_type", json!(place_type)))
            .collect()
    }
}

#[async_trait]
impl Filter for PlacesFilter {
    fn core(&self) -> &FilterCore {
        &self.core
    }

    async fn fetch(&self, ctx: FetchContext) -> bool {
        let bounds = match ctx.fields.bounding_box(BOUNDS_FIELD).await {
            Some(bounds) => bounds,
            None => {
                warn!(filter = Self::NAME, "no bounds field, nothing to fetch");
                self.core.fail("Places need a rectangular bounds value");
                return false;
            }
        };
        let types = self
            .fields()
            .string_list(Self::TYPES_FIELD)
            .await
            .unwrap_or_default();
        if types.is_empty() {
            debug!(filter = Self::NAME, "no place types selected");
            return false;
        }

        self.progress.total.store(types.len(), Ordering::Relaxed);
        self.progress.done.store(0, Ordering::Relaxed);

        let core = self.core.clone();
        let service = Arc::clone(&self.service);
        let progress = Arc::clone(&self.progress);
        tokio::spawn(async move {
            let mut found = 0usize;
            let mut skipped: Vec<String> = Vec::new();
            for place_type in &types {
                match service.places_in(&bounds, place_type).await {
                    Ok(features) => {
                        found += features.len();
                        core.extend_results(Self::annotate(features, place_type));
                    }
                    Err(e) => {
                        warn!(
                            filter = PlacesFilter::NAME,
                            place_type = place_type.as_str(),
                            error = %e,
                            "place type skipped"
                        );
                        skipped.push(place_type.clone());
                    }
                }
                progress.done.fetch_add(1, Ordering::Relaxed);
                ctx.step_done();
            }

            let mut message = format!("Found {found} places");
            if !skipped.is_empty() {
                message.push_str(&format!(" ({} skipped)", skipped.join(", ")));
            }
            core.succeed(message);
            ctx.step_done();
        });
        true
    }

    fn status(&self) -> Status {
        let raw = self.core.raw_status();
        if raw.state != FetchState::Running {
            return raw;
        }
        let done = self.progress.done.load(Ordering::Relaxed);
        let total = self.progress.total.load(Ordering::Relaxed).max(1);
        Status::running(
            done as f32 / total as f32,
            format!("Fetched {done} of {total} place types"),
        )
    }
}
