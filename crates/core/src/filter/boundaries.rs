//! Locality boundary filter.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::feature::Feature;
use crate::source::BoundaryService;
use crate::status::FetchState;

use super::{FetchContext, Filter, FilterCore, BOUNDS_FIELD};

/// Fetches locality boundary features for the shared bounds.
///
/// Boundary geometry is static, so before hitting the service this
/// filter looks back through prior runs: when an earlier run fetched
/// boundaries for the exact same bounds, its results are served again
/// without a network round trip.
pub struct BoundaryFilter {
    core: FilterCore,
    service: Arc<dyn BoundaryService>,
}

impl BoundaryFilter {
    pub const NAME: &'static str = "locality_boundaries";

    pub fn new(service: Arc<dyn BoundaryService>) -> Self {
        Self {
            core: FilterCore::new(Self::NAME),
            service,
        }
    }

    /// Results from the most recent prior run that fetched boundaries
    /// for the same bounds value and finished successfully.
    async fn reusable(&self, ctx: &FetchContext, bounds_value: &serde_json::Value) -> Option<Vec<Feature>> {
        for prior in ctx.prior.iter().rev() {
            let filter = match prior.filter(Self::NAME) {
                Some(filter) => filter,
                None => continue,
            };
            if filter.status().state != FetchState::Success {
                continue;
            }
            if prior.fields().value(BOUNDS_FIELD).await.as_ref() != Some(bounds_value) {
                continue;
            }
            return Some(filter.results());
        }
        None
    }
}

#[async_trait]
impl Filter for BoundaryFilter {
    fn core(&self) -> &FilterCore {
        &self.core
    }

    async fn fetch(&self, ctx: FetchContext) -> bool {
        let bounds_value = match ctx.fields.value(BOUNDS_FIELD).await {
            Some(value) => value,
            None => {
                warn!(filter = Self::NAME, "no bounds field, nothing to fetch");
                self.core.fail("Locality boundaries need a bounds field");
                return false;
            }
        };
        let bounds = match ctx.fields.bounding_box(BOUNDS_FIELD).await {
            Some(bounds) => bounds,
            None => {
                self.core.fail("Locality boundaries need a rectangular bounds value");
                return false;
            }
        };

        if let Some(features) = self.reusable(&ctx, &bounds_value).await {
            debug!(
                filter = Self::NAME,
                count = features.len(),
                "reusing boundaries from a prior run"
            );
            let count = features.len();
            self.core.set_results(features);
            self.core
                .succeed(format!("Reused {count} locality boundaries"));
            return false;
        }

        let core = self.core.clone();
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            match service.boundaries_in(&bounds).await {
                Ok(features) => {
                    let count = features.len();
                    debug!(filter = BoundaryFilter::NAME, count, "boundaries fetched");
                    core.set_results(features);
                    core.succeed(format!("Found {count} locality boundaries"));
                }
                Err(e) => {
                    warn!(filter = BoundaryFilter::NAME, error = %e, "boundary fetch failed");
                    core.fail(format!("Locality boundaries fetch failed: {e}"));
                }
            }
            ctx.step_done();
        });
        true
    }
}
