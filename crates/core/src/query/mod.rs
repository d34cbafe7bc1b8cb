//! The query surface: a set of filters over shared fields.
//!
//! A [`MapQuery`] bundles filters, the fields they share, and the fetch
//! scheduler. Callers mutate fields, enable filters, kick off a fetch
//! session and poll [`MapQuery::status`] until it turns terminal, then
//! read the combined features with [`MapQuery::map_features`].

mod session;

use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{Config, QueryConfig};
use crate::feature::Feature;
use crate::field::{Field, FieldKind, FieldSet, SetOutcome};
use crate::filter::{
    BoundaryFilter, Continuation, FetchContext, Filter, PlacesFilter, BOUNDS_FIELD,
};
use crate::source::{
    BoundaryService, HttpBoundaryService, HttpPlacesService, PlacesService,
};
use crate::status::{FetchState, Status};

use session::{PassOutcome, Session};

/// A queryable map view: shared fields plus a fixed set of filters.
///
/// The filter set and field names are fixed at build time; everything
/// else (values, enablement, results) changes over the query's life.
/// Queries are driven behind an `Arc` so fetch sessions can outlive the
/// calling scope.
pub struct MapQuery {
    fields: Arc<FieldSet>,
    filters: Vec<Arc<dyn Filter>>,
    fetching: AtomicBool,
}

impl MapQuery {
    pub fn builder() -> MapQueryBuilder {
        MapQueryBuilder::new()
    }

    /// The standard query: a bounds field, the boundary filter and the
    /// places filter.
    pub fn standard(
        boundary: Arc<dyn BoundaryService>,
        places: Arc<dyn PlacesService>,
    ) -> Self {
        Self::builder()
            .field(BOUNDS_FIELD, Field::new(FieldKind::BoundingBox))
            .filter(Arc::new(BoundaryFilter::new(boundary)))
            .filter(Arc::new(PlacesFilter::new(places)))
            .build()
    }

    /// The standard query wired to the HTTP endpoints named in `config`,
    /// skipping filters whose endpoint is not configured.
    pub fn from_config(config: &Config) -> Self {
        let mut builder =
            Self::builder().field(BOUNDS_FIELD, Field::new(FieldKind::BoundingBox));
        if let Some(boundary) = &config.boundary {
            let service = HttpBoundaryService::new(boundary.clone());
            builder = builder.filter(Arc::new(BoundaryFilter::new(Arc::new(service))));
        }
        if let Some(places) = &config.places {
            let service = HttpPlacesService::new(places.clone());
            builder = builder.filter(Arc::new(PlacesFilter::new(Arc::new(service))));
        }
        builder.build()
    }

    /// The fields shared by every filter in this query.
    pub fn fields(&self) -> &FieldSet {
        self.fields.as_ref()
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// The filter with this name, if the query has one.
    pub fn filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.iter().find(|f| f.name() == name).cloned()
    }

    /// Enable or disable the named filter. Returns false for an unknown
    /// name.
    pub fn enable(&self, name: &str, enabled: bool) -> bool {
        match self.filter(name) {
            Some(filter) => {
                filter.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Whether a fetch session is currently in progress.
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }

    /// Combined features of all enabled filters, boundary features
    /// first when the standard layout is used.
    pub fn map_features(&self) -> Vec<Feature> {
        self.filters
            .iter()
            .filter(|f| f.enabled())
            .flat_map(|f| f.results())
            .collect()
    }

    /// Number of features [`MapQuery::map_features`] would return.
    pub fn feature_count(&self) -> usize {
        self.filters
            .iter()
            .filter(|f| f.enabled())
            .map(|f| f.results_len())
            .sum()
    }

    /// Aggregate progress across the enabled filters.
    ///
    /// While fetching, completion is the mean of the filters'
    /// completions. Once the session ends the query reports success as
    /// long as at least one source succeeded (or none were enabled);
    /// failure messages are folded into the aggregate message either
    /// way, so partial failure stays visible.
    pub fn status(&self) -> Status {
        let statuses: Vec<Status> = self
            .filters
            .iter()
            .filter(|f| f.enabled())
            .map(|f| f.status())
            .collect();
        let total = statuses.len();
        let completed = statuses
            .iter()
            .filter(|s| s.state == FetchState::Success)
            .count();

        let mut message = format!("{completed} of {total} sources completed!");
        for status in &statuses {
            if status.state == FetchState::Failure && !status.message.is_empty() {
                message.push(' ');
                message.push_str(&status.message);
            }
        }

        if self.is_fetching() {
            let completion = if total == 0 {
                1.0
            } else {
                statuses.iter().map(|s| s.completion).sum::<f32>() / total as f32
            };
            Status::running(completion, message)
        } else if total > 0 && completed == 0 {
            Status::failure(message)
        } else {
            Status::success(message)
        }
    }

    /// Serialize the query's mutable state: shared field values plus,
    /// per enabled filter, its private field values. Disabled filters
    /// are omitted.
    pub async fn to_json(&self) -> Value {
        let mut filters = Map::new();
        for filter in &self.filters {
            if !filter.enabled() {
                continue;
            }
            filters.insert(
                filter.name().to_string(),
                json!({ "fields": filter.fields().to_value().await }),
            );
        }
        json!({
            "fields": self.fields.to_value().await,
            "filters": Value::Object(filters),
        })
    }

    /// Apply state serialized by [`MapQuery::to_json`].
    ///
    /// Restoring never fails as a whole: unknown names and rejected
    /// values are counted and skipped, and the rest of the snapshot
    /// still applies. Returns the number of skipped entries. Filters
    /// absent from the snapshot come out disabled.
    pub async fn from_json(&self, value: &Value) -> usize {
        let mut failures = 0;

        if let Some(fields) = value.get("fields").and_then(Value::as_object) {
            for (name, candidate) in fields {
                if self.fields.apply(name, candidate.clone()).await != SetOutcome::Updated {
                    debug!(field = name.as_str(), "skipping field from snapshot");
                    failures += 1;
                }
            }
        }

        for filter in &self.filters {
            filter.set_enabled(false);
        }
        if let Some(filters) = value.get("filters").and_then(Value::as_object) {
            for (name, entry) in filters {
                let Some(filter) = self.filter(name) else {
                    debug!(filter = name.as_str(), "skipping unknown filter from snapshot");
                    failures += 1;
                    continue;
                };
                filter.set_enabled(true);
                if let Some(fields) = entry.get("fields").and_then(Value::as_object) {
                    for (field, candidate) in fields {
                        if filter.fields().apply(field, candidate.clone()).await
                            != SetOutcome::Updated
                        {
                            debug!(
                                filter = name.as_str(),
                                field = field.as_str(),
                                "skipping filter field from snapshot"
                            );
                            failures += 1;
                        }
                    }
                }
            }
        }

        failures
    }

    /// Start a fetch session over the enabled filters.
    ///
    /// At most `max_concurrent` filters fetch at once (0 = unlimited).
    /// When `feature_limit` is non-zero the session ends early once the
    /// combined feature count exceeds it; the check runs at completion
    /// boundaries, so the final count may overshoot by one filter's
    /// results. `prior` carries earlier runs that filters may reuse
    /// results from.
    ///
    /// Returns false, without touching anything, when a session is
    /// already in progress. Progress is observed through
    /// [`MapQuery::status`]; the session keeps running after this call
    /// returns.
    pub async fn fetch(
        self: &Arc<Self>,
        max_concurrent: usize,
        feature_limit: usize,
        prior: Vec<Arc<MapQuery>>,
    ) -> bool {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("fetch already in progress, ignoring");
            return false;
        }

        let worklist: VecDeque<Arc<dyn Filter>> = self
            .filters
            .iter()
            .filter(|f| f.enabled())
            .cloned()
            .collect();
        for filter in &worklist {
            filter.core().start_running("Waiting to fetch");
        }
        info!(
            filters = worklist.len(),
            max_concurrent, feature_limit, "fetch session started"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = FetchContext::new(
            Arc::clone(&self.fields),
            Arc::new(prior),
            Continuation::new(tx),
        );
        let session = Arc::new(Session::new(
            Arc::clone(self),
            worklist,
            max_concurrent,
            feature_limit,
            ctx,
        ));

        // Admit as much as possible inline; hand the rest of the session
        // to a background task driven by completion signals.
        match session.scheduling_pass().await {
            PassOutcome::Finished => session.finish(),
            PassOutcome::Parked => {
                tokio::spawn(session.drive(rx));
            }
        }
        true
    }

    /// [`MapQuery::fetch`] with the caps taken from configuration.
    pub async fn fetch_with(
        self: &Arc<Self>,
        config: &QueryConfig,
        prior: Vec<Arc<MapQuery>>,
    ) -> bool {
        self.fetch(config.max_concurrent, config.feature_limit, prior)
            .await
    }

    fn end_session(&self) {
        self.fetching.store(false, Ordering::SeqCst);
        info!(
            features = self.feature_count(),
            status = %self.status().message,
            "fetch session finished"
        );
    }
}

/// Builder for queries with a custom field and filter layout.
#[derive(Default)]
pub struct MapQueryBuilder {
    fields: HashMap<String, Field>,
    filters: Vec<Arc<dyn Filter>>,
}

impl MapQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shared field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Add a filter. Filters keep the order they were added in.
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> MapQuery {
        MapQuery {
            fields: Arc::new(FieldSet::new(self.fields)),
            filters: self.filters,
            fetching: AtomicBool::new(false),
        }
    }
}
