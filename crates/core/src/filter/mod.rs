//! Pluggable feature-fetching units.
//!
//! A [`Filter`] owns one slice of the map data (locality boundaries,
//! places of selected types) and knows how to fetch it for the current
//! shared fields. Filters report progress through [`Status`] snapshots
//! and hand completed work back to the scheduler through the
//! [`FetchContext`] they were started with.

mod boundaries;
mod places;

pub use boundaries::BoundaryFilter;
pub use places::PlacesFilter;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;

use crate::feature::Feature;
use crate::field::{Field, FieldSet};
use crate::query::MapQuery;
use crate::status::{FetchState, Status};

/// Name of the shared field holding the current viewport rectangle.
pub const BOUNDS_FIELD: &str = "bounds";

/// Handle a filter uses to tell the scheduler that one unit of work
/// finished. Cheap to clone, safe to signal after the session is gone.
#[derive(Clone)]
pub struct Continuation {
    tx: UnboundedSender<()>,
}

impl Continuation {
    pub(crate) fn new(tx: UnboundedSender<()>) -> Self {
        Self { tx }
    }

    /// Signal that one step of work completed. The receiving session
    /// may already have exited; that is not an error.
    pub fn step_done(&self) {
        let _ = self.tx.send(());
    }
}

/// Everything a filter needs for one fetch: the shared fields, earlier
/// runs it may reuse results from, and the completion signal.
#[derive(Clone)]
pub struct FetchContext {
    /// Fields shared by every filter in the session, `bounds` included.
    pub fields: Arc<FieldSet>,
    /// Earlier runs, most recent last. Filters may serve results out of
    /// a prior run instead of re-fetching.
    pub prior: Arc<Vec<Arc<MapQuery>>>,
    continuation: Continuation,
}

impl FetchContext {
    pub(crate) fn new(
        fields: Arc<FieldSet>,
        prior: Arc<Vec<Arc<MapQuery>>>,
        continuation: Continuation,
    ) -> Self {
        Self {
            fields,
            prior,
            continuation,
        }
    }

    /// Report one completed unit of work back to the scheduler.
    pub fn step_done(&self) {
        self.continuation.step_done();
    }
}

struct RawState {
    state: FetchState,
    message: String,
}

struct CoreInner {
    name: String,
    enabled: AtomicBool,
    fields: FieldSet,
    state: Mutex<RawState>,
    results: RwLock<Vec<Feature>>,
}

/// Shared bookkeeping every filter carries: identity, enablement,
/// private fields, fetch state and accumulated results.
///
/// Clones share the same underlying state, so a filter can hand a clone
/// of its core to a spawned task and both sides observe the same fetch.
#[derive(Clone)]
pub struct FilterCore {
    inner: Arc<CoreInner>,
}

impl FilterCore {
    /// A core with no private fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_fields(name, HashMap::new())
    }

    /// A core exposing the given private fields.
    pub fn with_fields(name: impl Into<String>, fields: HashMap<String, Field>) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                name: name.into(),
                enabled: AtomicBool::new(false),
                fields: FieldSet::new(fields),
                state: Mutex::new(RawState {
                    state: FetchState::Success,
                    message: String::new(),
                }),
                results: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    /// The filter's private fields.
    pub fn fields(&self) -> &FieldSet {
        &self.inner.fields
    }

    /// Snapshot of the accumulated results.
    pub fn results(&self) -> Vec<Feature> {
        self.inner.results.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn results_len(&self) -> usize {
        self.inner.results.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn set_results(&self, features: Vec<Feature>) {
        *self.inner.results.write().unwrap_or_else(|e| e.into_inner()) = features;
    }

    pub fn extend_results(&self, features: Vec<Feature>) {
        self.inner
            .results
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(features);
    }

    pub fn clear_results(&self) {
        self.inner.results.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn state(&self) -> FetchState {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// Status derived directly from the raw state, with no notion of
    /// partial progress. Filters that can do better override
    /// [`Filter::status`] instead.
    pub fn raw_status(&self) -> Status {
        let guard = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        match guard.state {
            FetchState::Running => Status::running(0.0, guard.message.clone()),
            FetchState::Success => Status::success(guard.message.clone()),
            FetchState::Failure => Status::failure(guard.message.clone()),
        }
    }

    fn transition(&self, state: FetchState, message: String) {
        let mut guard = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.state = state;
        guard.message = message;
    }

    /// Mark a fetch as started and drop results from the previous run.
    pub fn start_running(&self, message: impl Into<String>) {
        self.clear_results();
        self.transition(FetchState::Running, message.into());
    }

    /// Succeed with empty results and no message. Used for filters that
    /// decline to fetch because nothing applies to them.
    pub fn force_success(&self) {
        self.transition(FetchState::Success, String::new());
    }

    pub fn succeed(&self, message: impl Into<String>) {
        self.transition(FetchState::Success, message.into());
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.transition(FetchState::Failure, message.into());
    }
}

/// A unit of fetchable map data.
#[async_trait]
pub trait Filter: Send + Sync {
    /// The shared bookkeeping for this filter.
    fn core(&self) -> &FilterCore;

    /// Stable identifier, unique within a query.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Disabled filters are skipped by the scheduler and excluded from
    /// aggregation and serialization.
    fn enabled(&self) -> bool {
        self.core().enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core().set_enabled(enabled);
    }

    /// The filter's private fields.
    fn fields(&self) -> &FieldSet {
        self.core().fields()
    }

    /// Begin fetching against the shared fields in `ctx`.
    ///
    /// Returns true when asynchronous work was started; the filter must
    /// then eventually reach a terminal state and call
    /// [`FetchContext::step_done`]. Returns false when there is nothing
    /// to fetch, in which case the scheduler marks the filter
    /// successful with empty results and moves on.
    async fn fetch(&self, ctx: FetchContext) -> bool;

    /// Current progress snapshot.
    fn status(&self) -> Status {
        self.core().raw_status()
    }

    /// Snapshot of the features produced by the last fetch.
    fn results(&self) -> Vec<Feature> {
        self.core().results()
    }

    fn results_len(&self) -> usize {
        self.core().results_len()
    }

    /// Drop accumulated results and reset to a successful empty state.
    fn clear(&self) {
        self.core().clear_results();
        self.core().force_success();
    }
}
