//! One run of the fetch scheduler.
//!
//! A session owns a worklist of enabled filters and admits them one by
//! one, keeping at most `max_concurrent` fetches in flight. Filters
//! report completed work through the session's continuation channel;
//! every signal re-runs a scheduling pass that admits more work, parks
//! until the next signal, or ends the session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::filter::{FetchContext, Filter};
use crate::status::FetchState;

use super::MapQuery;

/// What a scheduling pass decided.
pub(super) enum PassOutcome {
    /// The session is over: nothing left to admit and nothing in flight,
    /// or the feature limit was exceeded.
    Finished,
    /// In-flight work (or the concurrency cap) blocks further admission;
    /// wait for the next completion signal.
    Parked,
}

pub(super) struct Session {
    query: Arc<MapQuery>,
    worklist: Mutex<VecDeque<Arc<dyn Filter>>>,
    /// Filters admitted with asynchronous work outstanding.
    admitted: Mutex<Vec<Arc<dyn Filter>>>,
    max_concurrent: usize,
    feature_limit: usize,
    ctx: FetchContext,
}

impl Session {
    pub(super) fn new(
        query: Arc<MapQuery>,
        worklist: VecDeque<Arc<dyn Filter>>,
        max_concurrent: usize,
        feature_limit: usize,
        ctx: FetchContext,
    ) -> Self {
        Self {
            query,
            worklist: Mutex::new(worklist),
            admitted: Mutex::new(Vec::new()),
            max_concurrent,
            feature_limit,
            ctx,
        }
    }

    /// Admitted filters whose fetch has not reached a terminal state.
    /// Filters still waiting in the worklist never count, even though
    /// they already show as running.
    fn in_flight(&self) -> usize {
        self.admitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|f| !f.status().is_terminal())
            .count()
    }

    /// Features held by enabled filters that finished successfully.
    /// Partial results of still-running filters do not count yet.
    fn settled_feature_count(&self) -> usize {
        self.query
            .filters()
            .iter()
            .filter(|f| f.enabled() && f.status().state == FetchState::Success)
            .map(|f| f.results_len())
            .sum()
    }

    /// Admit filters until the worklist runs dry, the concurrency cap is
    /// reached, or the feature limit ends the session early.
    pub(super) async fn scheduling_pass(&self) -> PassOutcome {
        loop {
            let settled = self.settled_feature_count();
            if self.feature_limit > 0 && settled > self.feature_limit {
                debug!(
                    limit = self.feature_limit,
                    features = settled,
                    "feature limit exceeded, ending session early"
                );
                return PassOutcome::Finished;
            }

            let in_flight = self.in_flight();
            let next = {
                let mut worklist = self.worklist.lock().unwrap_or_else(|e| e.into_inner());
                if worklist.is_empty() {
                    if in_flight == 0 {
                        return PassOutcome::Finished;
                    }
                    return PassOutcome::Parked;
                }
                if self.max_concurrent > 0 && in_flight >= self.max_concurrent {
                    return PassOutcome::Parked;
                }
                let Some(next) = worklist.pop_front() else {
                    return PassOutcome::Parked;
                };
                next
            };

            debug!(filter = next.name(), "admitting filter");
            if next.fetch(self.ctx.clone()).await {
                self.admitted
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(next);
            } else if !next.status().is_terminal() {
                // Declined to fetch: empty success, unless the filter
                // already settled its own terminal state.
                next.core().force_success();
            }
        }
    }

    /// Run scheduling passes until the session finishes, parking on the
    /// continuation channel in between.
    pub(super) async fn drive(self: Arc<Self>, mut rx: UnboundedReceiver<()>) {
        loop {
            match self.scheduling_pass().await {
                PassOutcome::Finished => {
                    self.finish();
                    return;
                }
                PassOutcome::Parked => {
                    if rx.recv().await.is_none() {
                        self.finish();
                        return;
                    }
                }
            }
        }
    }

    pub(super) fn finish(&self) {
        self.query.end_session();
    }
}
