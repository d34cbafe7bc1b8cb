//! Scripted filter for exercising the fetch scheduler.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::feature::Feature;
use crate::filter::{FetchContext, Filter, FilterCore};

/// What a [`ScriptedFilter`] does when fetched.
#[derive(Clone)]
pub enum ScriptedFetch {
    /// Decline to fetch (nothing applies to this filter).
    Decline,
    /// Succeed asynchronously with these features after `delay`.
    Succeed {
        features: Vec<Feature>,
        delay: Duration,
    },
    /// Fail asynchronously with this message after `delay`.
    Fail { message: String, delay: Duration },
}

/// Tracks how many scripted fetches overlap, for concurrency-cap
/// assertions. Clones share the same counters.
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of overlapping fetches observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A filter that follows a fixed script instead of fetching anything.
pub struct ScriptedFilter {
    core: FilterCore,
    script: ScriptedFetch,
    gauge: Option<ConcurrencyGauge>,
    fetch_count: AtomicUsize,
}

impl ScriptedFilter {
    /// A scripted filter, enabled by default.
    pub fn new(name: &str, script: ScriptedFetch) -> Arc<Self> {
        let core = FilterCore::new(name);
        core.set_enabled(true);
        Arc::new(Self {
            core,
            script,
            gauge: None,
            fetch_count: AtomicUsize::new(0),
        })
    }

    /// Like [`ScriptedFilter::new`], reporting fetch overlap to `gauge`.
    pub fn with_gauge(name: &str, script: ScriptedFetch, gauge: ConcurrencyGauge) -> Arc<Self> {
        let core = FilterCore::new(name);
        core.set_enabled(true);
        Arc::new(Self {
            core,
            script,
            gauge: Some(gauge),
            fetch_count: AtomicUsize::new(0),
        })
    }

    /// How many times the scheduler fetched this filter.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Filter for ScriptedFilter {
    fn core(&self) -> &FilterCore {
        &self.core
    }

    async fn fetch(&self, ctx: FetchContext) -> bool {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.script.clone() {
            ScriptedFetch::Decline => false,
            ScriptedFetch::Succeed { features, delay } => {
                let core = self.core.clone();
                let gauge = self.gauge.clone();
                tokio::spawn(async move {
                    if let Some(gauge) = &gauge {
                        gauge.enter();
                    }
                    tokio::time::sleep(delay).await;
                    let count = features.len();
                    core.set_results(features);
                    core.succeed(format!("Found {count} features"));
                    if let Some(gauge) = &gauge {
                        gauge.exit();
                    }
                    ctx.step_done();
                });
                true
            }
            ScriptedFetch::Fail { message, delay } => {
                let core = self.core.clone();
                let gauge = self.gauge.clone();
                tokio::spawn(async move {
                    if let Some(gauge) = &gauge {
                        gauge.enter();
                    }
                    tokio::time::sleep(delay).await;
                    core.fail(message);
                    if let Some(gauge) = &gauge {
                        gauge.exit();
                    }
                    ctx.step_done();
                });
                true
            }
        }
    }
}
