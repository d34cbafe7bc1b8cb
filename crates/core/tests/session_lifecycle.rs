//! Fetch session lifecycle integration tests.
//!
//! These tests drive the scheduler with scripted filters: admission
//! order, the concurrency cap, the feature limit, re-entrancy and
//! failure aggregation.

use std::sync::Arc;
use std::time::Duration;

use cartograph_core::{
    testing::{fixtures, ConcurrencyGauge, ScriptedFetch, ScriptedFilter},
    FetchState, Filter, MapQuery,
};

/// Poll until the query's session ends.
async fn wait_idle(query: &Arc<MapQuery>) {
    for _ in 0..500 {
        if !query.is_fetching() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("fetch session did not finish in time");
}

fn succeed_after(count: usize, millis: u64) -> ScriptedFetch {
    ScriptedFetch::Succeed {
        features: fixtures::point_features(count),
        delay: Duration::from_millis(millis),
    }
}

#[tokio::test]
async fn test_all_disabled_is_vacuously_successful() {
    let filter = ScriptedFilter::new("lonely", succeed_after(3, 10));
    filter.set_enabled(false);
    let query = Arc::new(MapQuery::builder().filter(filter.clone()).build());

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    let status = query.status();
    assert_eq!(status.state, FetchState::Success);
    assert_eq!(status.message, "0 of 0 sources completed!");
    assert_eq!(filter.fetch_count(), 0);
    assert!(query.map_features().is_empty());
}

#[tokio::test]
async fn test_fetch_is_not_reentrant() {
    let filter = ScriptedFilter::new("slow", succeed_after(1, 50));
    let query = Arc::new(MapQuery::builder().filter(filter.clone()).build());

    assert!(query.fetch(4, 0, vec![]).await);
    assert!(query.is_fetching());
    assert_eq!(query.status().state, FetchState::Running);

    // A second fetch while the session runs is refused outright.
    assert!(!query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;
    assert_eq!(filter.fetch_count(), 1);

    // Once idle, fetching works again.
    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;
    assert_eq!(filter.fetch_count(), 2);
}

#[tokio::test]
async fn test_concurrency_cap_limits_overlap() {
    let gauge = ConcurrencyGauge::new();
    let query = Arc::new(
        MapQuery::builder()
            .filter(ScriptedFilter::with_gauge("a", succeed_after(1, 30), gauge.clone()))
            .filter(ScriptedFilter::with_gauge("b", succeed_after(2, 30), gauge.clone()))
            .filter(ScriptedFilter::with_gauge("c", succeed_after(3, 30), gauge.clone()))
            .build(),
    );

    assert!(query.fetch(1, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(gauge.peak(), 1);
    assert_eq!(query.feature_count(), 6);
    assert_eq!(query.status().state, FetchState::Success);
}

#[tokio::test]
async fn test_uncapped_session_overlaps_and_matches_capped_result() {
    let gauge = ConcurrencyGauge::new();
    let query = Arc::new(
        MapQuery::builder()
            .filter(ScriptedFilter::with_gauge("a", succeed_after(1, 50), gauge.clone()))
            .filter(ScriptedFilter::with_gauge("b", succeed_after(2, 50), gauge.clone()))
            .filter(ScriptedFilter::with_gauge("c", succeed_after(3, 50), gauge.clone()))
            .build(),
    );

    // 0 means no cap: everything is admitted in the first pass.
    assert!(query.fetch(0, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(gauge.peak(), 3);
    // Same combined result as the capped run, just fetched in parallel.
    assert_eq!(query.feature_count(), 6);
}

#[tokio::test]
async fn test_feature_limit_ends_session_early() {
    let a = ScriptedFilter::new("a", succeed_after(5, 10));
    let b = ScriptedFilter::new("b", succeed_after(2, 10));
    let c = ScriptedFilter::new("c", succeed_after(1, 10));
    let query = Arc::new(
        MapQuery::builder()
            .filter(a.clone())
            .filter(b.clone())
            .filter(c.clone())
            .build(),
    );

    // Cap 1 forces admission order a, b, c; a alone exceeds the limit.
    assert!(query.fetch(1, 3, vec![]).await);
    wait_idle(&query).await;

    // The limit check runs when a completes, so its results stand.
    assert_eq!(query.feature_count(), 5);
    assert_eq!(a.fetch_count(), 1);
    assert_eq!(b.fetch_count(), 0);
    assert_eq!(c.fetch_count(), 0);
    assert!(!query.is_fetching());
}

#[tokio::test]
async fn test_exact_limit_does_not_end_session() {
    let a = ScriptedFilter::new("a", succeed_after(3, 10));
    let b = ScriptedFilter::new("b", succeed_after(1, 10));
    let query = Arc::new(MapQuery::builder().filter(a.clone()).filter(b.clone()).build());

    // The limit is only exceeded strictly; hitting it exactly continues.
    assert!(query.fetch(1, 3, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(b.fetch_count(), 1);
    assert_eq!(query.feature_count(), 4);
}

#[tokio::test]
async fn test_failures_are_aggregated_into_the_status() {
    let ok = ScriptedFilter::new("working", succeed_after(3, 10));
    let broken = ScriptedFilter::new(
        "broken",
        ScriptedFetch::Fail {
            message: "boom".to_string(),
            delay: Duration::from_millis(10),
        },
    );
    let query = Arc::new(
        MapQuery::builder()
            .filter(ok.clone())
            .filter(broken.clone())
            .build(),
    );

    assert!(query.fetch(0, 0, vec![]).await);
    wait_idle(&query).await;

    // One failed source does not fail the query as a whole.
    let status = query.status();
    assert_eq!(status.state, FetchState::Success);
    assert_eq!(status.completion, 1.0);
    assert!(status.message.contains("1 of 2 sources completed!"));
    assert!(status.message.contains("boom"));
    assert_eq!(query.map_features().len(), 3);
}

#[tokio::test]
async fn test_declining_filter_is_forced_successful() {
    let decline = ScriptedFilter::new("empty", ScriptedFetch::Decline);
    let query = Arc::new(MapQuery::builder().filter(decline.clone()).build());

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(decline.status().state, FetchState::Success);
    assert_eq!(query.status().message, "1 of 1 sources completed!");
}

#[tokio::test]
async fn test_running_status_reports_partial_completion() {
    let fast = ScriptedFilter::new("fast", succeed_after(1, 10));
    let slow = ScriptedFilter::new("slow", succeed_after(1, 200));
    let query = Arc::new(MapQuery::builder().filter(fast).filter(slow).build());

    assert!(query.fetch(0, 0, vec![]).await);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let status = query.status();
    assert_eq!(status.state, FetchState::Running);
    assert!(status.completion >= 0.5 - f32::EPSILON);
    assert!(status.completion < 1.0);
    assert!(status.message.contains("1 of 2 sources completed!"));

    wait_idle(&query).await;
}
