//! Behaviour tests for the concrete filters, against mock services.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use cartograph_core::{
    testing::{fixtures, MockBoundaryService, MockPlacesService},
    BoundaryFilter, FetchState, Filter, MapQuery, PlacesFilter, BOUNDS_FIELD,
};

async fn wait_idle(query: &Arc<MapQuery>) {
    for _ in 0..500 {
        if !query.is_fetching() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("fetch session did not finish in time");
}

async fn boundary_query(service: Arc<MockBoundaryService>) -> Arc<MapQuery> {
    let query = Arc::new(MapQuery::standard(service, MockPlacesService::new()));
    query
        .fields()
        .set(BOUNDS_FIELD, fixtures::brisbane_bounds_value())
        .await;
    query.enable(BoundaryFilter::NAME, true);
    query
}

#[tokio::test]
async fn test_boundary_fetch_success() {
    let service = MockBoundaryService::with_features(fixtures::point_features(2));
    let query = boundary_query(service.clone()).await;

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(service.call_count().await, 1);
    assert_eq!(service.recorded_calls().await[0], fixtures::brisbane_bounds());
    let filter = query.filter(BoundaryFilter::NAME).unwrap();
    assert_eq!(filter.status().state, FetchState::Success);
    assert!(filter.status().message.contains("Found 2"));
    assert_eq!(query.map_features().len(), 2);
}

#[tokio::test]
async fn test_boundary_reuses_prior_run_with_same_bounds() {
    let service = MockBoundaryService::with_features(fixtures::point_features(2));
    let first = boundary_query(service.clone()).await;
    assert!(first.fetch(4, 0, vec![]).await);
    wait_idle(&first).await;
    assert_eq!(service.call_count().await, 1);

    let second = boundary_query(service.clone()).await;
    assert!(second.fetch(4, 0, vec![first.clone()]).await);
    wait_idle(&second).await;

    // Same bounds as the prior run: served from it, no second call.
    assert_eq!(service.call_count().await, 1);
    let filter = second.filter(BoundaryFilter::NAME).unwrap();
    assert_eq!(filter.results_len(), 2);
    assert!(filter.status().message.contains("Reused"));
}

#[tokio::test]
async fn test_boundary_refetches_for_different_bounds() {
    let service = MockBoundaryService::with_features(fixtures::point_features(2));
    let first = boundary_query(service.clone()).await;
    assert!(first.fetch(4, 0, vec![]).await);
    wait_idle(&first).await;

    let second = boundary_query(service.clone()).await;
    second
        .fields()
        .set(
            BOUNDS_FIELD,
            json!({
                "top_left_lat": 40.9,
                "top_left_lng": -74.1,
                "bottom_right_lat": 40.5,
                "bottom_right_lng": -73.6,
            }),
        )
        .await;
    assert!(second.fetch(4, 0, vec![first.clone()]).await);
    wait_idle(&second).await;

    assert_eq!(service.call_count().await, 2);
}

#[tokio::test]
async fn test_boundary_failure_reaches_query_status() {
    let service = MockBoundaryService::failing("Our query failed.");
    let query = boundary_query(service).await;

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    let filter = query.filter(BoundaryFilter::NAME).unwrap();
    assert_eq!(filter.status().state, FetchState::Failure);
    // With every source failed the query as a whole reports failure.
    let status = query.status();
    assert_eq!(status.state, FetchState::Failure);
    assert!(status.message.contains("0 of 1 sources completed!"));
    assert!(status.message.contains("Our query failed."));
}

async fn places_query(service: Arc<MockPlacesService>, types: serde_json::Value) -> Arc<MapQuery> {
    let query = Arc::new(MapQuery::standard(MockBoundaryService::new(), service));
    query
        .fields()
        .set(BOUNDS_FIELD, fixtures::brisbane_bounds_value())
        .await;
    query.enable(PlacesFilter::NAME, true);
    let places = query.filter(PlacesFilter::NAME).unwrap();
    places.fields().set(PlacesFilter::TYPES_FIELD, types).await;
    query
}

#[tokio::test]
async fn test_places_fetches_each_type_and_annotates() {
    let service = MockPlacesService::new();
    service.respond("cafe", fixtures::point_features(2)).await;
    service.respond("zoo", fixtures::point_features(1)).await;
    let query = places_query(service.clone(), json!(["cafe", "zoo"])).await;

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    let calls = service.recorded_calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].place_type, "cafe");
    assert_eq!(calls[1].place_type, "zoo");

    let features = query.map_features();
    assert_eq!(features.len(), 3);
    assert_eq!(features[0].properties["place_type"], "cafe");
    assert_eq!(features[2].properties["place_type"], "zoo");

    let filter = query.filter(PlacesFilter::NAME).unwrap();
    assert!(filter.status().message.contains("Found 3 places"));
}

#[tokio::test]
async fn test_places_skips_failing_types_and_still_succeeds() {
    let service = MockPlacesService::new();
    service.respond("cafe", fixtures::point_features(2)).await;
    service.fail_type("park").await;
    service.respond("zoo", fixtures::point_features(1)).await;
    let query = places_query(service.clone(), json!(["cafe", "park", "zoo"])).await;

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(service.call_count().await, 3);
    let filter = query.filter(PlacesFilter::NAME).unwrap();
    let status = filter.status();
    assert_eq!(status.state, FetchState::Success);
    assert!(status.message.contains("Found 3 places"));
    assert!(status.message.contains("park"));
    assert_eq!(query.map_features().len(), 3);
}

#[tokio::test]
async fn test_places_declines_without_selected_types() {
    let service = MockPlacesService::new();
    let query = places_query(service.clone(), json!([])).await;

    assert!(query.fetch(4, 0, vec![]).await);
    wait_idle(&query).await;

    assert_eq!(service.call_count().await, 0);
    let filter = query.filter(PlacesFilter::NAME).unwrap();
    assert_eq!(filter.status().state, FetchState::Success);
    assert_eq!(query.map_features().len(), 0);
}
