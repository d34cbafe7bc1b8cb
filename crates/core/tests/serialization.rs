//! Query snapshot serialization tests.

use serde_json::json;

use cartograph_core::{
    testing::{fixtures, MockBoundaryService, MockPlacesService},
    BoundaryFilter, Filter, MapQuery, PlacesFilter, BOUNDS_FIELD,
};

fn standard_query() -> MapQuery {
    MapQuery::standard(MockBoundaryService::new(), MockPlacesService::new())
}

#[tokio::test]
async fn test_round_trip_restores_fields_and_enablement() {
    let query = standard_query();
    query
        .fields()
        .set(BOUNDS_FIELD, fixtures::brisbane_bounds_value())
        .await;
    query.enable(PlacesFilter::NAME, true);
    let places = query.filter(PlacesFilter::NAME).unwrap();
    places
        .fields()
        .set(PlacesFilter::TYPES_FIELD, json!(["cafe", "zoo"]))
        .await;

    let snapshot = query.to_json().await;

    let restored = standard_query();
    assert_eq!(restored.from_json(&snapshot).await, 0);
    assert_eq!(
        restored.fields().value(BOUNDS_FIELD).await,
        Some(fixtures::brisbane_bounds_value())
    );
    let places = restored.filter(PlacesFilter::NAME).unwrap();
    assert!(places.enabled());
    assert_eq!(
        places.fields().value(PlacesFilter::TYPES_FIELD).await,
        Some(json!(["cafe", "zoo"]))
    );
    // Absent from the snapshot means disabled after restore.
    assert!(!restored.filter(BoundaryFilter::NAME).unwrap().enabled());
}

#[tokio::test]
async fn test_disabled_filters_are_not_serialized() {
    let query = standard_query();
    query.enable(BoundaryFilter::NAME, true);

    let snapshot = query.to_json().await;
    let filters = snapshot["filters"].as_object().unwrap();
    assert!(filters.contains_key(BoundaryFilter::NAME));
    assert!(!filters.contains_key(PlacesFilter::NAME));
}

#[tokio::test]
async fn test_unknown_entries_are_counted_not_fatal() {
    let query = standard_query();
    let snapshot = json!({
        "fields": { "altitude": 3000 },
        "filters": {
            "teleporters": { "fields": {} },
            "places": { "fields": {} },
        },
    });

    assert_eq!(query.from_json(&snapshot).await, 2);
    // The valid parts of the snapshot still applied.
    assert!(query.filter(PlacesFilter::NAME).unwrap().enabled());
}

#[tokio::test]
async fn test_rejected_values_are_counted_and_skipped() {
    let query = standard_query();
    let before = query.fields().value(BOUNDS_FIELD).await;
    let snapshot = json!({
        "fields": { "bounds": "not a rectangle" },
        "filters": {
            "places": { "fields": { "place_types": ["cafe", "spaceport"] } },
        },
    });

    assert_eq!(query.from_json(&snapshot).await, 2);
    assert_eq!(query.fields().value(BOUNDS_FIELD).await, before);
}
