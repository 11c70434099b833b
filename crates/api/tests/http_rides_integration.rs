//! HTTP-level coverage of the ride request/cancel surface (spec §6), driven
//! through the full `Router` via `tower::ServiceExt::oneshot` the way the
//! pack's integration suites do.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use shared::jwt::Role;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn request_ride_then_cancel_round_trips_over_http() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let (app, _realtime) = create_test_app(config.clone(), pool.clone());

    let (_passenger_id, token) = bearer_token(&config, Role::Passenger);

    let body = json!({
        "origin": {"lon": 33.315, "lat": 44.360, "name": "Origin"},
        "destination": {"lon": 33.400, "lat": 44.420, "name": "Destination"},
        "distanceKm": 5.0,
        "durationMin": 12.0,
    });

    let request = Request::builder()
        .method("POST")
        .uri("/ride/request")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let ride_id = parsed["ride"]["id"].as_str().unwrap().to_string();
    assert_eq!(parsed["ride"]["status"], "requested");

    let cancel_request = Request::builder()
        .method("POST")
        .uri(format!("/ride/{ride_id}/cancel"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();

    let cancel_response = app.clone().oneshot(cancel_request).await.unwrap();
    assert_eq!(cancel_response.status(), StatusCode::OK);

    let bytes = to_bytes(cancel_response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["ride"]["status"], "cancelled");
}

#[tokio::test]
async fn request_ride_rejects_missing_authorization() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let (app, _realtime) = create_test_app(config, pool);

    let body = json!({
        "origin": {"lon": 33.315, "lat": 44.360},
        "destination": {"lon": 33.400, "lat": 44.420},
        "distanceKm": 5.0,
        "durationMin": 12.0,
    });

    let request = Request::builder()
        .method("POST")
        .uri("/ride/request")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_ride_rejects_non_positive_distance() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let (app, _realtime) = create_test_app(config.clone(), pool);
    let (_passenger_id, token) = bearer_token(&config, Role::Passenger);

    let body = json!({
        "origin": {"lon": 33.315, "lat": 44.360},
        "destination": {"lon": 33.400, "lat": 44.420},
        "distanceKm": 0.0,
        "durationMin": 12.0,
    });

    let request = Request::builder()
        .method("POST")
        .uri("/ride/request")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn second_active_request_conflicts() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let (app, _realtime) = create_test_app(config.clone(), pool);
    let (_passenger_id, token) = bearer_token(&config, Role::Passenger);

    let body = json!({
        "origin": {"lon": 33.315, "lat": 44.360},
        "destination": {"lon": 33.400, "lat": 44.420},
        "distanceKm": 5.0,
        "durationMin": 12.0,
    });

    let make_request = || {
        Request::builder()
            .method("POST")
            .uri("/ride/request")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(make_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(make_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}
