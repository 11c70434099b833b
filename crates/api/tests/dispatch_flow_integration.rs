//! End-to-end coverage of the Dispatcher/Event Router against a real
//! Postgres instance (spec §4.D/§4.E/§4.F): request → offer → accept,
//! captain-cancel → re-dispatch with cooldown, and passenger cancel.

mod common;

use std::time::Duration;

use domain::models::session::Role;
use domain::models::{Coordinate, RideStatus};
use dispatch_core_api::realtime::EventRouter;
use uuid::Uuid;

use common::*;

/// Waits (bounded) for a condition to become true, polling a fixed interval.
/// The Dispatcher runs on its own tokio task, so tests need a short poll
/// loop instead of asserting immediately after triggering a request.
async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(condition(), "condition did not become true within {timeout:?}");
}

#[tokio::test]
async fn request_then_nearby_captain_accepts() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let ctx = test_realtime_ctx(&config, pool.clone());
    let router = EventRouter::new(ctx.clone());

    let passenger_id = Uuid::new_v4();
    let captain_id = Uuid::new_v4();

    // Captain is online and within the initial search radius.
    ctx.sessions.attach(captain_id, Role::Captain);
    ctx.geo_index.upsert(captain_id, Coordinate::new(33.316, 44.361));

    let origin = sample_place(33.315, 44.360, "Origin");
    let destination = sample_place(33.400, 44.420, "Destination");

    let ride = router
        .request_ride(passenger_id, origin, destination, 5.0, 12.0, None, None)
        .await
        .expect("request_ride succeeds");
    assert_eq!(ride.status, RideStatus::Requested);

    // The Dispatcher should register itself immediately.
    wait_for(|| ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(200)).await;

    let accepted = router
        .accept_ride(captain_id, ride.id)
        .await
        .expect("captain can accept the offered ride");
    assert_eq!(accepted.status, RideStatus::Accepted);
    assert_eq!(accepted.captain_id, Some(captain_id));

    // Accepting cancels the Dispatcher (spec §4.E).
    wait_for(|| !ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(200)).await;
}

#[tokio::test]
async fn captain_cancel_after_accept_redispatches_and_excludes_during_cooldown() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let ctx = test_realtime_ctx(&config, pool.clone());
    let router = EventRouter::new(ctx.clone());

    let passenger_id = Uuid::new_v4();
    let captain_id = Uuid::new_v4();

    ctx.sessions.attach(captain_id, Role::Captain);
    ctx.geo_index.upsert(captain_id, Coordinate::new(33.316, 44.361));

    let ride = router
        .request_ride(
            passenger_id,
            sample_place(33.315, 44.360, "Origin"),
            sample_place(33.400, 44.420, "Destination"),
            5.0,
            12.0,
            None,
            None,
        )
        .await
        .unwrap();

    wait_for(|| ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(200)).await;
    router.accept_ride(captain_id, ride.id).await.unwrap();

    let cancelled = router.captain_cancel_ride(captain_id, ride.id).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::Requested);
    assert_eq!(cancelled.captain_id, None);

    // Cooldown excludes the cancelling captain from the fresh dispatch.
    assert!(ctx.dispatch_registry.is_on_cooldown(ride.id, captain_id));

    // A fresh Dispatcher was started for the same ride.
    wait_for(|| ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(200)).await;
}

#[tokio::test]
async fn passenger_cancel_stops_the_dispatcher() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let ctx = test_realtime_ctx(&config, pool.clone());
    let router = EventRouter::new(ctx.clone());

    let passenger_id = Uuid::new_v4();

    let ride = router
        .request_ride(
            passenger_id,
            sample_place(33.315, 44.360, "Origin"),
            sample_place(33.400, 44.420, "Destination"),
            5.0,
            12.0,
            None,
            None,
        )
        .await
        .unwrap();

    wait_for(|| ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(200)).await;

    let cancelled = router
        .cancel_ride_by_passenger(passenger_id, ride.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);

    wait_for(|| !ctx.dispatch_registry.is_active(ride.id), Duration::from_millis(500)).await;
}

#[tokio::test]
async fn rehydrate_restores_active_ride_for_reconnecting_passenger() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let config = test_config();
    let ctx = test_realtime_ctx(&config, pool.clone());
    let router = EventRouter::new(ctx.clone());

    let passenger_id = Uuid::new_v4();
    let (_session, mut receiver) = ctx.sessions.attach(passenger_id, Role::Passenger);

    let ride = router
        .request_ride(
            passenger_id,
            sample_place(33.315, 44.360, "Origin"),
            sample_place(33.400, 44.420, "Destination"),
            5.0,
            12.0,
            None,
            None,
        )
        .await
        .unwrap();

    // Drain the `ridePending` sent during the request itself.
    let _ = receiver.recv().await;

    router.rehydrate(passenger_id, Role::Passenger).await.unwrap();

    let restored = receiver.recv().await.expect("restore event delivered");
    match restored {
        domain::events::OutboundEvent::RideRestored { ride: restored_ride } => {
            assert_eq!(restored_ride.id, ride.id);
        }
        other => panic!("expected RideRestored, got {other:?}"),
    }
}
