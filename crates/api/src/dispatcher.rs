//! The Dispatcher (spec §4.E) — the per-ride scheduler. Expanding-radius
//! candidate search with concurrent offers per radius, a single
//! `offerTimeout` wait, timeout → grace window → give-up, all honoring an
//! external cancel token at every safe point.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use domain::events::OutboundEvent;
use domain::models::RideStatus;
use domain::state_machine;

use crate::realtime::RealtimeContext;

enum Outcome {
    Cancelled,
    RideMovedOn,
    SearchExhausted,
}

/// Runs until the ride is accepted, cancelled, completed, or the search is
/// exhausted (timeout + grace). Always removes its own DispatchProcess entry
/// on exit (spec §5: "scoped finalizer").
pub async fn run(ctx: RealtimeContext, ride_id: Uuid, mut cancel_rx: watch::Receiver<bool>) {
    let outcome = search(&ctx, ride_id, &mut cancel_rx).await;

    if matches!(outcome, Outcome::SearchExhausted) {
        metrics::counter!("dispatch_grace_phase_entries_total").increment(1);
        grace_phase(&ctx, ride_id, &mut cancel_rx).await;
    }

    ctx.dispatch_registry.remove(ride_id);
}

async fn search(ctx: &RealtimeContext, ride_id: Uuid, cancel_rx: &mut watch::Receiver<bool>) -> Outcome {
    let config = ctx.config.dispatch.clone();
    let start_time = Utc::now();
    let mut radius = config.initial_radius_km;
    let mut offered: HashSet<Uuid> = HashSet::new();

    loop {
        if is_cancelled(cancel_rx) {
            return Outcome::Cancelled;
        }

        let ride = match ctx.rides.get(ride_id).await {
            Ok(Some(entity)) => entity.into_domain(),
            Ok(None) => return Outcome::RideMovedOn,
            Err(error) => {
                tracing::warn!(%ride_id, %error, "dispatcher: transient ride store read failure");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        if ride.status != RideStatus::Requested {
            return Outcome::RideMovedOn;
        }

        let elapsed = Utc::now() - start_time;
        if elapsed >= chrono::Duration::seconds(config.max_time_sec as i64) {
            metrics::histogram!("dispatch_radius_reached_km").record(radius);
            return Outcome::SearchExhausted;
        }

        let candidates = ctx.geo_index.nearby(ride.pickup.coordinate, radius);
        let mut offers_this_round: u64 = 0;
        for (captain_id, _distance_km) in &candidates {
            let captain_id = *captain_id;
            if offered.contains(&captain_id) {
                continue;
            }
            if !ctx.sessions.is_online(captain_id) {
                continue;
            }
            if ctx.dispatch_registry.is_on_cooldown(ride_id, captain_id) {
                continue;
            }
            if ctx
                .rides
                .find_active_for_captain(captain_id)
                .await
                .ok()
                .flatten()
                .is_some()
            {
                continue;
            }

            offered.insert(captain_id);
            offers_this_round += 1;
            ctx.sessions
                .send_to(captain_id, OutboundEvent::NewRide { ride: ride.clone() });
        }
        if offers_this_round > 0 {
            metrics::counter!("dispatch_offers_sent_total").increment(offers_this_round);
        }

        if wait_or_cancel(cancel_rx, Duration::from_secs(config.offer_timeout_sec)).await {
            return Outcome::Cancelled;
        }

        match ctx.rides.get(ride_id).await {
            Ok(Some(entity)) if entity.clone().into_domain().status == RideStatus::Requested => {}
            Ok(_) => {
                metrics::histogram!("dispatch_radius_reached_km").record(radius);
                return Outcome::RideMovedOn;
            }
            Err(error) => {
                tracing::warn!(%ride_id, %error, "dispatcher: transient ride store read failure");
            }
        }

        if radius < config.max_radius_km {
            if wait_or_cancel(cancel_rx, Duration::from_secs(config.inter_radius_pause_sec)).await {
                return Outcome::Cancelled;
            }
            radius = (radius + config.radius_increment_km).min(config.max_radius_km);
        } else {
            metrics::histogram!("dispatch_radius_reached_km").record(radius);
            return Outcome::SearchExhausted;
        }
    }
}

/// Polls every 5s up to `graceSec`; gives up with `notApprove` if the ride is
/// still `requested` at the end (spec §4.E step 7).
async fn grace_phase(ctx: &RealtimeContext, ride_id: Uuid, cancel_rx: &mut watch::Receiver<bool>) {
    let grace = Duration::from_secs(ctx.config.dispatch.grace_sec);
    let poll_interval = Duration::from_secs(5).min(grace);
    let deadline = tokio::time::Instant::now() + grace;

    while tokio::time::Instant::now() < deadline {
        if is_cancelled(cancel_rx) {
            return;
        }
        match ctx.rides.get(ride_id).await {
            Ok(Some(entity)) if entity.clone().into_domain().status == RideStatus::Requested => {}
            _ => return,
        }
        if wait_or_cancel(cancel_rx, poll_interval).await {
            return;
        }
    }

    let ride = match ctx.rides.get(ride_id).await {
        Ok(Some(entity)) => entity.into_domain(),
        _ => return,
    };
    if ride.status != RideStatus::Requested {
        return;
    }

    let transition = state_machine::not_approve();
    match ctx.rides.compare_and_set(ride_id, &transition).await {
        Ok(Some(entity)) => {
            let updated = entity.into_domain();
            ctx.sessions.send_to(
                updated.passenger_id,
                OutboundEvent::RideNotApproved { ride: updated },
            );
        }
        Ok(None) => {
            // lost the race with some other transition; nothing to report.
        }
        Err(error) => {
            tracing::warn!(%ride_id, %error, "dispatcher: failed to record notApprove");
        }
    }
}

fn is_cancelled(cancel_rx: &mut watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow_and_update()
}

/// Sleeps for `duration` unless the cancel signal fires first. Returns
/// `true` if cancelled.
async fn wait_or_cancel(cancel_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = cancel_rx.changed() => match changed {
            Ok(()) => *cancel_rx.borrow(),
            Err(_) => true,
        },
    }
}
