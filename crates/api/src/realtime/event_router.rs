//! Event Router (spec §4.F) — the single place that turns an inbound action
//! into a Ride Store mutation plus the outbound events it causes, and that
//! rehydrates a reconnecting principal with the current truth.

use chrono::Utc;
use uuid::Uuid;

use domain::error::DispatchError;
use domain::events::OutboundEvent;
use domain::models::{CancellationReason, Coordinate, PaymentMethod, Place, Ride, RideStatus};
use domain::models::session::Role;
use domain::state_machine;
use persistence::repositories::ride::NewRide;

use super::RealtimeContext;

fn transient(err: sqlx::Error) -> DispatchError {
    DispatchError::Transient(err.to_string())
}

/// The event carrying a ride's current status, emitted after a restoration
/// event on reconnect (spec §4.F) and after any successful transition.
fn status_event(ride: &Ride) -> Option<OutboundEvent> {
    match ride.status {
        RideStatus::Requested => Some(OutboundEvent::RidePending { ride: ride.clone() }),
        RideStatus::Accepted => Some(OutboundEvent::RideAccepted { ride: ride.clone() }),
        RideStatus::Arrived => Some(OutboundEvent::DriverArrived { ride: ride.clone() }),
        RideStatus::OnRide => Some(OutboundEvent::RideStarted { ride: ride.clone() }),
        RideStatus::Completed => Some(OutboundEvent::RideCompleted { ride: ride.clone() }),
        RideStatus::NotApprove => Some(OutboundEvent::RideNotApproved { ride: ride.clone() }),
        RideStatus::Cancelled => None,
    }
}

#[derive(Clone)]
pub struct EventRouter {
    ctx: RealtimeContext,
}

impl EventRouter {
    pub fn new(ctx: RealtimeContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RealtimeContext {
        &self.ctx
    }

    pub fn send(&self, principal_id: Uuid, event: OutboundEvent) -> bool {
        self.ctx.sessions.send_to(principal_id, event)
    }

    /// Starts a Dispatcher for `ride_id` unless one is already running.
    /// Idempotent by construction (spec §4.G).
    pub fn start_dispatcher(&self, ride_id: Uuid) {
        if let Some(cancel_rx) = self.ctx.dispatch_registry.try_register(ride_id) {
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                crate::dispatcher::run(ctx, ride_id, cancel_rx).await;
            });
        }
    }

    /// `requestRide` (spec §4.F) / `POST /ride/request` (spec §6) — the two
    /// surfaces share this single implementation.
    pub async fn request_ride(
        &self,
        passenger_id: Uuid,
        origin: Place,
        destination: Place,
        distance_km: f64,
        duration_min: f64,
        fare_amount: Option<f64>,
        payment_method: Option<PaymentMethod>,
    ) -> Result<Ride, DispatchError> {
        origin
            .validate()
            .map_err(|e| DispatchError::InvalidRequest(format!("origin: {e}")))?;
        destination
            .validate()
            .map_err(|e| DispatchError::InvalidRequest(format!("destination: {e}")))?;
        if distance_km <= 0.0 || duration_min <= 0.0 {
            return Err(DispatchError::InvalidRequest(
                "distanceKm and durationMin must be positive".into(),
            ));
        }

        if self
            .ctx
            .rides
            .find_active_for_passenger(passenger_id)
            .await
            .map_err(transient)?
            .is_some()
        {
            return Err(DispatchError::active_ride_exists(passenger_id));
        }

        let fare = fare_amount.unwrap_or_else(|| {
            domain::fare::compute_fare(distance_km, duration_min, Utc::now(), self.ctx.config.fare.to_params())
        });

        let new_ride = NewRide {
            passenger_id,
            pickup: origin,
            dropoff: destination,
            fare_amount: fare,
            currency: self.ctx.config.fare.currency.clone(),
            distance_km,
            duration_min,
            payment_method: payment_method.unwrap_or(PaymentMethod::Cash),
        };

        let seed = Uuid::new_v4().to_string();
        let entity = self
            .ctx
            .rides
            .create(new_ride, |attempt| shared::crypto::short_code(&seed, attempt))
            .await
            .map_err(transient)?;

        let ride = entity.into_domain();
        self.start_dispatcher(ride.id);
        self.send(passenger_id, OutboundEvent::RidePending { ride: ride.clone() });
        Ok(ride)
    }

    /// Passenger `cancelRide` / `POST /ride/{id}/cancel` (spec §6).
    pub async fn cancel_ride_by_passenger(
        &self,
        passenger_id: Uuid,
        ride_id: Uuid,
    ) -> Result<Ride, DispatchError> {
        let entity = self
            .ctx
            .rides
            .get(ride_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| DispatchError::ride_not_found(ride_id))?;
        let ride = entity.into_domain();

        if ride.passenger_id != passenger_id {
            return Err(DispatchError::NotEligible("not this passenger's ride".into()));
        }

        let elapsed = Utc::now() - ride.created_at;
        let fee = domain::fare::cancellation_fee(
            elapsed,
            chrono::Duration::seconds(self.ctx.config.fare.min_cancel_window_sec),
            self.ctx.config.fare.cancellation_fee,
        );

        let transition = state_machine::cancel_by_passenger(ride.status, fee)
            .ok_or_else(|| state_machine::conflict(ride_id, RideStatus::Requested, ride.status))?;

        let updated = self
            .ctx
            .rides
            .compare_and_set(ride_id, &transition)
            .await
            .map_err(transient)?
            .ok_or_else(|| state_machine::conflict(ride_id, transition.expected, ride.status))?;

        self.ctx.dispatch_registry.cancel(ride_id);
        let updated_ride = updated.into_domain();

        self.send(
            passenger_id,
            OutboundEvent::RideCanceled {
                ride: updated_ride.clone(),
                reason: CancellationReason::PassengerCancelled,
            },
        );
        if let Some(captain_id) = ride.captain_id {
            self.ctx.ride_sharing.remove(captain_id);
            self.send(
                captain_id,
                OutboundEvent::RideCanceled {
                    ride: updated_ride.clone(),
                    reason: CancellationReason::PassengerCancelled,
                },
            );
        }
        Ok(updated_ride)
    }

    /// Captain `updateLocation{lon,lat}` (spec §4.F).
    pub fn update_location(&self, captain_id: Uuid, coordinate: Coordinate) -> Result<(), DispatchError> {
        coordinate
            .validate()
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;
        self.ctx.geo_index.upsert(captain_id, coordinate);

        if let Some(link) = self.ctx.ride_sharing.lookup(captain_id) {
            self.send(
                link.passenger_id,
                OutboundEvent::DriverLocationUpdate {
                    ride_id: link.ride_id,
                    captain_id,
                    coordinate,
                },
            );
        }
        Ok(())
    }

    /// Captain `acceptRide{rideId}` (spec §4.E, §4.F).
    pub async fn accept_ride(&self, captain_id: Uuid, ride_id: Uuid) -> Result<Ride, DispatchError> {
        if self
            .ctx
            .rides
            .find_active_for_captain(captain_id)
            .await
            .map_err(transient)?
            .is_some()
        {
            return Err(DispatchError::NotEligible(
                "captain already has a non-terminal ride".into(),
            ));
        }

        let transition = state_machine::accept(captain_id);
        let updated = self
            .ctx
            .rides
            .compare_and_set(ride_id, &transition)
            .await
            .map_err(transient)?;

        match updated {
            Some(entity) => {
                let ride = entity.into_domain();
                self.ctx.dispatch_registry.cancel(ride_id);
                self.ctx.ride_sharing.install(captain_id, ride_id, ride.passenger_id);
                self.send(ride.passenger_id, OutboundEvent::RideAccepted { ride: ride.clone() });
                self.send(captain_id, OutboundEvent::RideAcceptedConfirmation { ride: ride.clone() });
                Ok(ride)
            }
            None => {
                self.send(
                    captain_id,
                    OutboundEvent::RideError {
                        reason: "ride_taken".into(),
                    },
                );
                Err(DispatchError::Conflict(format!("ride {ride_id} already taken")))
            }
        }
    }

    /// Captain `arrived{rideId}` (spec §4.D).
    pub async fn arrived(&self, captain_id: Uuid, ride_id: Uuid) -> Result<Ride, DispatchError> {
        self.captain_transition(captain_id, ride_id, state_machine::arrive(), |ride| {
            OutboundEvent::DriverArrived { ride: ride.clone() }
        })
        .await
    }

    /// Captain `startRide{rideId}` (spec §4.D).
    pub async fn start_ride(&self, captain_id: Uuid, ride_id: Uuid) -> Result<Ride, DispatchError> {
        self.captain_transition(captain_id, ride_id, state_machine::start(), |ride| {
            OutboundEvent::RideStarted { ride: ride.clone() }
        })
        .await
    }

    /// Captain `endRide{rideId}` (spec §4.D).
    pub async fn end_ride(&self, captain_id: Uuid, ride_id: Uuid) -> Result<Ride, DispatchError> {
        let ride = self
            .captain_transition(captain_id, ride_id, state_machine::complete(), |ride| {
                OutboundEvent::RideCompleted { ride: ride.clone() }
            })
            .await?;
        self.ctx.ride_sharing.remove(captain_id);
        Ok(ride)
    }

    async fn captain_transition(
        &self,
        captain_id: Uuid,
        ride_id: Uuid,
        transition: state_machine::Transition,
        notify: impl Fn(&Ride) -> OutboundEvent,
    ) -> Result<Ride, DispatchError> {
        let entity = self
            .ctx
            .rides
            .get(ride_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| DispatchError::ride_not_found(ride_id))?;
        let ride = entity.into_domain();

        if ride.captain_id != Some(captain_id) {
            return Err(DispatchError::NotEligible("not this captain's ride".into()));
        }

        let expected = transition.expected;
        let updated = self
            .ctx
            .rides
            .compare_and_set(ride_id, &transition)
            .await
            .map_err(transient)?
            .ok_or_else(|| state_machine::conflict(ride_id, expected, ride.status))?;

        let updated_ride = updated.into_domain();
        self.send(updated_ride.passenger_id, notify(&updated_ride));
        self.send(captain_id, notify(&updated_ride));
        Ok(updated_ride)
    }

    /// Captain `cancelRide{rideId}` after accept (spec §4.D, §4.E).
    pub async fn captain_cancel_ride(&self, captain_id: Uuid, ride_id: Uuid) -> Result<Ride, DispatchError> {
        let entity = self
            .ctx
            .rides
            .get(ride_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| DispatchError::ride_not_found(ride_id))?;
        let ride = entity.into_domain();

        if ride.captain_id != Some(captain_id) {
            return Err(DispatchError::NotEligible("not this captain's ride".into()));
        }

        let transition = state_machine::captain_cancel(ride.status)
            .ok_or_else(|| state_machine::conflict(ride_id, RideStatus::Accepted, ride.status))?;

        let updated = self
            .ctx
            .rides
            .compare_and_set(ride_id, &transition)
            .await
            .map_err(transient)?
            .ok_or_else(|| state_machine::conflict(ride_id, transition.expected, ride.status))?;

        self.ctx.ride_sharing.remove(captain_id);
        self.ctx.dispatch_registry.set_cooldown(
            ride_id,
            captain_id,
            std::time::Duration::from_secs(self.ctx.config.dispatch.captain_cancel_cooldown_sec),
        );

        let updated_ride = updated.into_domain();
        self.send(
            updated_ride.passenger_id,
            OutboundEvent::RideCanceled {
                ride: updated_ride.clone(),
                reason: CancellationReason::CaptainCancelled,
            },
        );
        self.send(
            captain_id,
            OutboundEvent::RideCanceled {
                ride: updated_ride.clone(),
                reason: CancellationReason::CaptainCancelled,
            },
        );
        self.start_dispatcher(ride_id);
        Ok(updated_ride)
    }

    /// Runs on every successful `attach` (spec §4.F): replays the
    /// principal's current ride truth, and for idle captains, offers nearby
    /// requested rides.
    pub async fn rehydrate(&self, principal_id: Uuid, role: Role) -> Result<(), DispatchError> {
        let active = match role {
            Role::Passenger => self.ctx.rides.find_active_for_passenger(principal_id).await,
            Role::Captain => self.ctx.rides.find_active_for_captain(principal_id).await,
        }
        .map_err(transient)?;

        if let Some(entity) = active {
            let ride = entity.into_domain();
            let restore_event = match role {
                Role::Passenger => OutboundEvent::RideRestored { ride: ride.clone() },
                Role::Captain => OutboundEvent::RestoreRide { ride: ride.clone() },
            };
            self.send(principal_id, restore_event);
            if let Some(event) = status_event(&ride) {
                self.send(principal_id, event);
            }
            return Ok(());
        }

        if role == Role::Passenger {
            self.rehydrate_recent_completion(principal_id).await?;
        } else {
            self.notify_idle_captain(principal_id).await?;
        }

        Ok(())
    }

    /// A passenger reconnecting shortly after completion still gets the
    /// `rideCompleted` receipt (spec §4.F: "a very recent completed ride
    /// (< 30 min, no passenger rating)").
    async fn rehydrate_recent_completion(&self, passenger_id: Uuid) -> Result<(), DispatchError> {
        let window = chrono::Duration::minutes(self.ctx.config.dispatch.restore_window_min);
        let cutoff = Utc::now() - window;

        let recent = self
            .ctx
            .rides
            .find_recent_completed_for_passenger(passenger_id, cutoff)
            .await
            .map_err(transient)?
            .map(|e| e.into_domain());

        if let Some(ride) = recent {
            self.send(passenger_id, OutboundEvent::RideRestored { ride: ride.clone() });
            self.send(passenger_id, OutboundEvent::RideCompleted { ride });
        }
        Ok(())
    }

    /// Idle captains get `newRide` for each requested ride within
    /// `idleCaptainNotifyRadiusKm` of their last known location, capped by
    /// `idleCaptainNotifyCap` (spec §4.F).
    async fn notify_idle_captain(&self, captain_id: Uuid) -> Result<(), DispatchError> {
        let Some(location) = self.ctx.geo_index.get(captain_id) else {
            return Ok(());
        };
        let radius = self.ctx.config.dispatch.idle_captain_notify_radius_km;
        let cap = self.ctx.config.dispatch.idle_captain_notify_cap;

        let requested = self
            .ctx
            .rides
            .list_requested_without_dispatcher(&[])
            .await
            .map_err(transient)?;

        let mut sent = 0usize;
        for entity in requested {
            if sent >= cap {
                break;
            }
            let ride = entity.into_domain();
            let distance_km = haversine_km(location.coordinate, ride.pickup.coordinate);
            if distance_km <= radius {
                self.send(captain_id, OutboundEvent::NewRide { ride });
                sent += 1;
            }
        }
        Ok(())
    }
}

fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    use geo::{HaversineDistance, Point};
    Point::new(a.lon, a.lat).haversine_distance(&Point::new(b.lon, b.lat)) / 1000.0
}
