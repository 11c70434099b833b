//! `POST /ride/request` and `POST /ride/{id}/cancel` (spec §6) — the HTTP
//! surface equivalent to the `requestRide`/`cancelRide` wire events.

use axum::{extract::Path, extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::models::{PaymentMethod, Place, Ride};
use shared::jwt::Role;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::user_auth::UserAuth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideBody {
    pub origin: Place,
    pub destination: Place,
    pub distance_km: f64,
    pub duration_min: f64,
    #[serde(default)]
    pub fare_amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub ride: Ride,
}

pub async fn request_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(body): Json<RequestRideBody>,
) -> Result<Json<RideResponse>, ApiError> {
    require_passenger(&auth)?;
    let router = state.event_router();
    let ride = router
        .request_ride(
            auth.principal_id,
            body.origin,
            body.destination,
            body.distance_km,
            body.duration_min,
            body.fare_amount,
            body.payment_method,
        )
        .await?;
    Ok(Json(RideResponse { ride }))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_passenger(&auth)?;
    let router = state.event_router();
    let ride = router
        .cancel_ride_by_passenger(auth.principal_id, ride_id)
        .await?;
    Ok(Json(RideResponse { ride }))
}

/// Only a passenger-authenticated token may request or cancel a ride on
/// their own behalf (spec §4.F's captain/passenger partitioning).
fn require_passenger(auth: &UserAuth) -> Result<(), ApiError> {
    if auth.role != Role::Passenger {
        return Err(ApiError::Forbidden("passenger role required".into()));
    }
    Ok(())
}
