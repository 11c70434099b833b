//! Outbound wire event payloads as a closed, tagged enum (spec §4.F, §9
//! redesign flag: runtime-typed payloads become explicit field types).
//! Inbound requests are plain per-route `Json<T>` bodies instead (see
//! `api::routes::rides`/`api::routes::realtime`) — there is no single
//! multiplexed inbound channel for this transport, only a stream out and
//! ordinary POSTs in.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{CancellationReason, Coordinate, Ride};

/// Events the Event Router delivers outbound. Names are normative for wire
/// compatibility (spec §4.F).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundEvent {
    #[serde(rename = "ridePending")]
    RidePending { ride: Ride },
    #[serde(rename = "rideAccepted")]
    RideAccepted { ride: Ride },
    #[serde(rename = "rideAcceptedConfirmation")]
    RideAcceptedConfirmation { ride: Ride },
    #[serde(rename = "driverArrived")]
    DriverArrived { ride: Ride },
    #[serde(rename = "rideStarted")]
    RideStarted { ride: Ride },
    #[serde(rename = "rideCompleted")]
    RideCompleted { ride: Ride },
    #[serde(rename = "rideCanceled")]
    RideCanceled {
        ride: Ride,
        reason: CancellationReason,
    },
    #[serde(rename = "rideNotApproved")]
    RideNotApproved { ride: Ride },
    #[serde(rename = "driverLocationUpdate")]
    DriverLocationUpdate {
        ride_id: Uuid,
        captain_id: Uuid,
        coordinate: Coordinate,
    },
    #[serde(rename = "newRide")]
    NewRide { ride: Ride },
    #[serde(rename = "rideError")]
    RideError { reason: String },
    #[serde(rename = "restoreRide")]
    RestoreRide { ride: Ride },
    #[serde(rename = "rideRestored")]
    RideRestored { ride: Ride },
}
