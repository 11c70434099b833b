//! Ride entity (database row mapping).
//!
//! `pickup_location`/`dropoff_location` are PostGIS `geography(Point, 4326)`
//! columns, read back as separate lon/lat values via `ST_X`/`ST_Y` — the same
//! split the teacher uses for `trips.start_location`.

use chrono::{DateTime, Utc};
use domain::models::{CancellationReason, Coordinate, PaymentMethod, Place, Ride, RideStatus};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RideEntity {
    pub id: Uuid,
    pub code: String,
    pub passenger_id: Uuid,
    pub captain_id: Option<Uuid>,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_name: Option<String>,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_name: Option<String>,
    pub fare_amount: f64,
    pub currency: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub payment_method: String,
    pub status: String,
    pub is_dispatching: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancellation_fee: Option<f64>,
}

impl RideEntity {
    /// Converts to the domain model. Unrecognized enum text is a data
    /// integrity bug, not a user-facing condition — it panics rather than
    /// silently defaulting, per spec §7's "Fatal" class of error.
    pub fn into_domain(self) -> Ride {
        Ride {
            id: self.id,
            code: self.code,
            passenger_id: self.passenger_id,
            captain_id: self.captain_id,
            pickup: Place::new(
                Coordinate::new(self.pickup_longitude, self.pickup_latitude),
                self.pickup_name,
            ),
            dropoff: Place::new(
                Coordinate::new(self.dropoff_longitude, self.dropoff_latitude),
                self.dropoff_name,
            ),
            fare_amount: self.fare_amount,
            currency: self.currency,
            distance_km: self.distance_km,
            duration_min: self.duration_min,
            payment_method: PaymentMethod::parse(&self.payment_method)
                .expect("payment_method column holds an unrecognized value"),
            status: RideStatus::parse(&self.status)
                .expect("status column holds an unrecognized value"),
            is_dispatching: self.is_dispatching,
            created_at: self.created_at,
            updated_at: self.updated_at,
            accepted_at: self.accepted_at,
            arrived_at: self.arrived_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            cancellation_reason: self
                .cancellation_reason
                .as_deref()
                .map(|raw| CancellationReason::parse(raw).expect("unrecognized cancellation_reason")),
            cancellation_fee: self.cancellation_fee,
        }
    }
}

impl From<RideEntity> for Ride {
    fn from(entity: RideEntity) -> Self {
        entity.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> RideEntity {
        RideEntity {
            id: Uuid::new_v4(),
            code: "AB12CD".into(),
            passenger_id: Uuid::new_v4(),
            captain_id: None,
            pickup_latitude: 44.360,
            pickup_longitude: 33.315,
            pickup_name: None,
            dropoff_latitude: 44.400,
            dropoff_longitude: 33.310,
            dropoff_name: None,
            fare_amount: 6000.0,
            currency: "UAH".into(),
            distance_km: 5.0,
            duration_min: 15.0,
            payment_method: "cash".into(),
            status: "requested".into(),
            is_dispatching: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            accepted_at: None,
            arrived_at: None,
            started_at: None,
            ended_at: None,
            cancellation_reason: None,
            cancellation_fee: None,
        }
    }

    #[test]
    fn converts_into_domain() {
        let ride: Ride = entity().into();
        assert_eq!(ride.status, RideStatus::Requested);
        assert_eq!(ride.pickup.coordinate.lon, 33.315);
    }

    #[test]
    #[should_panic]
    fn unrecognized_status_panics() {
        let mut e = entity();
        e.status = "bogus".into();
        let _: Ride = e.into();
    }
}
