//! Ride repository — the Ride Store (spec §4.C). `compare_and_set` is the
//! sole primitive used for status transitions; every other mutation path is
//! disallowed by construction (no other `UPDATE` exists on this table).

use chrono::Utc;
use domain::models::{Place, Ride};
use domain::state_machine::Transition;
use sqlx::postgres::Postgres;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::entities::RideEntity;
use crate::metrics::QueryTimer;

const SELECT_COLUMNS: &str = r#"
    id, code, passenger_id, captain_id,
    ST_Y(pickup_location::geometry) as pickup_latitude,
    ST_X(pickup_location::geometry) as pickup_longitude,
    pickup_name,
    ST_Y(dropoff_location::geometry) as dropoff_latitude,
    ST_X(dropoff_location::geometry) as dropoff_longitude,
    dropoff_name,
    fare_amount, currency, distance_km, duration_min, payment_method,
    status, is_dispatching, created_at, updated_at,
    accepted_at, arrived_at, started_at, ended_at, cancellation_reason, cancellation_fee
"#;

/// Input for creating a new ride.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub passenger_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub fare_amount: f64,
    pub currency: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub payment_method: domain::models::PaymentMethod,
}

#[derive(Clone)]
pub struct RideRepository {
    pool: PgPool,
}

impl RideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates a ride, assigning a unique short code. Re-rolls the code on
    /// collision against the unique index, per spec §3.
    pub async fn create(
        &self,
        input: NewRide,
        mut code_candidate: impl FnMut(u32) -> String,
    ) -> Result<RideEntity, sqlx::Error> {
        let timer = QueryTimer::new("ride_create");

        let mut attempt: u32 = 0;
        loop {
            let code = code_candidate(attempt);
            let result = sqlx::query_as::<_, RideEntity>(&format!(
                r#"
                INSERT INTO rides (
                    code, passenger_id, status, is_dispatching,
                    pickup_location, pickup_name, dropoff_location, dropoff_name,
                    fare_amount, currency, distance_km, duration_min, payment_method
                ) VALUES (
                    $1, $2, 'requested', true,
                    ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography, $5,
                    ST_SetSRID(ST_MakePoint($6, $7), 4326)::geography, $8,
                    $9, $10, $11, $12, $13
                )
                ON CONFLICT (code) DO NOTHING
                RETURNING {SELECT_COLUMNS}
                "#
            ))
            .bind(&code)
            .bind(input.passenger_id)
            .bind(input.pickup.coordinate.lon)
            .bind(input.pickup.coordinate.lat)
            .bind(&input.pickup.name)
            .bind(input.dropoff.coordinate.lon)
            .bind(input.dropoff.coordinate.lat)
            .bind(&input.dropoff.name)
            .bind(input.fare_amount)
            .bind(&input.currency)
            .bind(input.distance_km)
            .bind(input.duration_min)
            .bind(input.payment_method.as_str())
            .fetch_optional(&self.pool)
            .await?;

            if let Some(entity) = result {
                timer.record();
                return Ok(entity);
            }

            attempt += 1;
            if attempt > 10 {
                timer.record();
                return Err(sqlx::Error::RowNotFound);
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_get");
        let result = sqlx::query_as::<_, RideEntity>(&format!(
            "SELECT {SELECT_COLUMNS} FROM rides WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_active_for_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_find_active_for_passenger");
        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM rides
               WHERE passenger_id = $1
                 AND status NOT IN ('completed', 'cancelled', 'not_approve')
               LIMIT 1"#
        ))
        .bind(passenger_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_active_for_captain(
        &self,
        captain_id: Uuid,
    ) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_find_active_for_captain");
        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM rides
               WHERE captain_id = $1
                 AND status NOT IN ('completed', 'cancelled', 'not_approve')
               LIMIT 1"#
        ))
        .bind(captain_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// `compareAndSet(id, expectedStatus, patch)` — spec §4.C/§4.D's sole
    /// status-transition primitive. `None` means the precondition failed
    /// (row didn't match `expected`); callers surface this as `Conflict`.
    pub async fn compare_and_set(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_compare_and_set");

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE rides SET status = ");
        qb.push_bind(transition.next.as_str());
        qb.push(", updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(captain_id) = transition.patch.captain_id {
            qb.push(", captain_id = ");
            qb.push_bind(captain_id);
        }
        if let Some(is_dispatching) = transition.patch.is_dispatching {
            qb.push(", is_dispatching = ");
            qb.push_bind(is_dispatching);
        }
        if let Some(accepted_at) = transition.patch.accepted_at {
            qb.push(", accepted_at = ");
            qb.push_bind(accepted_at);
        }
        if let Some(arrived_at) = transition.patch.arrived_at {
            qb.push(", arrived_at = ");
            qb.push_bind(arrived_at);
        }
        if let Some(started_at) = transition.patch.started_at {
            qb.push(", started_at = ");
            qb.push_bind(started_at);
        }
        if let Some(ended_at) = transition.patch.ended_at {
            qb.push(", ended_at = ");
            qb.push_bind(ended_at);
        }
        if let Some(reason) = transition.patch.cancellation_reason {
            qb.push(", cancellation_reason = ");
            qb.push_bind(reason.map(|r| r.wire_reason()));
        }
        if let Some(fee) = transition.patch.cancellation_fee {
            qb.push(", cancellation_fee = ");
            qb.push_bind(fee);
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND status = ");
        qb.push_bind(transition.expected.as_str());
        qb.push(" RETURNING ");
        qb.push(SELECT_COLUMNS);

        let result = qb.build_query_as::<RideEntity>().fetch_optional(&self.pool).await;
        timer.record();
        result
    }

    /// A passenger's most recently completed ride, if it ended at or after
    /// `cutoff` — used by the Event Router's reconnect rehydration (spec
    /// §4.F: "a very recent completed ride, < 30 min, no passenger rating").
    pub async fn find_recent_completed_for_passenger(
        &self,
        passenger_id: Uuid,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_find_recent_completed_for_passenger");
        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM rides
               WHERE passenger_id = $1 AND status = 'completed' AND ended_at >= $2
               ORDER BY ended_at DESC
               LIMIT 1"#
        ))
        .bind(passenger_id)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Rides stuck in `requested` that no in-memory `DispatchProcess` is
    /// currently handling — used by the Background Sweeper (spec §4.G).
    pub async fn list_requested_without_dispatcher(
        &self,
        exclude_ids: &[Uuid],
    ) -> Result<Vec<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("ride_list_requested_without_dispatcher");
        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM rides
               WHERE status = 'requested' AND NOT (id = ANY($1))"#
        ))
        .bind(exclude_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

/// Convenience for call sites that want the domain type directly.
pub async fn get_domain(repo: &RideRepository, id: Uuid) -> Result<Option<Ride>, sqlx::Error> {
    Ok(repo.get(id).await?.map(RideEntity::into_domain))
}
