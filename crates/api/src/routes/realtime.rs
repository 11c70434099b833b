//! SSE stream endpoint plus the inbound action endpoints captains and
//! passengers use to drive the wire protocol (spec §4.F, §6). Outbound
//! delivery is SSE fan-out per connection, grounded on the kawaemon
//! `chair_get_notification`/`chair_post_ride_status` pairing: one long-lived
//! stream for server→client events, plain POSTs for client→server actions.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use domain::events::OutboundEvent;
use domain::models::session::ConnectionHandle;
use domain::models::Coordinate;
use shared::jwt::Role;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::user_auth::UserAuth;
use crate::realtime::session_registry::SessionRegistry;
use crate::routes::rides::RideResponse;

/// Detaches the session on stream drop (disconnect, error, or client going
/// away) regardless of which path ended the stream.
struct DetachGuard {
    sessions: Arc<SessionRegistry>,
    principal_id: Uuid,
    handle: ConnectionHandle,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.sessions.detach(self.principal_id, self.handle);
    }
}

struct GuardedStream<S> {
    inner: S,
    _guard: DetachGuard,
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

pub async fn stream(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ctx = state.realtime_ctx();
    let (session, receiver) = ctx.sessions.attach(auth.principal_id, auth.role);

    let router = state.event_router();
    let rehydrate_principal = auth.principal_id;
    let rehydrate_role = auth.role;
    tokio::spawn(async move {
        if let Err(error) = router.rehydrate(rehydrate_principal, rehydrate_role).await {
            tracing::warn!(principal_id = %rehydrate_principal, %error, "rehydration failed");
        }
    });

    let guard = DetachGuard {
        sessions: ctx.sessions.clone(),
        principal_id: auth.principal_id,
        handle: session.handle,
    };

    let events = ReceiverStream::new(receiver).map(|event| Ok(to_sse_event(&event)));
    let guarded = GuardedStream {
        inner: events,
        _guard: guard,
    };

    Sse::new(guarded).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &OutboundEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(sse_event) => sse_event,
        Err(error) => {
            tracing::error!(%error, "failed to serialize outbound event");
            Event::default().event("rideError").data("{\"reason\":\"service_error\"}")
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationBody {
    pub lon: f64,
    pub lat: f64,
}

pub async fn update_location(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(body): Json<UpdateLocationBody>,
) -> Result<(), ApiError> {
    require_captain(&auth)?;
    state
        .event_router()
        .update_location(auth.principal_id, Coordinate::new(body.lon, body.lat))?;
    Ok(())
}

pub async fn accept_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_captain(&auth)?;
    let ride = state.event_router().accept_ride(auth.principal_id, ride_id).await?;
    Ok(Json(RideResponse { ride }))
}

pub async fn arrived(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_captain(&auth)?;
    let ride = state.event_router().arrived(auth.principal_id, ride_id).await?;
    Ok(Json(RideResponse { ride }))
}

pub async fn start_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_captain(&auth)?;
    let ride = state.event_router().start_ride(auth.principal_id, ride_id).await?;
    Ok(Json(RideResponse { ride }))
}

pub async fn end_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_captain(&auth)?;
    let ride = state.event_router().end_ride(auth.principal_id, ride_id).await?;
    Ok(Json(RideResponse { ride }))
}

pub async fn captain_cancel_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    require_captain(&auth)?;
    let ride = state
        .event_router()
        .captain_cancel_ride(auth.principal_id, ride_id)
        .await?;
    Ok(Json(RideResponse { ride }))
}

/// Only a captain-authenticated token may drive the captain-side actions
/// (spec §4.F's captain/passenger partitioning).
fn require_captain(auth: &UserAuth) -> Result<(), ApiError> {
    if auth.role != Role::Captain {
        return Err(ApiError::Forbidden("captain role required".into()));
    }
    Ok(())
}
