//! HTTP route handlers.

pub mod realtime;
pub mod rides;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ride/request", post(rides::request_ride))
        .route("/ride/:id/cancel", post(rides::cancel_ride))
        .route("/realtime/stream", get(realtime::stream))
        .route("/realtime/location", post(realtime::update_location))
        .route("/realtime/rides/:id/accept", post(realtime::accept_ride))
        .route("/realtime/rides/:id/arrived", post(realtime::arrived))
        .route("/realtime/rides/:id/start", post(realtime::start_ride))
        .route("/realtime/rides/:id/end", post(realtime::end_ride))
        .route("/realtime/rides/:id/cancel", post(realtime::captain_cancel_ride))
}
