//! DispatchError — the abstract error kinds of spec §7, realized as a
//! `thiserror` enum the way the api crate's `ApiError` realizes its own
//! HTTP taxonomy.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed payload (bad coordinates, missing fields). Surface to
    /// client; do not change state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Token missing/invalid. Disconnect.
    #[error("authentication failed")]
    AuthFailed,

    /// Principal's account/state forbids the action.
    #[error("not eligible: {0}")]
    NotEligible(String),

    /// State machine precondition failed (ride taken, wrong status).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Ride or principal missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage or transport hiccup; retried a bounded number of times at the
    /// component boundary before surfacing here.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Invariant violation. Logged at error level, entity refuses further
    /// action.
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

impl DispatchError {
    pub fn ride_not_found(id: Uuid) -> Self {
        DispatchError::NotFound(format!("ride {id} not found"))
    }

    pub fn active_ride_exists(principal: Uuid) -> Self {
        DispatchError::Conflict(format!(
            "principal {principal} already has a non-terminal ride"
        ))
    }

    /// A stable, short reason code shared between the HTTP error surface and
    /// `rideError` wire events, per spec §7's "every refused action is
    /// acknowledged with an event carrying a short, stable reason code".
    pub fn reason_code(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::AuthFailed => "auth_failed",
            DispatchError::NotEligible(_) => "not_eligible",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Transient(_) => "service_error",
            DispatchError::Fatal(_) => "service_error",
        }
    }
}
