//! The Ride State Machine — legal transitions (spec §4.D). Every transition
//! here is realized by exactly one `compareAndSet(id, expected, patch)` at
//! the persistence boundary; this module only decides what that single call
//! should look like, and returns a typed `Conflict` for anything illegal.

use chrono::Utc;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::{CancellationReason, RideStatus};

/// The fields a transition installs. `None` means "leave unchanged"; a
/// `Some(None)` on `captain_id` means "clear it".
#[derive(Debug, Clone, Default)]
pub struct RidePatch {
    pub captain_id: Option<Option<Uuid>>,
    pub is_dispatching: Option<bool>,
    pub accepted_at: Option<Option<chrono::DateTime<Utc>>>,
    pub arrived_at: Option<Option<chrono::DateTime<Utc>>>,
    pub started_at: Option<Option<chrono::DateTime<Utc>>>,
    pub ended_at: Option<Option<chrono::DateTime<Utc>>>,
    pub cancellation_reason: Option<Option<CancellationReason>>,
    pub cancellation_fee: Option<Option<f64>>,
}

/// A decided transition: the status it requires to find in the store
/// (`expected`), the status it installs (`next`), and the patch to apply.
/// The repository's `compare_and_set(id, expected, next, patch)` is the only
/// thing allowed to realize this.
#[derive(Debug, Clone)]
pub struct Transition {
    pub expected: RideStatus,
    pub next: RideStatus,
    pub patch: RidePatch,
}

/// Dispatcher assigns a captain: requested → accepted.
pub fn accept(captain_id: Uuid) -> Transition {
    Transition {
        expected: RideStatus::Requested,
        next: RideStatus::Accepted,
        patch: RidePatch {
            captain_id: Some(Some(captain_id)),
            is_dispatching: Some(false),
            accepted_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    }
}

/// That captain reports arrival: accepted → arrived.
pub fn arrive() -> Transition {
    Transition {
        expected: RideStatus::Accepted,
        next: RideStatus::Arrived,
        patch: RidePatch {
            arrived_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    }
}

/// That captain starts the ride: arrived → onRide.
pub fn start() -> Transition {
    Transition {
        expected: RideStatus::Arrived,
        next: RideStatus::OnRide,
        patch: RidePatch {
            started_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    }
}

/// That captain ends the ride: onRide → completed.
pub fn complete() -> Transition {
    Transition {
        expected: RideStatus::OnRide,
        next: RideStatus::Completed,
        patch: RidePatch {
            ended_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    }
}

/// Passenger cancels from `requested`, `accepted`, or `arrived`. Unbinds the
/// captain (if any); no re-dispatch. Callers must try `from` in the order
/// the ride's current status is known, or attempt all three candidates.
/// `fee` is the cancellation fee already resolved against the configured
/// free window (spec §4.H) — zero inside the window, the flat fee past it.
pub fn cancel_by_passenger(from: RideStatus, fee: f64) -> Option<Transition> {
    if !matches!(
        from,
        RideStatus::Requested | RideStatus::Accepted | RideStatus::Arrived
    ) {
        return None;
    }
    Some(Transition {
        expected: from,
        next: RideStatus::Cancelled,
        patch: RidePatch {
            captain_id: Some(None),
            is_dispatching: Some(false),
            cancellation_reason: Some(Some(CancellationReason::PassengerCancelled)),
            cancellation_fee: Some(Some(fee)),
            ..Default::default()
        },
    })
}

/// Captain cancels after accept: accepted|arrived → requested (re-dispatch).
/// The Dispatcher restarts against a fresh `DispatchProcess`; the cancelling
/// captain is excluded from offers for a cooldown window by the Dispatcher,
/// not by this transition.
pub fn captain_cancel(from: RideStatus) -> Option<Transition> {
    if !matches!(from, RideStatus::Accepted | RideStatus::Arrived) {
        return None;
    }
    Some(Transition {
        expected: from,
        next: RideStatus::Requested,
        patch: RidePatch {
            captain_id: Some(None),
            is_dispatching: Some(true),
            cancellation_reason: Some(Some(CancellationReason::CaptainCancelled)),
            ..Default::default()
        },
    })
}

/// Dispatcher gives up after exhausting the search: requested → notApprove.
pub fn not_approve() -> Transition {
    Transition {
        expected: RideStatus::Requested,
        next: RideStatus::NotApprove,
        patch: RidePatch {
            is_dispatching: Some(false),
            cancellation_reason: Some(Some(CancellationReason::NoCaptainsAvailable)),
            ..Default::default()
        },
    }
}

/// Maps a failed `compareAndSet` (status didn't match `expected`) to the
/// typed `Conflict` spec §4.D mandates: "any failed precondition is reported
/// as a typed Conflict error; never silent."
pub fn conflict(ride_id: Uuid, expected: RideStatus, actual: RideStatus) -> DispatchError {
    DispatchError::Conflict(format!(
        "ride {ride_id}: expected status {:?}, found {:?}",
        expected, actual
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_requires_requested() {
        let t = accept(Uuid::new_v4());
        assert_eq!(t.expected, RideStatus::Requested);
        assert_eq!(t.next, RideStatus::Accepted);
        assert!(t.patch.captain_id.unwrap().is_some());
    }

    #[test]
    fn cancel_by_passenger_rejects_terminal_states() {
        assert!(cancel_by_passenger(RideStatus::Completed, 0.0).is_none());
        assert!(cancel_by_passenger(RideStatus::Cancelled, 0.0).is_none());
        assert!(cancel_by_passenger(RideStatus::NotApprove, 0.0).is_none());
    }

    #[test]
    fn cancel_by_passenger_carries_the_resolved_fee() {
        let t = cancel_by_passenger(RideStatus::Requested, 500.0).unwrap();
        assert_eq!(t.patch.cancellation_fee, Some(Some(500.0)));
    }

    #[test]
    fn captain_cancel_only_from_accepted_or_arrived() {
        assert!(captain_cancel(RideStatus::Requested).is_none());
        let t = captain_cancel(RideStatus::Accepted).unwrap();
        assert_eq!(t.next, RideStatus::Requested);
        assert_eq!(t.patch.captain_id, Some(None));
        assert_eq!(t.patch.is_dispatching, Some(true));
    }

    #[test]
    fn not_approve_clears_dispatching_flag() {
        let t = not_approve();
        assert_eq!(t.patch.is_dispatching, Some(false));
    }
}
