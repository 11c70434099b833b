//! The Ride — the authoritative per-trip record (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coordinate::Place;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RideStatus {
    Requested,
    Accepted,
    Arrived,
    OnRide,
    Completed,
    Cancelled,
    NotApprove,
}

impl RideStatus {
    /// Terminal states are immutable: no transition is ever observed out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::NotApprove
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::OnRide => "on_ride",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::NotApprove => "not_approve",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "requested" => RideStatus::Requested,
            "accepted" => RideStatus::Accepted,
            "arrived" => RideStatus::Arrived,
            "on_ride" => RideStatus::OnRide,
            "completed" => RideStatus::Completed,
            "cancelled" => RideStatus::Cancelled,
            "not_approve" => RideStatus::NotApprove,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Wallet,
    Card,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Card => "card",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "cash" => PaymentMethod::Cash,
            "wallet" => PaymentMethod::Wallet,
            "card" => PaymentMethod::Card,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    PassengerCancelled,
    CaptainCancelled,
    NoCaptainsAvailable,
    SystemCancelled,
}

impl CancellationReason {
    pub fn wire_reason(self) -> &'static str {
        match self {
            CancellationReason::PassengerCancelled => "passenger_cancelled",
            CancellationReason::CaptainCancelled => "captain_cancelled",
            CancellationReason::NoCaptainsAvailable => "no_captains_available",
            CancellationReason::SystemCancelled => "system_cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "passenger_cancelled" => CancellationReason::PassengerCancelled,
            "captain_cancelled" => CancellationReason::CaptainCancelled,
            "no_captains_available" => CancellationReason::NoCaptainsAvailable,
            "system_cancelled" => CancellationReason::SystemCancelled,
            _ => return None,
        })
    }
}

/// The Ride record. `Ride Store` persists it; only `compareAndSet` may mutate
/// a row's status — this struct is the shape of the post-image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub code: String,
    pub passenger_id: Uuid,
    pub captain_id: Option<Uuid>,
    pub pickup: Place,
    pub dropoff: Place,
    pub fare_amount: f64,
    pub currency: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub payment_method: PaymentMethod,
    pub status: RideStatus,
    pub is_dispatching: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<CancellationReason>,
    pub cancellation_fee: Option<f64>,
}

impl Ride {
    /// A ride is "active" (non-terminal) if it has not reached a terminal status.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Invariant: status=requested ⇒ captainId=null.
    /// Invariant: status∈{accepted,arrived,onRide,completed} ⇒ captainId≠null.
    pub fn captain_binding_is_consistent(&self) -> bool {
        match self.status {
            RideStatus::Requested | RideStatus::NotApprove => self.captain_id.is_none(),
            RideStatus::Accepted | RideStatus::Arrived | RideStatus::OnRide | RideStatus::Completed => {
                self.captain_id.is_some()
            }
            RideStatus::Cancelled => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(RideStatus::NotApprove.is_terminal());
        assert!(!RideStatus::Requested.is_terminal());
        assert!(!RideStatus::Accepted.is_terminal());
    }

    #[test]
    fn wire_reason_strings_are_stable() {
        assert_eq!(
            CancellationReason::CaptainCancelled.wire_reason(),
            "captain_cancelled"
        );
    }
}
