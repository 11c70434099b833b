//! RideSharingLink (spec §3) — captainId → passengerId, installed at
//! `accepted`, torn down at any terminal transition or captain cancel.
//! Routes `driverLocationUpdate` to the correct passenger.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct RideSharingLink {
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
}

pub struct RideSharingRegistry {
    links: DashMap<Uuid, RideSharingLink>,
}

impl RideSharingRegistry {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
        }
    }

    pub fn install(&self, captain_id: Uuid, ride_id: Uuid, passenger_id: Uuid) {
        self.links.insert(
            captain_id,
            RideSharingLink {
                ride_id,
                passenger_id,
            },
        );
    }

    pub fn remove(&self, captain_id: Uuid) {
        self.links.remove(&captain_id);
    }

    pub fn lookup(&self, captain_id: Uuid) -> Option<RideSharingLink> {
        self.links.get(&captain_id).map(|e| *e.value())
    }

    /// (captainId, rideId) pairs, for the Sweeper to check against ride
    /// status and drop links whose ride has reached a terminal state.
    pub fn entries(&self) -> Vec<(Uuid, Uuid)> {
        self.links.iter().map(|e| (*e.key(), e.value().ride_id)).collect()
    }
}

impl Default for RideSharingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
