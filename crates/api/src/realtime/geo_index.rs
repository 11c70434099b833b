//! Geo-Index (spec §4.A) — a concurrent map of online captain locations,
//! answering "captains within r km of P, nearest first".

use dashmap::DashMap;
use domain::models::{CaptainLocation, Coordinate};
use geo::{HaversineDistance, Point};
use uuid::Uuid;

/// Concurrent captain-location store. `nearby` snapshots are consistent but
/// may not reflect an `upsert` started after the query began (spec §5).
pub struct GeoIndex {
    entries: DashMap<Uuid, CaptainLocation>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Last write wins.
    pub fn upsert(&self, captain_id: Uuid, coordinate: Coordinate) {
        self.entries
            .insert(captain_id, CaptainLocation::new(captain_id, coordinate));
    }

    pub fn remove(&self, captain_id: Uuid) {
        self.entries.remove(&captain_id);
    }

    pub fn get(&self, captain_id: Uuid) -> Option<CaptainLocation> {
        self.entries.get(&captain_id).map(|e| *e.value())
    }

    /// Captains within `radius_km` of `center`, ascending by distance.
    pub fn nearby(&self, center: Coordinate, radius_km: f64) -> Vec<(Uuid, f64)> {
        let origin = Point::new(center.lon, center.lat);
        let mut results: Vec<(Uuid, f64)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let loc = entry.value();
                let point = Point::new(loc.coordinate.lon, loc.coordinate.lat);
                let distance_km = origin.haversine_distance(&point) / 1000.0;
                (distance_km <= radius_km).then_some((loc.captain_id, distance_km))
            })
            .collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results
    }

    /// Removes entries older than `ttl`. Used by the Background Sweeper
    /// (spec §4.G). Returns the count reaped.
    pub fn reap_stale(&self, ttl: chrono::Duration) -> usize {
        let now = chrono::Utc::now();
        let stale: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|e| e.value().is_stale(ttl, now))
            .map(|e| *e.key())
            .collect();
        for id in &stale {
            self.entries.remove(id);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    #[test]
    fn nearby_orders_ascending_by_distance() {
        let index = GeoIndex::new();
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        index.upsert(near, coord(33.316, 44.361));
        index.upsert(far, coord(33.500, 44.600));

        let results = index.nearby(coord(33.315, 44.360), 50.0);
        assert_eq!(results[0].0, near);
        assert!(results[0].1 < results[1].1);
    }

    #[test]
    fn nearby_excludes_captains_outside_radius() {
        let index = GeoIndex::new();
        let captain = Uuid::new_v4();
        index.upsert(captain, coord(34.5, 45.5));

        let results = index.nearby(coord(33.315, 44.360), 2.0);
        assert!(results.is_empty());
    }

    #[test]
    fn remove_drops_entry() {
        let index = GeoIndex::new();
        let captain = Uuid::new_v4();
        index.upsert(captain, coord(33.315, 44.360));
        index.remove(captain);
        assert!(index.get(captain).is_none());
    }

    #[test]
    fn reap_stale_removes_old_entries_only() {
        let index = GeoIndex::new();
        let captain = Uuid::new_v4();
        index.upsert(captain, coord(33.315, 44.360));
        let reaped = index.reap_stale(chrono::Duration::seconds(60));
        assert_eq!(reaped, 0);
        assert!(index.get(captain).is_some());
    }
}
