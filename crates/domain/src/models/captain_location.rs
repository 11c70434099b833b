//! CaptainLocation — a Geo-Index entry (spec §3).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::coordinate::Coordinate;

#[derive(Debug, Clone, Copy)]
pub struct CaptainLocation {
    pub captain_id: Uuid,
    pub coordinate: Coordinate,
    pub updated_at: DateTime<Utc>,
}

impl CaptainLocation {
    pub fn new(captain_id: Uuid, coordinate: Coordinate) -> Self {
        Self {
            captain_id,
            coordinate,
            updated_at: Utc::now(),
        }
    }

    /// A location older than `ttl` is stale and must be swept from the index.
    pub fn is_stale(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }
}
