//! Coordinate representation standardized at every boundary: (lon, lat).

use serde::{Deserialize, Serialize};
use shared::validation::{validate_latitude, validate_longitude};
use validator::ValidationError;

/// A point on the map. Always longitude first, then latitude — never
/// `{lat,lng}`, never `[lng,lat]` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_longitude(self.lon)?;
        validate_latitude(self.lat)?;
        Ok(())
    }
}

/// A named location: a coordinate plus an optional human-readable place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Place {
    pub fn new(coordinate: Coordinate, name: Option<String>) -> Self {
        Self { coordinate, name }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.coordinate.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_coordinate_passes() {
        let c = Coordinate::new(33.315, 44.360);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn out_of_range_longitude_fails() {
        let c = Coordinate::new(200.0, 44.360);
        assert!(c.validate().is_err());
    }

    #[test]
    fn place_inherits_coordinate_validation() {
        let p = Place::new(Coordinate::new(0.0, 95.0), Some("Depot".into()));
        assert!(p.validate().is_err());
    }
}
