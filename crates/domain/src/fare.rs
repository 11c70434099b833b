//! Fare computation — a pure function over supplied configuration (spec §1:
//! "Fare computation policies treated as a pure function supplied by
//! configuration").

use chrono::{DateTime, Datelike, Timelike, Utc};

#[derive(Debug, Clone, Copy)]
pub struct FareParams {
    pub base: f64,
    pub per_km: f64,
    pub per_min: f64,
    pub min: f64,
    pub max: f64,
    pub night_multiplier: f64,
    pub weekend_multiplier: f64,
}

/// Computes the fare for a trip of `distance_km`/`duration_min`, clamped to
/// [min, max], with night/weekend multipliers applied (not stacked — the
/// larger of the two applies) at the moment of `at`.
pub fn compute_fare(distance_km: f64, duration_min: f64, at: DateTime<Utc>, params: FareParams) -> f64 {
    let raw = params.base + params.per_km * distance_km + params.per_min * duration_min;

    let is_night = at.hour() < 6 || at.hour() >= 22;
    let is_weekend = matches!(at.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);

    let multiplier = match (is_night, is_weekend) {
        (true, true) => params.night_multiplier.max(params.weekend_multiplier),
        (true, false) => params.night_multiplier,
        (false, true) => params.weekend_multiplier,
        (false, false) => 1.0,
    };

    (raw * multiplier).clamp(params.min, params.max)
}

/// Cancellation fee for a passenger cancelling `elapsed` after requesting.
/// Free inside `min_cancel_window`; the flat `fee` once it has elapsed
/// (spec §4.H, §6's `min-cancel-window`/`cancellation fee` knobs).
pub fn cancellation_fee(elapsed: chrono::Duration, min_cancel_window: chrono::Duration, fee: f64) -> f64 {
    if elapsed < min_cancel_window {
        0.0
    } else {
        fee
    }
}
