//! Domain layer for the ride dispatch core.
//!
//! This crate contains:
//! - The Ride/Session/CaptainLocation model (spec §3)
//! - The Ride State Machine's pure transition rules (spec §4.D)
//! - Fare computation (spec §4.H)
//! - The domain-level error taxonomy (spec §7)
//! - Wire event payload types (spec §4.F)
//!
//! No database, no HTTP — those live in `persistence` and `api`.

pub mod error;
pub mod events;
pub mod fare;
pub mod models;
pub mod state_machine;
