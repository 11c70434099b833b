pub mod captain_location;
pub mod coordinate;
pub mod ride;
pub mod session;

pub use captain_location::CaptainLocation;
pub use coordinate::{Coordinate, Place};
pub use ride::{CancellationReason, PaymentMethod, Ride, RideStatus};
pub use session::{ConnectionHandle, Role, Session};
