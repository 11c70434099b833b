//! In-memory real-time components (spec §4.A, §4.B, §4.E bookkeeping, §3's
//! RideSharingLink) plus the Event Router that ties them to the Ride Store.

pub mod dispatch_registry;
pub mod event_router;
pub mod geo_index;
pub mod ride_sharing;
pub mod session_registry;

use std::sync::Arc;

use persistence::repositories::ride::RideRepository;

use crate::config::Config;
use dispatch_registry::DispatchRegistry;
use geo_index::GeoIndex;
use ride_sharing::RideSharingRegistry;
use session_registry::SessionRegistry;

pub use event_router::EventRouter;

/// Everything the Dispatcher, the Event Router, and the Background Sweeper
/// share. Deliberately the minimal bundle each needs, not the full
/// `AppState` (which also carries HTTP-only concerns like the rate
/// limiter and JWT config) — spec §9's "single Application object owns
/// them and injects them into handlers" collapsed to this plus `AppState`.
#[derive(Clone)]
pub struct RealtimeContext {
    pub rides: RideRepository,
    pub geo_index: Arc<GeoIndex>,
    pub sessions: Arc<SessionRegistry>,
    pub dispatch_registry: Arc<DispatchRegistry>,
    pub ride_sharing: Arc<RideSharingRegistry>,
    pub config: Arc<Config>,
}

impl RealtimeContext {
    pub fn new(rides: RideRepository, config: Arc<Config>) -> Self {
        Self {
            rides,
            geo_index: Arc::new(GeoIndex::new()),
            sessions: Arc::new(SessionRegistry::new()),
            dispatch_registry: Arc::new(DispatchRegistry::new()),
            ride_sharing: Arc::new(RideSharingRegistry::new()),
            config,
        }
    }
}
