//! Application wiring: `AppState`, middleware stack, and router assembly.

use axum::{middleware, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, optional_user_auth, rate_limit_middleware,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::realtime::{EventRouter, RealtimeContext};

/// Shared state handed to every handler. Deliberately thin: the real-time
/// collaborators (Geo-Index, Session Registry, Dispatch Registry, Ride
/// Sharing Registry) live behind `RealtimeContext`, which this also exposes
/// so the Dispatcher and Background Sweeper can be constructed with the
/// same instances the HTTP layer uses.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiterState>,
    pub realtime: RealtimeContext,
}

impl AppState {
    pub fn realtime_ctx(&self) -> &RealtimeContext {
        &self.realtime
    }

    /// A fresh `EventRouter` bound to this app's `RealtimeContext`. Cheap:
    /// `RealtimeContext` is a handful of `Arc` clones.
    pub fn event_router(&self) -> EventRouter {
        EventRouter::new(self.realtime.clone())
    }
}

/// Builds the router against a `RealtimeContext` the caller already owns,
/// so the same Geo-Index/Session Registry/Dispatch Registry/Ride Sharing
/// Registry instances are shared with the Dispatcher and Background
/// Sweeper (spec §9: "single Application object owns them and injects them
/// into handlers").
pub fn create_app(config: Config, pool: PgPool, realtime: RealtimeContext) -> Router {
    let config = Arc::new(config);

    let rate_limiter = Arc::new(RateLimiterState::new(config.security.rate_limit_per_minute));

    let state = AppState {
        pool,
        config: config.clone(),
        rate_limiter,
        realtime,
    };

    let cors = if config.security.cors_origins.is_empty()
        || config.security.cors_origins.iter().any(|o| o == "*")
    {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    crate::routes::router()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_user_auth,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
