//! apigw-api - HTTP surface of the API gateway
//!
//! Wires the identity resolver, dispatcher and health aggregator behind
//! one axum router.
//!
//! # Usage
//!
//! ```ignore
//! use apigw_api::{create_router, AppState};
//!
//! let state = AppState::new(registry, auth_config)?;
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod state;

pub use error::{ApiError, RequestMeta, REQUEST_ID_HEADER};
pub use middleware::RequestAttribution;
pub use state::AppState;

use axum::http::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, REFERRER_POLICY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::Method;
use axum::routing::{any, get};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .allow_credentials(true)
}

/// Create the gateway router with the given application state
///
/// Unmatched paths and unsupported methods on known paths both answer
/// with the `Route not found` envelope.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Health
        .route("/health", get(handlers::health::liveness))
        .route("/health/detailed", get(handlers::health::detailed))
        .route("/health/service/{name}", get(handlers::health::service))
        // Proxied services
        .route("/api/{service}", any(handlers::proxy::forward))
        .route("/api/{service}/{*rest}", any(handlers::proxy::forward))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_logging,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors_layer(state.allowed_origins()))
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .with_state(state)
}
