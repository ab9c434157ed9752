use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `CorsLayer` — only the configured landing origins get CORS headers.
///    Requests without an `Origin` header (curl, server-to-server) pass
///    through untouched.
/// 2. `TraceLayer` — structured request/response logging via `tracing`.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/send-event", post(routes::relay::send_event))
        .route("/test-purchase", post(routes::relay::test_purchase))
        .route("/test-pageview", post(routes::relay::test_pageview))
        .route("/api/tracking", post(routes::tracking::create_tracking))
        .route(
            "/api/tracking/{id}/active-time",
            post(routes::tracking::add_active_time),
        )
        .route("/api/kpis", get(routes::kpis::get_kpis))
        .route("/api/events", get(routes::events::list_events))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
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
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
