use std::time::Duration;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use http::{HeaderValue, Method, header};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, handlers, middleware_layer, state::AppState};

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️  Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the portal's HTTP surface.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", get(handlers::auth::login))
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/session", get(handlers::auth::current_session))
        .route(
            "/api/session/assume-role",
            post(handlers::auth::assume_role),
        )
        .route(
            "/api/tasks/pending",
            get(handlers::tasks::pending_approvals),
        )
        .route(
            "/api/tasks/{task_id}/approve",
            patch(handlers::tasks::approve),
        )
        .route(
            "/api/tasks/{task_id}/decline",
            patch(handlers::tasks::decline),
        )
        .route(
            "/api/tasks/data-view",
            post(handlers::tasks::submit_data_view),
        )
        .route("/api/data-streams", get(handlers::tasks::data_streams))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_session,
        ))
        .with_state(state.clone());

    // Request headers stay out of spans: they carry the credential cookie.
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config))
}
