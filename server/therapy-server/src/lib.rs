//! SpeechCare Server - HTTP API for speech therapy practice
//!
//! Patients upload recorded attempts and answer receptive-language items;
//! therapists read their patients' progress. Everything under `/api/v1`
//! requires an HS256 bearer token (see [`auth`]).

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig, StorageConfig};
pub use error::*;
pub use state::AppState;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// CORS for the configured origins; any origin when none are configured
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Create the main application router with all routes and middleware
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    routes::create_routes(state.max_upload_bytes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(state)
}
