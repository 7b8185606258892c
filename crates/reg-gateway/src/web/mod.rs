//! The web front-end: registration form and artifact downloads.

mod handlers;
mod types;

pub use handlers::*;
pub use types::*;

use artifact_gen::ArtifactGenerator;
use axum::{
    routing::get,
    Router,
};
use registration_core::WebRegistration;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared web application state.
#[derive(Clone)]
pub struct WebState {
    /// Web-channel registration service
    pub service: Arc<WebRegistration>,
    /// Artifact generator, for token redemption
    pub artifacts: Arc<ArtifactGenerator>,
    /// Server display name shown on the form
    pub server_name: String,
    /// Locale used for web-facing messages
    pub locale: String,
}

/// Create the web router.
pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        .route("/download/config/:token", get(handlers::download_config))
        .route("/download/bundle/:token", get(handlers::download_bundle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
