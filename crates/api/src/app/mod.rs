//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, token service, hashing, payment gateway
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and envelope helpers
//! - `errors.rs`: error taxonomy and the error envelope

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build services for `settings`, seed the admin account, and return the
/// full router (public entrypoint used by `main.rs`).
pub async fn build_app(settings: Settings) -> anyhow::Result<Router> {
    let services = Arc::new(AppServices::build(settings).await?);
    services.seed_admin().await?;
    Ok(router(services))
}

/// Router over already-built services. Layers run outermost first: trace,
/// error rendering, service injection, caller resolution.
pub fn router(services: Arc<AppServices>) -> Router {
    let env = services.settings.app_env;

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .fallback(errors::route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(env, errors::render_errors))
                .layer(Extension(services.clone()))
                .layer(axum::middleware::from_fn_with_state(
                    services,
                    middleware::resolve_principal,
                )),
        )
}
