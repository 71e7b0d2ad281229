pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod stripe;
pub mod tracing;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: Arc<AppServices>,
    pub event_sender: Arc<EventSender>,
}

/// Envelope for paginated collection responses.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn service_status(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

/// All versioned API routes, nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/listings", handlers::listings::routes())
        .nest("/checkout", handlers::checkout::routes())
        .route("/purchases", get(handlers::checkout::list_purchases))
        .nest("/webhooks", handlers::stripe_webhooks::routes())
}

/// Assembles the full router. Shared between `main` and the integration
/// tests so both exercise the same middleware and routing.
pub fn build_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(service_status))
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .nest("/api/v1", api_v1_routes())
        .layer(Extension(auth_service))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
