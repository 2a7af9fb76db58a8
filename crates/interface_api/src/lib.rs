//! HTTP API Layer
//!
//! Webhook ingress and the claim read API, served with Axum.
//!
//! # Architecture
//!
//! - **Handlers**: webhook receipt, endpoint verification, claim reads, health
//! - **Middleware**: JWT authentication and request logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses, with the webhook envelope
//!   senders expect
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Storage};
//!
//! let state = AppState::new(Storage::postgres(pool), config);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod storage;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use axum::http::HeaderName;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use core_kernel::HealthCheckable;
use domain_claims::{SignatureVerifier, WebhookService};

use crate::config::ApiConfig;
use crate::handlers::{claims, health, webhooks};
use crate::middleware::{auth_middleware, request_log_middleware};

pub use crate::storage::Storage;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WebhookService>,
    pub probes: Arc<Vec<Arc<dyn HealthCheckable>>>,
    pub config: ApiConfig,
}

impl AppState {
    /// Builds the webhook service on `storage`
    ///
    /// Without a configured webhook secret every delivery fails
    /// authentication.
    pub fn new(storage: Storage, config: ApiConfig) -> Self {
        let verifier = match config.webhook_secret.as_deref() {
            Some(secret) if !secret.is_empty() => SignatureVerifier::new(secret),
            _ => {
                warn!("No webhook secret configured; all webhook deliveries will be rejected");
                SignatureVerifier::unprovisioned()
            }
        };

        let service = WebhookService::new(verifier, storage.claims, storage.documents, storage.ledger);
        Self {
            service: Arc::new(service),
            probes: Arc::new(storage.probes),
            config,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route(
            "/webhooks",
            post(webhooks::receive_webhook).get(webhooks::verify_endpoint),
        )
        .layer(axum_middleware::from_fn(request_log_middleware));

    let claims_routes = Router::new()
        .route("/:id", get(claims::get_claim))
        .route("/:id/audit", get(claims::get_audit_trail))
        .route("/:id/timeline", get(claims::get_timeline));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/claims", claims_routes)
        .layer(axum_middleware::from_fn(request_log_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
