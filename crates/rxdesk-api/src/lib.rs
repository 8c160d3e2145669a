//! # rxdesk-api
//!
//! REST API layer for rxdesk. Provides the HTTP endpoints for the storefront,
//! the patient portal and the staff dashboard.

pub mod auth;
pub mod cache;
pub mod extract;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod storage;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use rxdesk_common::{config::AppConfig, gateway_event::GatewayEvent};
use rxdesk_db::Database;
use rxdesk_integrations::stripe::StripeClient;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{cache::Caches, storage::LocalStorage};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    /// Broadcast sender to push events to the WebSocket gateway.
    /// Mutations (order placed, prescription reviewed, notification created)
    /// use this to reach connected sessions in real time.
    pub gateway_tx: broadcast::Sender<GatewayEvent>,
    pub storage: LocalStorage,
    pub caches: Caches,
    /// Outbound HTTP client shared by the WordPress and Stripe integrations.
    pub http: reqwest::Client,
    /// `None` when no Stripe secret key is configured.
    pub stripe: Option<StripeClient>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: Database,
        gateway_tx: broadcast::Sender<GatewayEvent>,
    ) -> anyhow::Result<Self> {
        let http = rxdesk_integrations::http_client()?;
        let stripe = config
            .payments
            .secret_key
            .clone()
            .map(|key| StripeClient::new(http.clone(), key));
        if stripe.is_none() {
            tracing::warn!("Stripe secret key not configured; payment endpoints are disabled");
        }

        Ok(Self {
            db,
            storage: LocalStorage::new(&config.storage),
            caches: Caches::new(config.dashboard.cache_ttl_secs),
            gateway_tx,
            http,
            stripe,
            started_at: Instant::now(),
            config,
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);
    let server = &state.config.server;

    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router(state.clone()))
        .merge(routes::users::router(state.clone()))
        .merge(routes::catalog::router(state.clone()))
        .merge(routes::cart::router(state.clone()))
        .merge(routes::orders::router(state.clone()))
        .merge(routes::prescriptions::router(state.clone()))
        .merge(routes::refills::router(state.clone()))
        .merge(routes::transfers::router(state.clone()))
        .merge(routes::appointments::router(state.clone()))
        .merge(routes::contact::router(state.clone()))
        .merge(routes::notifications::router(state.clone()))
        .merge(routes::payments::router(state.clone()))
        .merge(routes::settings::router(state.clone()))
        .merge(routes::wordpress::router(state.clone()))
        .merge(routes::dashboard::router(state.clone()))
        .merge(routes::uploads::router(state.clone()));

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(state.storage.public_dir()))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
