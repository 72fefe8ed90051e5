//! HTTP API server with observability for the checkout orchestrator.
//!
//! Exposes the checkout, detail lookup and cancellation endpoints consumed by
//! the frontend, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CheckoutOrchestrator, HttpMirrorStore, MirrorStore, PaymentProvider, StripeProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::checkout::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<P, M>(state: Arc<AppState<P, M>>, metrics_handle: PrometheusHandle) -> Router
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::scrape))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<P, M>))
        .route(
            "/create-checkout-session/{subject}",
            post(routes::checkout::create_checkout_session::<P, M>),
        )
        .route(
            "/create-subscription/{subject}",
            post(routes::checkout::create_subscription::<P, M>),
        )
        .route(
            "/get-payment-details",
            post(routes::checkout::payment_details::<P, M>),
        )
        .route(
            "/get-subscription-details",
            post(routes::checkout::subscription_details::<P, M>),
        )
        .route(
            "/get-session-details",
            post(routes::checkout::session_details::<P, M>),
        )
        .route(
            "/cancel-subscription",
            post(routes::checkout::cancel_subscription::<P, M>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps an orchestrator into shared application state.
pub fn create_state<P, M>(orchestrator: CheckoutOrchestrator<P, M>) -> Arc<AppState<P, M>>
where
    P: PaymentProvider,
    M: MirrorStore,
{
    Arc::new(AppState { orchestrator })
}

/// Creates the production state: Stripe as provider, the database service
/// as mirror store when enabled.
pub fn create_default_state(config: &Config) -> Arc<AppState<StripeProvider, HttpMirrorStore>> {
    let provider =
        StripeProvider::with_api_base(config.stripe_secret_key.as_str(), config.stripe_api_base.as_str());
    let settings = config.checkout_settings();

    let orchestrator = match (&config.db_service_url, config.mirror_enabled) {
        (Some(db_url), true) => {
            CheckoutOrchestrator::with_mirror(provider, HttpMirrorStore::new(db_url.as_str()), settings)
        }
        _ => CheckoutOrchestrator::new(provider, settings),
    };

    create_state(orchestrator)
}
