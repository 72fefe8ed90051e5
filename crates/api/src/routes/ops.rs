//! Operational endpoints: liveness and Prometheus scraping.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use checkout::{MirrorStore, PaymentProvider};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use super::checkout::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mirror_enabled: bool,
}

/// GET /health: liveness plus whether checkouts are mirrored.
pub async fn health<P, M>(State(state): State<Arc<AppState<P, M>>>) -> Json<HealthResponse>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    Json(HealthResponse {
        status: "ok",
        mirror_enabled: state.orchestrator.mirror_enabled(),
    })
}

/// GET /metrics: Prometheus text exposition.
pub async fn scrape(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    let content_type = [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")];
    (content_type, handle.render())
}
