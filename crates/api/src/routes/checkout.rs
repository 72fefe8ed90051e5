//! Checkout, detail lookup and cancellation endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use checkout::{CheckoutOrchestrator, CheckoutRequest, MirrorStore, PaymentProvider};
use common::{Money, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<P: PaymentProvider, M: MirrorStore> {
    pub orchestrator: CheckoutOrchestrator<P, M>,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub price: Option<i64>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub stripe_session_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutUrlResponse {
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsResponse {
    pub payment_intent: serde_json::Value,
}

#[derive(Serialize)]
pub struct SubscriptionDetailsResponse {
    pub subscription: serde_json::Value,
}

#[derive(Serialize)]
pub struct SessionDetailsResponse {
    pub session: serde_json::Value,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub message: String,
}

// -- Handlers --

/// POST /create-checkout-session/{subject}: start a one-time payment.
#[tracing::instrument(skip(state, payload))]
pub async fn create_checkout_session<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    Path(subject): Path<String>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutUrlResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let request = checkout_request(subject, payload?.0)?;
    let receipt = state.orchestrator.create_payment_session(request).await?;
    Ok(Json(CheckoutUrlResponse { url: receipt.url }))
}

/// POST /create-subscription/{subject}: start a monthly subscription.
#[tracing::instrument(skip(state, payload))]
pub async fn create_subscription<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    Path(subject): Path<String>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutUrlResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let request = checkout_request(subject, payload?.0)?;
    let receipt = state
        .orchestrator
        .create_subscription_session(request)
        .await?;
    Ok(Json(CheckoutUrlResponse { url: receipt.url }))
}

/// POST /get-payment-details: payment intent behind a session.
#[tracing::instrument(skip(state, payload))]
pub async fn payment_details<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    payload: Result<Json<SessionBody>, JsonRejection>,
) -> Result<Json<PaymentDetailsResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let Json(body) = payload?;
    let payment_intent = state
        .orchestrator
        .get_payment_details(body.session_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(PaymentDetailsResponse { payment_intent }))
}

/// POST /get-subscription-details: subscription behind a session.
#[tracing::instrument(skip(state, payload))]
pub async fn subscription_details<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    payload: Result<Json<SessionBody>, JsonRejection>,
) -> Result<Json<SubscriptionDetailsResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let Json(body) = payload?;
    let subscription = state
        .orchestrator
        .get_subscription_details(body.session_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(SubscriptionDetailsResponse { subscription }))
}

/// POST /get-session-details: the raw checkout session.
#[tracing::instrument(skip(state, payload))]
pub async fn session_details<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    payload: Result<Json<SessionBody>, JsonRejection>,
) -> Result<Json<SessionDetailsResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let Json(body) = payload?;
    let session = state
        .orchestrator
        .get_session_details(body.session_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(SessionDetailsResponse { session }))
}

/// POST /cancel-subscription: cancel the subscription and drop its mirror.
#[tracing::instrument(skip(state, payload))]
pub async fn cancel_subscription<P, M>(
    State(state): State<Arc<AppState<P, M>>>,
    payload: Result<Json<CancelBody>, JsonRejection>,
) -> Result<Json<CancelResponse>, ApiError>
where
    P: PaymentProvider + 'static,
    M: MirrorStore + 'static,
{
    let Json(body) = payload?;
    let receipt = state
        .orchestrator
        .cancel_subscription(body.stripe_session_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(CancelResponse {
        message: receipt.message,
    }))
}

fn checkout_request(subject: String, body: CheckoutBody) -> Result<CheckoutRequest, ApiError> {
    let price = body
        .price
        .ok_or_else(|| ApiError::BadRequest("price is required".to_string()))?;

    let mut request = CheckoutRequest::new(subject, Money::from_minor_units(price));
    if let Some(user_id) = body.user_id.and_then(UserId::parse) {
        request = request.for_user(user_id);
    }
    Ok(request)
}
