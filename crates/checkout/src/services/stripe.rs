//! Stripe REST client implementing [`PaymentProvider`].

use async_trait::async_trait;
use common::SessionId;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CheckoutError;
use crate::models::{LineItem, NewCheckoutSession, NewRecurringPrice, ProviderSession};
use crate::services::path_segment;
use crate::services::provider::{PaymentProvider, ProviderOperation};

/// Production Stripe API host.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

/// Stripe client speaking the form-encoded v1 API with the secret key.
#[derive(Debug, Clone)]
pub struct StripeProvider {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeProvider {
    /// Creates a client for the production API.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE)
    }

    /// Creates a client for an alternative API host.
    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .basic_auth(&self.secret_key, None::<&str>)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .basic_auth(&self.secret_key, None::<&str>)
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client
            .delete(self.url(path))
            .basic_auth(&self.secret_key, None::<&str>)
    }

    async fn send(
        &self,
        operation: ProviderOperation,
        request: RequestBuilder,
    ) -> Result<Value, CheckoutError> {
        let response = request.send().await.map_err(|e| CheckoutError::Provider {
            operation: operation.as_str(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<StripeErrorBody>(&body) {
                Ok(StripeErrorBody {
                    error:
                        StripeErrorDetail {
                            message: Some(message),
                            ..
                        },
                }) => message,
                Ok(StripeErrorBody {
                    error: StripeErrorDetail { kind, .. },
                }) => format!("{} ({})", status, kind.unwrap_or_default()),
                Err(_) => format!("{status}: {body}"),
            };
            tracing::debug!(operation = %operation, %status, "stripe request rejected");
            return Err(CheckoutError::Provider {
                operation: operation.as_str(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CheckoutError::MalformedResponse {
                operation: operation.as_str(),
                message: e.to_string(),
            })
    }

    async fn send_as<T: DeserializeOwned>(
        &self,
        operation: ProviderOperation,
        request: RequestBuilder,
    ) -> Result<T, CheckoutError> {
        let value = self.send(operation, request).await?;
        serde_json::from_value(value).map_err(|e| CheckoutError::MalformedResponse {
            operation: operation.as_str(),
            message: e.to_string(),
        })
    }
}

/// Encodes a checkout session creation as Stripe form fields.
fn session_form(params: &NewCheckoutSession) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("mode", params.mode.as_str().to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("success_url", params.success_url.clone()),
        ("cancel_url", params.cancel_url.clone()),
        ("line_items[0][quantity]", "1".to_string()),
    ];

    match &params.line_item {
        LineItem::Adhoc {
            product_name,
            unit_amount,
            currency,
        } => {
            form.push(("line_items[0][price_data][currency]", currency.clone()));
            form.push((
                "line_items[0][price_data][product_data][name]",
                product_name.clone(),
            ));
            form.push((
                "line_items[0][price_data][unit_amount]",
                unit_amount.minor_units().to_string(),
            ));
        }
        LineItem::Price { price_id } => {
            form.push(("line_items[0][price]", price_id.clone()));
        }
    }

    form
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[tracing::instrument(skip(self, params), fields(mode = %params.mode))]
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> Result<ProviderSession, CheckoutError> {
        let request = self.post("checkout/sessions").form(&session_form(params));
        self.send_as(ProviderOperation::CreateSession, request).await
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Value, CheckoutError> {
        let path = format!("checkout/sessions/{}", path_segment(session_id.as_str())?);
        let request = self.get(&path);
        self.send(ProviderOperation::RetrieveSession, request).await
    }

    async fn expire_checkout_session(&self, session_id: &SessionId) -> Result<(), CheckoutError> {
        let path = format!(
            "checkout/sessions/{}/expire",
            path_segment(session_id.as_str())?
        );
        let request = self.post(&path);
        self.send(ProviderOperation::ExpireSession, request).await?;
        Ok(())
    }

    async fn create_product(&self, name: &str) -> Result<String, CheckoutError> {
        let request = self.post("products").form(&[("name", name)]);
        let product: CreatedObject = self
            .send_as(ProviderOperation::CreateProduct, request)
            .await?;
        Ok(product.id)
    }

    async fn create_recurring_price(
        &self,
        params: &NewRecurringPrice,
    ) -> Result<String, CheckoutError> {
        let form = [
            ("product", params.product_id.clone()),
            ("currency", params.currency.clone()),
            ("recurring[interval]", params.interval.as_str().to_string()),
            ("unit_amount", params.unit_amount.minor_units().to_string()),
        ];
        let request = self.post("prices").form(&form);
        let price: CreatedObject = self.send_as(ProviderOperation::CreatePrice, request).await?;
        Ok(price.id)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Value, CheckoutError> {
        let path = format!("payment_intents/{}", path_segment(payment_intent_id)?);
        let request = self.get(&path);
        self.send(ProviderOperation::RetrievePaymentIntent, request)
            .await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError> {
        let path = format!("subscriptions/{}", path_segment(subscription_id)?);
        let request = self.get(&path);
        self.send(ProviderOperation::RetrieveSubscription, request)
            .await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError> {
        let path = format!("subscriptions/{}", path_segment(subscription_id)?);
        let request = self.delete(&path);
        self.send(ProviderOperation::CancelSubscription, request)
            .await
    }
}
