//! Payment provider trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SessionId;
use serde_json::{Value, json};

use crate::error::CheckoutError;
use crate::models::{LineItem, NewCheckoutSession, NewRecurringPrice, ProviderSession};

/// Calls the orchestrator makes against the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    CreateSession,
    RetrieveSession,
    ExpireSession,
    CreateProduct,
    CreatePrice,
    RetrievePaymentIntent,
    RetrieveSubscription,
    CancelSubscription,
}

impl ProviderOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOperation::CreateSession => "create_checkout_session",
            ProviderOperation::RetrieveSession => "retrieve_checkout_session",
            ProviderOperation::ExpireSession => "expire_checkout_session",
            ProviderOperation::CreateProduct => "create_product",
            ProviderOperation::CreatePrice => "create_price",
            ProviderOperation::RetrievePaymentIntent => "retrieve_payment_intent",
            ProviderOperation::RetrieveSubscription => "retrieve_subscription",
            ProviderOperation::CancelSubscription => "cancel_subscription",
        }
    }
}

impl std::fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for the payment provider's checkout, catalog and billing API.
///
/// Retrieval methods return the provider's objects verbatim.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a checkout session.
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> Result<ProviderSession, CheckoutError>;

    /// Fetches a checkout session.
    async fn retrieve_checkout_session(&self, session_id: &SessionId)
    -> Result<Value, CheckoutError>;

    /// Expires an open checkout session so it can no longer be paid.
    async fn expire_checkout_session(&self, session_id: &SessionId) -> Result<(), CheckoutError>;

    /// Creates a product and returns its ID.
    async fn create_product(&self, name: &str) -> Result<String, CheckoutError>;

    /// Creates a recurring price and returns its ID.
    async fn create_recurring_price(&self, params: &NewRecurringPrice)
    -> Result<String, CheckoutError>;

    /// Fetches a payment intent.
    async fn retrieve_payment_intent(&self, payment_intent_id: &str)
    -> Result<Value, CheckoutError>;

    /// Fetches a subscription.
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError>;

    /// Cancels a subscription immediately and returns the cancelled object.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    sessions: HashMap<String, Value>,
    products: HashMap<String, String>,
    prices: HashMap<String, (i64, String)>,
    payment_intents: HashMap<String, Value>,
    subscriptions: HashMap<String, Value>,
    calls: Vec<(ProviderOperation, String)>,
    failing: HashSet<ProviderOperation>,
    next_id: u32,
}

impl InMemoryProviderState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_test_{:04}", self.next_id)
    }

    fn record(&mut self, operation: ProviderOperation, target: &str) -> Result<(), CheckoutError> {
        self.calls.push((operation, target.to_string()));
        if self.failing.contains(&operation) {
            return Err(CheckoutError::Provider {
                operation: operation.as_str(),
                message: "Provider configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

fn not_found(operation: ProviderOperation, kind: &str, id: &str) -> CheckoutError {
    CheckoutError::Provider {
        operation: operation.as_str(),
        message: format!("No such {kind}: '{id}'"),
    }
}

/// In-memory payment provider for testing.
///
/// Records every call, and can be configured to fail individual operations.
/// Sessions start `open` with no payment intent or subscription attached;
/// [`complete_session`](Self::complete_session) simulates the customer paying.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryProviderState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory payment provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the given operation to fail on every call.
    pub fn set_fail_on(&self, operation: ProviderOperation, fail: bool) {
        let mut state = self.state.write().unwrap();
        if fail {
            state.failing.insert(operation);
        } else {
            state.failing.remove(&operation);
        }
    }

    /// Returns every operation called so far, in call order.
    pub fn calls(&self) -> Vec<ProviderOperation> {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .map(|(op, _)| *op)
            .collect()
    }

    /// Returns how many times `operation` was called.
    pub fn call_count(&self, operation: ProviderOperation) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    /// Returns the IDs `operation` was called with, in call order.
    pub fn call_targets(&self, operation: ProviderOperation) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, target)| target.clone())
            .collect()
    }

    /// Returns the total number of calls made.
    pub fn total_calls(&self) -> usize {
        self.state.read().unwrap().calls.len()
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().sessions.len()
    }

    /// Returns the `status` field of a session.
    pub fn session_status(&self, session_id: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .sessions
            .get(session_id)
            .and_then(|s| s["status"].as_str().map(String::from))
    }

    /// Returns the `status` field of a subscription.
    pub fn subscription_status(&self, subscription_id: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .subscriptions
            .get(subscription_id)
            .and_then(|s| s["status"].as_str().map(String::from))
    }

    /// Returns the number of products created.
    pub fn product_count(&self) -> usize {
        self.state.read().unwrap().products.len()
    }

    /// Simulates checkout completion: attaches a payment intent (payment mode)
    /// or a subscription (subscription mode) to the session.
    ///
    /// Returns the ID of the attached object.
    pub fn complete_session(&self, session_id: &str) -> Option<String> {
        let mut state = self.state.write().unwrap();
        let session = state.sessions.get(session_id)?.clone();
        let amount = session["amount_total"].clone();
        let currency = session["currency"].clone();

        let (field, id) = if session["mode"] == "subscription" {
            let id = state.next_id("sub");
            let subscription = json!({
                "id": id,
                "object": "subscription",
                "status": "active",
                "currency": currency,
                "items": { "data": [{ "price": { "id": session["price_id"] } }] },
            });
            state.subscriptions.insert(id.clone(), subscription);
            ("subscription", id)
        } else {
            let id = state.next_id("pi");
            let intent = json!({
                "id": id,
                "object": "payment_intent",
                "amount": amount,
                "currency": currency,
                "status": "succeeded",
            });
            state.payment_intents.insert(id.clone(), intent);
            ("payment_intent", id)
        };

        let session = state.sessions.get_mut(session_id)?;
        session[field] = Value::String(id.clone());
        session["status"] = Value::String("complete".to_string());
        session["payment_status"] = Value::String("paid".to_string());
        Some(id)
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> Result<ProviderSession, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::CreateSession, "")?;

        let (amount, currency, price_id) = match &params.line_item {
            LineItem::Adhoc {
                unit_amount,
                currency,
                ..
            } => (unit_amount.minor_units(), currency.clone(), Value::Null),
            LineItem::Price { price_id } => {
                let (amount, currency) = state.prices.get(price_id).cloned().ok_or_else(|| {
                    not_found(ProviderOperation::CreateSession, "price", price_id)
                })?;
                (amount, currency, Value::String(price_id.clone()))
            }
        };

        let id = state.next_id("cs");
        let url = format!("https://checkout.test/c/pay/{id}");
        let session = json!({
            "id": id,
            "object": "checkout.session",
            "mode": params.mode.as_str(),
            "status": "open",
            "payment_status": "unpaid",
            "url": url,
            "amount_total": amount,
            "currency": currency,
            "price_id": price_id,
            "success_url": params.success_url,
            "cancel_url": params.cancel_url,
            "payment_intent": null,
            "subscription": null,
        });
        state.sessions.insert(id.clone(), session);

        Ok(ProviderSession {
            id: SessionId::new(id),
            url,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Value, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::RetrieveSession, session_id.as_str())?;
        state
            .sessions
            .get(session_id.as_str())
            .cloned()
            .ok_or_else(|| {
                not_found(
                    ProviderOperation::RetrieveSession,
                    "checkout.session",
                    session_id.as_str(),
                )
            })
    }

    async fn expire_checkout_session(&self, session_id: &SessionId) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::ExpireSession, session_id.as_str())?;
        let session = state.sessions.get_mut(session_id.as_str()).ok_or_else(|| {
            not_found(
                ProviderOperation::ExpireSession,
                "checkout.session",
                session_id.as_str(),
            )
        })?;
        if session["status"] != "open" {
            return Err(CheckoutError::Provider {
                operation: ProviderOperation::ExpireSession.as_str(),
                message: format!("Session {session_id} is not open"),
            });
        }
        session["status"] = Value::String("expired".to_string());
        session["url"] = Value::Null;
        Ok(())
    }

    async fn create_product(&self, name: &str) -> Result<String, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::CreateProduct, name)?;
        let id = state.next_id("prod");
        state.products.insert(id.clone(), name.to_string());
        Ok(id)
    }

    async fn create_recurring_price(
        &self,
        params: &NewRecurringPrice,
    ) -> Result<String, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::CreatePrice, &params.product_id)?;
        if !state.products.contains_key(&params.product_id) {
            return Err(not_found(
                ProviderOperation::CreatePrice,
                "product",
                &params.product_id,
            ));
        }
        let id = state.next_id("price");
        state.prices.insert(
            id.clone(),
            (params.unit_amount.minor_units(), params.currency.clone()),
        );
        Ok(id)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Value, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::RetrievePaymentIntent, payment_intent_id)?;
        state
            .payment_intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| {
                not_found(
                    ProviderOperation::RetrievePaymentIntent,
                    "payment_intent",
                    payment_intent_id,
                )
            })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::RetrieveSubscription, subscription_id)?;
        state
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                not_found(
                    ProviderOperation::RetrieveSubscription,
                    "subscription",
                    subscription_id,
                )
            })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.record(ProviderOperation::CancelSubscription, subscription_id)?;
        let subscription = state.subscriptions.get_mut(subscription_id).ok_or_else(|| {
            not_found(
                ProviderOperation::CancelSubscription,
                "subscription",
                subscription_id,
            )
        })?;
        subscription["status"] = Value::String("canceled".to_string());
        Ok(subscription.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckoutMode;
    use common::Money;

    fn adhoc_session(amount: i64) -> NewCheckoutSession {
        NewCheckoutSession {
            mode: CheckoutMode::Payment,
            line_item: LineItem::Adhoc {
                product_name: "Coaching".to_string(),
                unit_amount: Money::from_minor_units(amount),
                currency: "eur".to_string(),
            },
            success_url: "http://localhost/profile".to_string(),
            cancel_url: "http://localhost/souscription".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_expire_session() {
        let provider = InMemoryPaymentProvider::new();
        let session = provider
            .create_checkout_session(&adhoc_session(500))
            .await
            .unwrap();
        assert!(session.id.as_str().starts_with("cs_test_"));
        assert_eq!(provider.session_status(session.id.as_str()).as_deref(), Some("open"));

        provider.expire_checkout_session(&session.id).await.unwrap();
        assert_eq!(
            provider.session_status(session.id.as_str()).as_deref(),
            Some("expired")
        );

        // An expired session cannot be expired again.
        assert!(provider.expire_checkout_session(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_on_operation() {
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on(ProviderOperation::CreateSession, true);

        let result = provider.create_checkout_session(&adhoc_session(500)).await;
        assert!(matches!(result, Err(CheckoutError::Provider { .. })));
        assert_eq!(provider.session_count(), 0);
        assert_eq!(provider.call_count(ProviderOperation::CreateSession), 1);
    }

    #[tokio::test]
    async fn test_complete_payment_session_attaches_intent() {
        let provider = InMemoryPaymentProvider::new();
        let session = provider
            .create_checkout_session(&adhoc_session(2500))
            .await
            .unwrap();

        let intent_id = provider.complete_session(session.id.as_str()).unwrap();
        let stored = provider
            .retrieve_checkout_session(&session.id)
            .await
            .unwrap();
        assert_eq!(stored["payment_intent"], intent_id.as_str());
        assert_eq!(stored["mode"], "payment");

        let intent = provider.retrieve_payment_intent(&intent_id).await.unwrap();
        assert_eq!(intent["amount"], 2500);
    }

    #[tokio::test]
    async fn test_recurring_price_requires_product() {
        let provider = InMemoryPaymentProvider::new();
        let result = provider
            .create_recurring_price(&NewRecurringPrice {
                product_id: "prod_missing".to_string(),
                unit_amount: Money::from_minor_units(900),
                currency: "eur".to_string(),
                interval: crate::settings::RecurringInterval::Month,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_provider_errors() {
        let provider = InMemoryPaymentProvider::new();
        let err = provider
            .retrieve_checkout_session(&SessionId::new("cs_unknown"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such checkout.session"));
        assert!(provider.retrieve_subscription("sub_unknown").await.is_err());
        assert!(provider.cancel_subscription("sub_unknown").await.is_err());
    }
}
