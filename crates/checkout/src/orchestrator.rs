//! Checkout orchestrator for provider sessions and their mirrored records.

use common::{SessionId, UserId};
use serde_json::Value;

use crate::error::CheckoutError;
use crate::flow;
use crate::models::{
    CancellationReceipt, CheckoutMode, CheckoutReceipt, CheckoutRequest, LineItem, MirrorRecord,
    NewCheckoutSession, NewRecurringPrice, ProviderSession,
};
use crate::services::mirror::MirrorStore;
use crate::services::provider::{PaymentProvider, ProviderOperation};
use crate::settings::CheckoutSettings;
use crate::state::CheckoutRun;

/// Orchestrates checkout runs against the payment provider and, when a
/// mirror store is attached, the database service.
///
/// A run creates the provider session first and registers the mirrored
/// record second. If registration fails the session is expired
/// (best-effort) and the registration error is returned.
pub struct CheckoutOrchestrator<P, M>
where
    P: PaymentProvider,
    M: MirrorStore,
{
    provider: P,
    mirror: Option<M>,
    settings: CheckoutSettings,
}

impl<P, M> CheckoutOrchestrator<P, M>
where
    P: PaymentProvider,
    M: MirrorStore,
{
    /// Creates an orchestrator without the mirror step.
    pub fn new(provider: P, settings: CheckoutSettings) -> Self {
        Self {
            provider,
            mirror: None,
            settings,
        }
    }

    /// Creates an orchestrator that mirrors every checkout into `mirror`.
    pub fn with_mirror(provider: P, mirror: M, settings: CheckoutSettings) -> Self {
        Self {
            provider,
            mirror: Some(mirror),
            settings,
        }
    }

    /// Returns true if checkouts are mirrored into the database service.
    pub fn mirror_enabled(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Creates a one-time payment session and returns its redirect URL.
    #[tracing::instrument(skip(self, request), fields(subject = %request.subject, price = %request.price))]
    pub async fn create_payment_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        self.execute(CheckoutMode::Payment, request).await
    }

    /// Creates a product, a recurring price and a subscription session, and
    /// returns the session's redirect URL.
    #[tracing::instrument(skip(self, request), fields(subject = %request.subject, price = %request.price))]
    pub async fn create_subscription_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        self.execute(CheckoutMode::Subscription, request).await
    }

    /// Returns the payment intent behind a checkout session, verbatim.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment_details(&self, session_id: &str) -> Result<Value, CheckoutError> {
        let session_id = parse_session_id(session_id, "sessionId")?;
        let session = self.provider.retrieve_checkout_session(&session_id).await?;
        let payment_intent_id =
            linked_id(&session, "payment_intent").ok_or_else(|| CheckoutError::Provider {
                operation: ProviderOperation::RetrievePaymentIntent.as_str(),
                message: format!("Session {session_id} has no payment intent"),
            })?;
        self.provider
            .retrieve_payment_intent(&payment_intent_id)
            .await
    }

    /// Returns the subscription behind a checkout session, verbatim.
    #[tracing::instrument(skip(self))]
    pub async fn get_subscription_details(&self, session_id: &str) -> Result<Value, CheckoutError> {
        let session_id = parse_session_id(session_id, "sessionId")?;
        let session = self.provider.retrieve_checkout_session(&session_id).await?;
        let subscription_id =
            linked_id(&session, "subscription").ok_or_else(|| CheckoutError::Provider {
                operation: ProviderOperation::RetrieveSubscription.as_str(),
                message: format!("Session {session_id} has no subscription"),
            })?;
        self.provider.retrieve_subscription(&subscription_id).await
    }

    /// Returns the checkout session, verbatim.
    #[tracing::instrument(skip(self))]
    pub async fn get_session_details(&self, session_id: &str) -> Result<Value, CheckoutError> {
        let session_id = parse_session_id(session_id, "sessionId")?;
        self.provider.retrieve_checkout_session(&session_id).await
    }

    /// Cancels the subscription created through a checkout session and
    /// deletes its mirrored record.
    ///
    /// The provider cancellation is not rolled back when the mirror deletion
    /// fails; the error is returned with the subscription already cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        stripe_session_id: &str,
    ) -> Result<CancellationReceipt, CheckoutError> {
        let session_id = parse_session_id(stripe_session_id, "stripeSessionId")?;
        let session = self.provider.retrieve_checkout_session(&session_id).await?;
        let subscription_id = linked_id(&session, "subscription").ok_or_else(|| {
            CheckoutError::validation("No subscription found for this session")
        })?;

        self.provider.cancel_subscription(&subscription_id).await?;
        metrics::counter!("subscription_cancellations_total").increment(1);
        tracing::info!(%session_id, %subscription_id, "provider subscription cancelled");

        if let Some(mirror) = &self.mirror {
            let status = mirror.remove(&session_id).await.inspect_err(|e| {
                tracing::error!(%session_id, %subscription_id, error = %e, "mirror record left behind");
            })?;
            if !status.is_ok() {
                tracing::error!(
                    %session_id,
                    %subscription_id,
                    status = status.as_u16(),
                    "mirror record left behind"
                );
                return Err(CheckoutError::MirrorRejected {
                    operation: flow::STEP_REMOVE_MIRROR,
                    status: status.as_u16(),
                });
            }
        }

        Ok(CancellationReceipt {
            subscription_id,
            message: flow::CANCELLED_MESSAGE.to_string(),
        })
    }

    /// Runs one checkout: validate, create the provider session, mirror it.
    async fn execute(
        &self,
        mode: CheckoutMode,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        metrics::counter!("checkout_runs_total", "mode" => mode.as_str()).increment(1);
        let started = std::time::Instant::now();

        // 1. Validate before touching the provider
        let mirror = self.mirror_target(&request)?;
        if request.price.is_negative() {
            return Err(CheckoutError::validation("price must not be negative"));
        }
        if request.subject.trim().is_empty() {
            return Err(CheckoutError::validation("subject is required"));
        }

        let mut run = CheckoutRun::new(mode);

        // 2. Create the provider session
        let session = match mode {
            CheckoutMode::Payment => self.open_payment_session(&request).await?,
            CheckoutMode::Subscription => self.open_subscription_session(&request).await?,
        };
        run.session_created(session.id.clone());
        metrics::counter!("checkout_sessions_created_total", "mode" => mode.as_str()).increment(1);
        tracing::info!(session_id = %session.id, %mode, "provider session created");

        // 3. Mirror it
        if let Some((mirror, user_id)) = mirror {
            let record = MirrorRecord::active(user_id, session.id.clone(), request.price);
            let failure = match mirror.register(&record).await {
                Ok(status) if status.is_created() => None,
                Ok(status) => Some(CheckoutError::MirrorRejected {
                    operation: flow::STEP_REGISTER_MIRROR,
                    status: status.as_u16(),
                }),
                Err(e) => Some(e),
            };

            if let Some(err) = failure {
                if run.start_compensation(err.to_string()) {
                    self.compensate(&session.id).await;
                }
                run.fail();
                metrics::counter!("checkout_runs_failed", "mode" => mode.as_str()).increment(1);
                metrics::histogram!("checkout_run_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::warn!(
                    session_id = %session.id,
                    %mode,
                    state = %run.state(),
                    reason = run.failure_reason().unwrap_or("unknown"),
                    "checkout run failed"
                );
                return Err(err);
            }
            run.step_completed(flow::STEP_REGISTER_MIRROR);
        }

        run.complete();
        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_run_duration_seconds").record(duration);
        metrics::counter!("checkout_runs_completed", "mode" => mode.as_str()).increment(1);
        tracing::info!(
            session_id = %session.id,
            %mode,
            steps = ?run.completed_steps(),
            duration,
            "checkout run completed"
        );

        Ok(CheckoutReceipt {
            mirrored: run.completed_steps().contains(&flow::STEP_REGISTER_MIRROR),
            session_id: session.id,
            url: session.url,
            mode: run.mode(),
            state: run.state(),
        })
    }

    /// Resolves the mirror store and user a run must register with.
    ///
    /// Fails when mirroring is enabled and the request carries no user.
    fn mirror_target(
        &self,
        request: &CheckoutRequest,
    ) -> Result<Option<(&M, UserId)>, CheckoutError> {
        match &self.mirror {
            None => Ok(None),
            Some(mirror) => {
                let user_id = request
                    .user_id
                    .clone()
                    .ok_or_else(|| CheckoutError::validation("userId is required"))?;
                Ok(Some((mirror, user_id)))
            }
        }
    }

    async fn open_payment_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProviderSession, CheckoutError> {
        let params = self.session_params(
            CheckoutMode::Payment,
            LineItem::Adhoc {
                product_name: request.subject.clone(),
                unit_amount: request.price,
                currency: self.settings.currency.clone(),
            },
        );
        self.provider.create_checkout_session(&params).await
    }

    async fn open_subscription_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProviderSession, CheckoutError> {
        let product_id = self.provider.create_product(&request.subject).await?;
        let price_id = self
            .provider
            .create_recurring_price(&NewRecurringPrice {
                product_id,
                unit_amount: request.price,
                currency: self.settings.currency.clone(),
                interval: self.settings.recurring_interval,
            })
            .await?;

        let params = self.session_params(CheckoutMode::Subscription, LineItem::Price { price_id });
        self.provider.create_checkout_session(&params).await
    }

    fn session_params(&self, mode: CheckoutMode, line_item: LineItem) -> NewCheckoutSession {
        NewCheckoutSession {
            mode,
            line_item,
            success_url: self.settings.redirects.success_url(),
            cancel_url: self.settings.redirects.cancel_url(),
        }
    }

    /// Expires the provider session of a failed run. Failures are logged only.
    #[tracing::instrument(skip(self))]
    async fn compensate(&self, session_id: &SessionId) {
        metrics::counter!("checkout_compensations_total").increment(1);
        match self.provider.expire_checkout_session(session_id).await {
            Ok(()) => tracing::info!(%session_id, "provider session expired"),
            Err(e) => {
                metrics::counter!("checkout_compensation_failures_total").increment(1);
                tracing::error!(%session_id, error = %e, "failed to expire provider session");
            }
        }
    }
}

fn parse_session_id(raw: &str, field: &str) -> Result<SessionId, CheckoutError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CheckoutError::validation(format!("{field} is required")));
    }
    Ok(SessionId::new(raw))
}

/// Reads a reference to another provider object, either as a bare ID or as
/// an expanded object carrying an `id`.
fn linked_id(object: &Value, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(expanded) => expanded.get("id")?.as_str().map(String::from),
        _ => None,
    }
}
