//! Request, response and record types exchanged by the orchestrator.

use common::{Money, SessionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::flow;
use crate::settings::RecurringInterval;
use crate::state::CheckoutState;

/// Kind of checkout session to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// One-time payment.
    Payment,
    /// Recurring subscription.
    Subscription,
}

impl CheckoutMode {
    /// Returns the mode name as understood by the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A client's request to start a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Product or service label shown on the checkout page.
    pub subject: String,
    /// Price in minor currency units.
    pub price: Money,
    /// Frontend user; required when the mirror step is enabled.
    pub user_id: Option<UserId>,
}

impl CheckoutRequest {
    /// Creates a request without a user.
    pub fn new(subject: impl Into<String>, price: Money) -> Self {
        Self {
            subject: subject.into(),
            price,
            user_id: None,
        }
    }

    /// Attaches the user the checkout is made for.
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// The single line item of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItem {
    /// Inline price data for a one-time payment.
    Adhoc {
        product_name: String,
        unit_amount: Money,
        currency: String,
    },
    /// Reference to a price object created beforehand.
    Price { price_id: String },
}

/// Parameters for creating a checkout session on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckoutSession {
    pub mode: CheckoutMode,
    pub line_item: LineItem,
    pub success_url: String,
    pub cancel_url: String,
}

/// Parameters for creating a recurring price on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecurringPrice {
    pub product_id: String,
    pub unit_amount: Money,
    pub currency: String,
    pub interval: RecurringInterval,
}

/// A checkout session as returned by the provider on creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSession {
    pub id: SessionId,
    pub url: String,
}

/// Denormalized copy of a checkout kept by the database service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRecord {
    pub user_id: UserId,
    pub stripe_session_id: SessionId,
    pub payment_method: String,
    pub amount_paid: Decimal,
    pub status: String,
}

impl MirrorRecord {
    /// Builds the active record for a freshly created session.
    pub fn active(user_id: UserId, session_id: SessionId, price: Money) -> Self {
        Self {
            user_id,
            stripe_session_id: session_id,
            payment_method: flow::PAYMENT_METHOD.to_string(),
            amount_paid: price.to_major_units(),
            status: flow::MIRROR_STATUS_ACTIVE.to_string(),
        }
    }
}

/// HTTP status reported by the database service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStatus(pub u16);

impl MirrorStatus {
    pub const OK: MirrorStatus = MirrorStatus(200);
    pub const CREATED: MirrorStatus = MirrorStatus(201);
    pub const NOT_FOUND: MirrorStatus = MirrorStatus(404);

    /// Returns true for `201 Created`.
    pub fn is_created(&self) -> bool {
        *self == Self::CREATED
    }

    /// Returns true for `200 OK`.
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

/// Outcome of a successful checkout run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub session_id: SessionId,
    pub url: String,
    pub mode: CheckoutMode,
    pub state: CheckoutState,
    /// Whether a mirrored record was registered.
    pub mirrored: bool,
}

/// Outcome of a successful subscription cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    pub subscription_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_record_wire_format() {
        let record = MirrorRecord::active(
            UserId::parse("user-1").unwrap(),
            SessionId::new("cs_test_1"),
            Money::from_minor_units(1250),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["stripeSessionId"], "cs_test_1");
        assert_eq!(json["paymentMethod"], "Stripe");
        assert_eq!(json["amountPaid"], 12.5);
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_mirror_status_checks() {
        assert!(MirrorStatus(201).is_created());
        assert!(!MirrorStatus(200).is_created());
        assert!(MirrorStatus(200).is_ok());
        assert!(!MirrorStatus(204).is_ok());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(CheckoutMode::Payment.as_str(), "payment");
        assert_eq!(CheckoutMode::Subscription.to_string(), "subscription");
    }
}
