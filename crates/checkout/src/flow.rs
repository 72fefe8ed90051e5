//! Checkout flow constants.

/// Step name: create the checkout session on the payment provider.
pub const STEP_CREATE_SESSION: &str = "create_session";

/// Step name: register the mirrored record with the database service.
pub const STEP_REGISTER_MIRROR: &str = "register_mirror";

/// Step name: remove the mirrored record from the database service.
pub const STEP_REMOVE_MIRROR: &str = "remove_mirror";

/// Payment method recorded on every mirrored record.
pub const PAYMENT_METHOD: &str = "Stripe";

/// Status recorded on every newly mirrored record.
pub const MIRROR_STATUS_ACTIVE: &str = "active";

/// Placeholder the provider substitutes with the session ID in redirect URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Currency used when none is configured.
pub const DEFAULT_CURRENCY: &str = "eur";

/// Message returned after a subscription has been cancelled.
pub const CANCELLED_MESSAGE: &str = "Subscription cancelled successfully";
