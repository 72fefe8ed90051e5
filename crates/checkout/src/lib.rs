//! Checkout orchestration for payment and subscription sessions.
//!
//! A checkout run creates the session on the payment provider and, when the
//! mirror step is enabled, registers a denormalized record with the database
//! service:
//! 1. Create the provider checkout session
//! 2. Register the mirrored record
//!
//! If step 2 fails, the session created in step 1 is expired before the
//! error is returned.

pub mod error;
pub mod flow;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod settings;
pub mod state;

pub use error::{CheckoutError, ErrorKind};
pub use models::{
    CancellationReceipt, CheckoutMode, CheckoutReceipt, CheckoutRequest, LineItem, MirrorRecord,
    MirrorStatus, NewCheckoutSession, NewRecurringPrice, ProviderSession,
};
pub use orchestrator::CheckoutOrchestrator;
pub use services::{
    HttpMirrorStore, InMemoryMirrorStore, InMemoryPaymentProvider, MirrorStore, PaymentProvider,
    ProviderOperation, StripeProvider,
};
pub use settings::{CheckoutSettings, RecurringInterval, RedirectTargets};
pub use state::{CheckoutRun, CheckoutState};
