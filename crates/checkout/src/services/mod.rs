//! External service traits, HTTP clients and in-memory implementations.

pub mod database;
pub mod mirror;
pub mod provider;
pub mod stripe;

pub use database::HttpMirrorStore;
pub use mirror::{InMemoryMirrorStore, MirrorStore};
pub use provider::{InMemoryPaymentProvider, PaymentProvider, ProviderOperation};
pub use stripe::StripeProvider;

use crate::error::CheckoutError;

/// Percent-encodes an identifier as exactly one URL path segment.
///
/// Dot segments are rejected: URL normalisation resolves them (encoded or
/// not) against the parent path.
pub(crate) fn path_segment(id: &str) -> Result<String, CheckoutError> {
    match id {
        "" | "." | ".." => Err(CheckoutError::validation(format!(
            "invalid identifier {id:?}"
        ))),
        _ => Ok(urlencoding::encode(id).into_owned()),
    }
}
