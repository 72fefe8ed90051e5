//! HTTP route handlers.

pub mod checkout;
pub mod ops;
