//! Checkout error types.

use thiserror::Error;

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A required field is missing or invalid.
    #[error("{0}")]
    Validation(String),

    /// The payment provider returned an error or could not be reached.
    #[error("Payment provider error during {operation}: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    /// The database service could not be reached.
    #[error("Database service error during {operation}: {message}")]
    Mirror {
        operation: &'static str,
        message: String,
    },

    /// The database service answered with an unexpected status.
    #[error("Database service rejected {operation} with status {status}")]
    MirrorRejected { operation: &'static str, status: u16 },

    /// A dependency answered with a body that could not be interpreted.
    #[error("Malformed response during {operation}: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

/// Coarse classification of a [`CheckoutError`], used to pick the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid client input.
    Validation,
    /// Failure of the payment provider or the database service.
    Dependency,
    /// Anything else.
    Unknown,
}

impl CheckoutError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        CheckoutError::Validation(message.into())
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Validation(_) => ErrorKind::Validation,
            CheckoutError::Provider { .. }
            | CheckoutError::Mirror { .. }
            | CheckoutError::MirrorRejected { .. }
            | CheckoutError::MalformedResponse { .. } => ErrorKind::Dependency,
            CheckoutError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}
