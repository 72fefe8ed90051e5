//! Shared value types used by the checkout orchestrator and its HTTP API.

pub mod types;

pub use types::{Money, SessionId, UserId};
