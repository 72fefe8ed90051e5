//! Mirror store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SessionId;

use crate::error::CheckoutError;
use crate::flow;
use crate::models::{MirrorRecord, MirrorStatus};

/// Trait for the database service that keeps mirrored checkout records.
///
/// `Ok` carries whatever status the service answered with; interpreting it
/// is the caller's job. `Err` means no answer was received.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Registers a mirrored record. Success is `201 Created`.
    async fn register(&self, record: &MirrorRecord) -> Result<MirrorStatus, CheckoutError>;

    /// Removes the record keyed by the provider session ID. Success is `200 OK`.
    async fn remove(&self, session_id: &SessionId) -> Result<MirrorStatus, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryMirrorState {
    records: HashMap<SessionId, MirrorRecord>,
    register_attempts: usize,
    remove_attempts: usize,
    register_status: Option<MirrorStatus>,
    remove_status: Option<MirrorStatus>,
    fail_on_register: bool,
    fail_on_remove: bool,
}

/// In-memory mirror store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMirrorStore {
    state: Arc<RwLock<InMemoryMirrorState>>,
}

impl InMemoryMirrorStore {
    /// Creates a new in-memory mirror store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes register calls answer with `status` without storing anything.
    pub fn set_register_status(&self, status: Option<MirrorStatus>) {
        self.state.write().unwrap().register_status = status;
    }

    /// Makes remove calls answer with `status` without removing anything.
    pub fn set_remove_status(&self, status: Option<MirrorStatus>) {
        self.state.write().unwrap().remove_status = status;
    }

    /// Configures register calls to fail as if the service were unreachable.
    pub fn set_fail_on_register(&self, fail: bool) {
        self.state.write().unwrap().fail_on_register = fail;
    }

    /// Configures remove calls to fail as if the service were unreachable.
    pub fn set_fail_on_remove(&self, fail: bool) {
        self.state.write().unwrap().fail_on_remove = fail;
    }

    /// Returns the number of stored records.
    pub fn record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    /// Returns the record keyed by `session_id`.
    pub fn get_record(&self, session_id: &str) -> Option<MirrorRecord> {
        self.state
            .read()
            .unwrap()
            .records
            .get(&SessionId::from(session_id))
            .cloned()
    }

    /// Returns the number of register calls received.
    pub fn register_attempts(&self) -> usize {
        self.state.read().unwrap().register_attempts
    }

    /// Returns the number of remove calls received.
    pub fn remove_attempts(&self) -> usize {
        self.state.read().unwrap().remove_attempts
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn register(&self, record: &MirrorRecord) -> Result<MirrorStatus, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.register_attempts += 1;

        if state.fail_on_register {
            return Err(CheckoutError::Mirror {
                operation: flow::STEP_REGISTER_MIRROR,
                message: "connection refused".to_string(),
            });
        }
        if let Some(status) = state.register_status {
            return Ok(status);
        }

        state
            .records
            .insert(record.stripe_session_id.clone(), record.clone());
        Ok(MirrorStatus::CREATED)
    }

    async fn remove(&self, session_id: &SessionId) -> Result<MirrorStatus, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.remove_attempts += 1;

        if state.fail_on_remove {
            return Err(CheckoutError::Mirror {
                operation: flow::STEP_REMOVE_MIRROR,
                message: "connection refused".to_string(),
            });
        }
        if let Some(status) = state.remove_status {
            return Ok(status);
        }

        match state.records.remove(session_id) {
            Some(_) => Ok(MirrorStatus::OK),
            None => Ok(MirrorStatus::NOT_FOUND),
        }
    }
}
