//! Checkout run state machine.

use common::SessionId;

use crate::flow;
use crate::models::CheckoutMode;

/// The state of a checkout run in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► SessionCreated ──┬──► Completed
///                                 └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckoutState {
    /// No provider call has succeeded yet.
    #[default]
    NotStarted,

    /// The provider session exists; the mirror step has not finished.
    SessionCreated,

    /// The mirror step failed and the session is being expired.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if a compensating action may start from this state.
    pub fn can_compensate(&self) -> bool {
        matches!(self, CheckoutState::SessionCreated)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::SessionCreated => "SessionCreated",
            CheckoutState::Compensating => "Compensating",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a single checkout run.
///
/// Lives only for the duration of one request; nothing is persisted.
#[derive(Debug, Clone)]
pub struct CheckoutRun {
    mode: CheckoutMode,
    state: CheckoutState,
    session_id: Option<SessionId>,
    completed_steps: Vec<&'static str>,
    failure_reason: Option<String>,
}

impl CheckoutRun {
    pub fn new(mode: CheckoutMode) -> Self {
        Self {
            mode,
            state: CheckoutState::NotStarted,
            session_id: None,
            completed_steps: Vec::new(),
            failure_reason: None,
        }
    }

    pub fn mode(&self) -> CheckoutMode {
        self.mode
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed_steps
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Records the provider session created by the first step.
    pub fn session_created(&mut self, session_id: SessionId) {
        debug_assert_eq!(self.state, CheckoutState::NotStarted);
        self.session_id = Some(session_id);
        self.completed_steps.push(flow::STEP_CREATE_SESSION);
        self.state = CheckoutState::SessionCreated;
    }

    /// Records a successfully completed step.
    pub fn step_completed(&mut self, step: &'static str) {
        self.completed_steps.push(step);
    }

    /// Starts compensation after `reason` made a step fail.
    ///
    /// Returns false when there is nothing to compensate.
    pub fn start_compensation(&mut self, reason: impl Into<String>) -> bool {
        self.failure_reason = Some(reason.into());
        if !self.state.can_compensate() {
            return false;
        }
        self.state = CheckoutState::Compensating;
        true
    }

    pub fn fail(&mut self) {
        self.state = CheckoutState::Failed;
    }

    pub fn complete(&mut self) {
        self.state = CheckoutState::Completed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(CheckoutState::default(), CheckoutState::NotStarted);
    }

    #[test]
    fn test_can_compensate() {
        assert!(!CheckoutState::NotStarted.can_compensate());
        assert!(CheckoutState::SessionCreated.can_compensate());
        assert!(!CheckoutState::Compensating.can_compensate());
        assert!(!CheckoutState::Completed.can_compensate());
        assert!(!CheckoutState::Failed.can_compensate());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CheckoutState::NotStarted.is_terminal());
        assert!(!CheckoutState::SessionCreated.is_terminal());
        assert!(!CheckoutState::Compensating.is_terminal());
        assert!(CheckoutState::Completed.is_terminal());
        assert!(CheckoutState::Failed.is_terminal());
    }

    #[test]
    fn test_happy_run() {
        let mut run = CheckoutRun::new(CheckoutMode::Payment);
        run.session_created(SessionId::new("cs_1"));
        run.step_completed(flow::STEP_REGISTER_MIRROR);
        run.complete();

        assert_eq!(run.state(), CheckoutState::Completed);
        assert_eq!(run.completed_steps(), &["create_session", "register_mirror"]);
        assert_eq!(run.session_id().map(SessionId::as_str), Some("cs_1"));
        assert!(run.failure_reason().is_none());
    }

    #[test]
    fn test_compensated_run() {
        let mut run = CheckoutRun::new(CheckoutMode::Subscription);
        run.session_created(SessionId::new("cs_2"));

        assert!(run.start_compensation("status 500"));
        assert_eq!(run.state(), CheckoutState::Compensating);
        run.fail();

        assert_eq!(run.state(), CheckoutState::Failed);
        assert_eq!(run.failure_reason(), Some("status 500"));
        assert_eq!(run.completed_steps(), &["create_session"]);
    }

    #[test]
    fn test_nothing_to_compensate_before_session() {
        let mut run = CheckoutRun::new(CheckoutMode::Payment);
        assert!(!run.start_compensation("provider down"));
        assert_eq!(run.state(), CheckoutState::NotStarted);
    }
}
