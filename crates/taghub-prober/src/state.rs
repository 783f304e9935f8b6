//! Per-article probe state machine.
//!
//! `Pending -> Probing -> Completed(outcome) -> Recorded(outcome)`.
//! A task rejected by a full pool skips `Probing` and completes as a failure.

use serde::Serialize;

use crate::error::ProbeError;

/// Why a probe counted as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No response within the per-task timeout
    Timeout,
    /// Connection or protocol error
    Error(String),
    /// Response other than 200
    Status(u16),
    /// The pool could not accept the task
    Rejected,
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success(u16),
    Failure(FailureReason),
}

impl ProbeOutcome {
    /// Map an HTTP status to an outcome. Only 200 counts as reachable.
    pub fn from_status(status: u16) -> Self {
        if status == 200 {
            ProbeOutcome::Success(status)
        } else {
            ProbeOutcome::Failure(FailureReason::Status(status))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Probing,
    Completed(ProbeOutcome),
    Recorded(ProbeOutcome),
}

impl ProbeState {
    /// A worker picked the task up.
    pub fn start(self) -> Result<Self, ProbeError> {
        match self {
            ProbeState::Pending => Ok(ProbeState::Probing),
            from => Err(ProbeError::InvalidTransition { from, event: "start" }),
        }
    }

    /// The probe finished, or the pool rejected a pending task.
    pub fn complete(self, outcome: ProbeOutcome) -> Result<Self, ProbeError> {
        match (self, outcome) {
            (ProbeState::Probing, outcome) => Ok(ProbeState::Completed(outcome)),
            (ProbeState::Pending, ProbeOutcome::Failure(FailureReason::Rejected)) => Ok(
                ProbeState::Completed(ProbeOutcome::Failure(FailureReason::Rejected)),
            ),
            (from, _) => Err(ProbeError::InvalidTransition {
                from,
                event: "complete",
            }),
        }
    }

    /// The outcome was written to the article counters.
    pub fn record(self) -> Result<Self, ProbeError> {
        match self {
            ProbeState::Completed(outcome) => Ok(ProbeState::Recorded(outcome)),
            from => Err(ProbeError::InvalidTransition { from, event: "record" }),
        }
    }

    pub fn outcome(&self) -> Option<&ProbeOutcome> {
        match self {
            ProbeState::Completed(outcome) | ProbeState::Recorded(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = ProbeState::Pending
            .start()
            .unwrap()
            .complete(ProbeOutcome::from_status(200))
            .unwrap()
            .record()
            .unwrap();
        assert_eq!(state, ProbeState::Recorded(ProbeOutcome::Success(200)));
    }

    #[test]
    fn test_rejected_skips_probing() {
        let state = ProbeState::Pending
            .complete(ProbeOutcome::Failure(FailureReason::Rejected))
            .unwrap();
        assert!(!state.outcome().unwrap().is_success());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(ProbeState::Pending.record().is_err());
        assert!(ProbeState::Probing.start().is_err());
        assert!(ProbeState::Pending
            .complete(ProbeOutcome::from_status(200))
            .is_err());
        let recorded = ProbeState::Recorded(ProbeOutcome::Success(200));
        assert!(recorded.record().is_err());
    }

    #[test]
    fn test_non_200_is_failure() {
        assert_eq!(
            ProbeOutcome::from_status(301),
            ProbeOutcome::Failure(FailureReason::Status(301))
        );
        assert!(!ProbeOutcome::from_status(500).is_success());
    }
}
