use super::error::NotaryError;
use crate::domain::{Digest, Operation};
use serde::Serialize;

/// Where one invocation currently stands.
///
/// `AlreadyNotarized` and `Clear` end a verify call; a notarize call carries on
/// from `Clear` or fails from `AlreadyNotarized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Fingerprinted,
    Checking,
    AlreadyNotarized,
    Clear,
    Submitting,
    Signing,
    Broadcasting,
    Confirmed,
    Failed,
}

impl WorkflowState {
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Idle, Fingerprinted)
                | (Idle, Failed)
                | (Fingerprinted, Checking)
                | (Checking, AlreadyNotarized)
                | (Checking, Clear)
                | (Checking, Failed)
                | (AlreadyNotarized, Failed)
                | (Clear, Submitting)
                | (Submitting, Signing)
                | (Submitting, Failed)
                | (Signing, Broadcasting)
                | (Signing, Failed)
                | (Broadcasting, Confirmed)
                | (Broadcasting, Failed)
        )
    }

    pub fn is_terminal_for(self, operation: Operation) -> bool {
        match self {
            WorkflowState::Confirmed | WorkflowState::Failed => true,
            WorkflowState::AlreadyNotarized | WorkflowState::Clear => {
                operation == Operation::Verify
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workflow {
    operation: Operation,
    digest: Option<Digest>,
    history: Vec<WorkflowState>,
    failure: Option<&'static str>,
}

impl Workflow {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            digest: None,
            history: vec![WorkflowState::Idle],
            failure: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.history
            .last()
            .copied()
            .unwrap_or(WorkflowState::Idle)
    }

    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    /// Error kind that ended the invocation, if it failed
    pub fn failure(&self) -> Option<&'static str> {
        self.failure
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal_for(self.operation)
    }

    pub fn fingerprinted(&mut self, digest: Digest) -> bool {
        self.digest = Some(digest);
        self.advance(WorkflowState::Fingerprinted)
    }

    /// Move to `next`. An illegal transition is logged and leaves the state
    /// unchanged.
    pub fn advance(&mut self, next: WorkflowState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::error!(
                operation = ?self.operation,
                from = ?current,
                to = ?next,
                "illegal workflow transition"
            );
            return false;
        }
        tracing::debug!(
            operation = ?self.operation,
            digest = ?self.digest,
            from = ?current,
            to = ?next,
            "workflow transition"
        );
        self.history.push(next);
        true
    }

    /// Record a failure and hand the error back for propagation
    pub fn fail(&mut self, error: NotaryError) -> NotaryError {
        self.failure = Some(error.kind());
        self.advance(WorkflowState::Failed);
        error
    }
}
