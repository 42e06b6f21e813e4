use super::error::NotaryError;
use super::workflow::{Workflow, WorkflowState};
use crate::domain::{
    ContractValue, Detail, Digest, Operation, TransactionIntent, VerificationResult,
};
use crate::infrastructure::LedgerGateway;
use std::sync::Arc;

/// Read-only lookup of a digest against the contract's `verify` entry point
#[derive(Clone)]
pub struct VerifyUseCase {
    gateway: Arc<dyn LedgerGateway>,
}

impl VerifyUseCase {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    pub async fn execute(&self, content_hash: &str) -> Result<VerificationResult, NotaryError> {
        let mut workflow = Workflow::new(Operation::Verify);
        let digest = match Digest::from_hex(content_hash) {
            Ok(digest) => digest,
            Err(e) => return Err(workflow.fail(e.into())),
        };
        workflow.fingerprinted(digest);
        self.lookup(digest, &mut workflow).await
    }

    /// The Checking step plus owner and timestamp when the digest is recorded
    pub async fn lookup(
        &self,
        digest: Digest,
        workflow: &mut Workflow,
    ) -> Result<VerificationResult, NotaryError> {
        let result = self.check(digest, workflow).await?;
        if !result.notarized {
            return Ok(result);
        }
        Ok(self.with_details(result).await)
    }

    /// The Checking step. Simulates `verify(digest)` from the placeholder
    /// account; nothing is signed or broadcast.
    ///
    /// Any gateway failure is reported as a transport error, never as "not
    /// notarized".
    pub async fn check(
        &self,
        digest: Digest,
        workflow: &mut Workflow,
    ) -> Result<VerificationResult, NotaryError> {
        workflow.advance(WorkflowState::Checking);

        let intent = TransactionIntent::verify(digest);
        let outcome = match self.gateway.simulate(&intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(%digest, error = %e, "verification unavailable");
                return Err(workflow.fail(NotaryError::Transport(format!(
                    "verification unavailable: {}",
                    e
                ))));
            }
        };

        match outcome.return_value {
            ContractValue::Bool(true) => {
                workflow.advance(WorkflowState::AlreadyNotarized);
                tracing::info!(%digest, "digest already notarized");
                Ok(VerificationResult::notarized(digest))
            }
            ContractValue::Bool(false) => {
                workflow.advance(WorkflowState::Clear);
                tracing::info!(%digest, "digest not notarized");
                Ok(VerificationResult::not_notarized(digest))
            }
            other => Err(workflow.fail(NotaryError::Transport(format!(
                "verification unavailable: unexpected return value {:?}",
                other
            )))),
        }
    }

    /// Best effort: a deployment without `get_details`, or any failure, leaves
    /// the fields unavailable and the verdict untouched.
    async fn with_details(&self, mut result: VerificationResult) -> VerificationResult {
        let intent = TransactionIntent::details(result.digest);
        match self.gateway.simulate(&intent).await {
            Ok(outcome) => match outcome.return_value {
                ContractValue::Record(Some(record)) => {
                    result.owner = Some(Detail::Known(record.owner));
                    result.timestamp = Some(Detail::Known(record.timestamp));
                }
                other => {
                    tracing::debug!(digest = %result.digest, value = ?other, "no record details")
                }
            },
            Err(e) => {
                tracing::debug!(digest = %result.digest, error = %e, "record details unavailable")
            }
        }
        result
    }
}
