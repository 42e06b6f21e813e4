use super::error::{InputError, NotaryError};
use super::verify::VerifyUseCase;
use super::workflow::{Workflow, WorkflowState};
use crate::domain::{Digest, Operation, SignedPayload, TransactionIntent, TransactionReceipt};
use crate::infrastructure::{GatewayError, LedgerGateway, NetworkContext, TransactionSigner};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotarizeSettings {
    pub network_passphrase: String,
    pub base_fee: u64,
    /// Contract error code meaning "digest already recorded"
    pub duplicate_error_code: u32,
}

/// Guarded notarization: recheck, then simulate, prepare, sign and broadcast.
///
/// The recheck runs on every call, whatever the caller verified earlier, and a
/// digest found on the ledger never reaches the signer.
pub struct NotarizeUseCase {
    gateway: Arc<dyn LedgerGateway>,
    signer: Arc<dyn TransactionSigner>,
    verify: VerifyUseCase,
    settings: NotarizeSettings,
}

impl NotarizeUseCase {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn TransactionSigner>,
        settings: NotarizeSettings,
    ) -> Self {
        Self {
            verify: VerifyUseCase::new(gateway.clone()),
            gateway,
            signer,
            settings,
        }
    }

    pub async fn execute(
        &self,
        identity: &str,
        content_hash: &str,
    ) -> Result<TransactionReceipt, NotaryError> {
        let mut workflow = Workflow::new(Operation::Notarize);
        self.execute_in(&mut workflow, identity, content_hash).await
    }

    /// Same as [`execute`](Self::execute), recording every step in `workflow`
    pub async fn execute_in(
        &self,
        workflow: &mut Workflow,
        identity: &str,
        content_hash: &str,
    ) -> Result<TransactionReceipt, NotaryError> {
        if let Err(e) = self.validate_identity(identity) {
            return Err(workflow.fail(e));
        }
        let digest = match Digest::from_hex(content_hash) {
            Ok(digest) => digest,
            Err(e) => return Err(workflow.fail(e.into())),
        };
        workflow.fingerprinted(digest);
        self.submit(workflow, identity, digest).await
    }

    fn validate_identity(&self, identity: &str) -> Result<(), NotaryError> {
        if identity.trim().is_empty() {
            return Err(InputError::MissingIdentity.into());
        }
        self.gateway
            .validate_identity(identity)
            .map_err(|e| InputError::InvalidIdentity(e.to_string()).into())
    }

    async fn submit(
        &self,
        workflow: &mut Workflow,
        identity: &str,
        digest: Digest,
    ) -> Result<TransactionReceipt, NotaryError> {
        // Recheck the registry, whatever the caller saw before
        let check = self.verify.check(digest, workflow).await?;
        if check.notarized {
            tracing::warn!(%digest, "refusing to notarize a recorded digest");
            return Err(workflow.fail(NotaryError::DuplicateSubmission(digest)));
        }

        workflow.advance(WorkflowState::Submitting);

        // Hold the identity's lane until the broadcast resolves, so the
        // sequence number read below is still current when the node sees it
        let _lane = self.gateway.submission_lane(identity).await;

        let account = match self.gateway.fetch_account_state(identity).await {
            Ok(account) => account,
            Err(e) => return Err(workflow.fail(self.classify(e, digest))),
        };

        // Simulate the real call, then attach resources and fee
        let intent =
            TransactionIntent::notarize(digest, identity, &account, self.settings.base_fee);
        let simulation = match self.gateway.simulate(&intent).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(workflow.fail(self.classify(e, digest))),
        };

        let prepared = match self.gateway.prepare_resources(intent, &simulation).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(workflow.fail(self.classify(e, digest))),
        };
        tracing::debug!(
            %digest,
            sequence = prepared.intent.sequence,
            fee = prepared.intent.fee_estimate,
            "transaction prepared"
        );

        // Sign
        workflow.advance(WorkflowState::Signing);
        let network = NetworkContext {
            network_passphrase: self.settings.network_passphrase.clone(),
        };
        let envelope = match self
            .signer
            .sign(&prepared.unsigned_envelope, &network, identity)
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%digest, error = %e, "signature not obtained");
                return Err(workflow.fail(NotaryError::SigningDeclined(e.to_string())));
            }
        };

        // Broadcast
        workflow.advance(WorkflowState::Broadcasting);
        let payload = SignedPayload {
            intent: prepared.intent,
            envelope,
        };
        let receipt = match self.gateway.broadcast(&payload).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(workflow.fail(self.classify(e, digest))),
        };

        workflow.advance(WorkflowState::Confirmed);
        tracing::info!(
            %digest,
            transaction_hash = %receipt.transaction_hash,
            "notarization submitted"
        );
        Ok(receipt)
    }

    /// Map a gateway failure from a mutating step onto the caller taxonomy.
    /// A contract refusal with the duplicate code is a business outcome, not an
    /// outage.
    fn classify(&self, error: GatewayError, digest: Digest) -> NotaryError {
        match error {
            GatewayError::ContractRejected(code) if code == self.settings.duplicate_error_code => {
                tracing::warn!(%digest, "contract reports digest already recorded");
                NotaryError::DuplicateSubmission(digest)
            }
            GatewayError::ContractRejected(code) => {
                NotaryError::SubmissionRejected(format!("contract error code {}", code))
            }
            GatewayError::SubmissionRejected(reason) => NotaryError::SubmissionRejected(reason),
            GatewayError::ResourcePreparation(reason) => NotaryError::ResourcePreparation(reason),
            GatewayError::SimulationFailed(reason) | GatewayError::Encoding(reason) => {
                NotaryError::ResourcePreparation(reason)
            }
            GatewayError::InvalidIdentity(reason) => InputError::InvalidIdentity(reason).into(),
            other @ (GatewayError::Transport(_)
            | GatewayError::MalformedResponse(_)
            | GatewayError::Rpc { .. }) => NotaryError::Transport(other.to_string()),
        }
    }
}
