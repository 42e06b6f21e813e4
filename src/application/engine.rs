use super::error::{InputError, NotaryError};
use super::notarize::{NotarizeSettings, NotarizeUseCase};
use super::verify::VerifyUseCase;
use super::workflow::Workflow;
use crate::config::NotaryConfig;
use crate::domain::{
    fingerprint, fingerprint_file, ConfirmationOutcome, Digest, Operation, TransactionReceipt,
    VerificationResult,
};
use crate::infrastructure::{LedgerGateway, TransactionSigner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

impl From<&NotaryConfig> for NotarizeSettings {
    fn from(config: &NotaryConfig) -> Self {
        Self {
            network_passphrase: config.network_passphrase.clone(),
            base_fee: config.base_fee,
            duplicate_error_code: config.duplicate_error_code,
        }
    }
}

/// Entry point for callers: fingerprint, check and submit.
///
/// The engine holds no per-call state, so one instance can serve many
/// concurrent invocations.
pub struct NotarizationEngine {
    gateway: Arc<dyn LedgerGateway>,
    verify: VerifyUseCase,
    notarize: NotarizeUseCase,
}

impl NotarizationEngine {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn TransactionSigner>,
        settings: NotarizeSettings,
    ) -> Self {
        Self {
            verify: VerifyUseCase::new(gateway.clone()),
            notarize: NotarizeUseCase::new(gateway.clone(), signer, settings),
            gateway,
        }
    }

    pub fn fingerprint(content: &[u8]) -> Digest {
        fingerprint(content)
    }

    pub fn fingerprint_path(path: &Path) -> Result<Digest, NotaryError> {
        fingerprint_file(path).map_err(|source| {
            InputError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    pub async fn check_notarization(
        &self,
        content_hash: &str,
    ) -> Result<VerificationResult, NotaryError> {
        self.verify.execute(content_hash).await
    }

    pub async fn check_content(&self, content: &[u8]) -> Result<VerificationResult, NotaryError> {
        let mut workflow = Workflow::new(Operation::Verify);
        let digest = fingerprint(content);
        workflow.fingerprinted(digest);
        self.verify.lookup(digest, &mut workflow).await
    }

    pub async fn submit_notarization(
        &self,
        identity: &str,
        content_hash: &str,
    ) -> Result<TransactionReceipt, NotaryError> {
        self.notarize.execute(identity, content_hash).await
    }

    /// Like [`submit_notarization`](Self::submit_notarization) but exposes the
    /// state history of the invocation
    pub async fn submit_traced(
        &self,
        identity: &str,
        content_hash: &str,
    ) -> (Result<TransactionReceipt, NotaryError>, Workflow) {
        let mut workflow = Workflow::new(Operation::Notarize);
        let result = self
            .notarize
            .execute_in(&mut workflow, identity, content_hash)
            .await;
        (result, workflow)
    }

    pub async fn notarize_content(
        &self,
        identity: &str,
        content: &[u8],
    ) -> Result<TransactionReceipt, NotaryError> {
        let digest = fingerprint(content);
        self.notarize.execute(identity, &digest.to_hex()).await
    }

    /// Wait for finality of a submitted transaction. A timeout is an outcome,
    /// not an error.
    pub async fn await_confirmation(
        &self,
        transaction_hash: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, NotaryError> {
        if transaction_hash.trim().is_empty() {
            return Err(InputError::MissingTransactionHash.into());
        }
        let outcome = self
            .gateway
            .await_confirmation(transaction_hash, timeout)
            .await
            .map_err(|e| NotaryError::Transport(e.to_string()))?;
        tracing::info!(transaction_hash, ?outcome, "confirmation wait finished");
        Ok(outcome)
    }
}
