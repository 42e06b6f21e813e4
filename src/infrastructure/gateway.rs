use super::envelope::{account_key, EnvelopeError};
use super::submission_queue::SubmissionLane;
use crate::domain::{
    AccountState, ConfirmationOutcome, PreparedIntent, SignedPayload, SimulationOutcome,
    TransactionIntent, TransactionReceipt,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed node response: {0}")]
    MalformedResponse(String),

    #[error("Node returned RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Contract rejected the call with error code {0}")]
    ContractRejected(u32),

    #[error("Resource preparation failed: {0}")]
    ResourcePreparation(String),

    #[error("Malformed identity: {0}")]
    InvalidIdentity(String),

    #[error("Could not encode transaction: {0}")]
    Encoding(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
}

/// Remote ledger node as seen by the workflow.
///
/// Implementations translate intents into node calls and carry no business
/// logic: they never decide whether a digest is notarized, only report what the
/// node said.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Well-formedness check for an account identifier. Never touches the network.
    fn validate_identity(&self, identity: &str) -> Result<(), GatewayError>;

    /// Dry-run a contract call against current state. Must not mutate remote state.
    async fn simulate(&self, intent: &TransactionIntent) -> Result<SimulationOutcome, GatewayError>;

    /// Exclusive submission slot for `identity`. Held from the account read
    /// through broadcast, so two submissions from one account never build on
    /// the same sequence number.
    async fn submission_lane(&self, identity: &str) -> SubmissionLane;

    /// Fresh read of the account's sequence context. Never served from a cache.
    async fn fetch_account_state(&self, identity: &str) -> Result<AccountState, GatewayError>;

    async fn prepare_resources(
        &self,
        intent: TransactionIntent,
        outcome: &SimulationOutcome,
    ) -> Result<PreparedIntent, GatewayError>;

    /// Acceptance into the pending pool, not finality
    async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionReceipt, GatewayError>;

    async fn await_confirmation(
        &self,
        transaction_hash: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, GatewayError>;
}

impl From<EnvelopeError> for GatewayError {
    fn from(error: EnvelopeError) -> Self {
        GatewayError::Encoding(error.to_string())
    }
}

/// Well-formedness check for ledger account ids: a checksummed `G...` strkey
pub fn validate_account_id(identity: &str) -> Result<(), GatewayError> {
    account_key(identity)
        .map(|_| ())
        .map_err(|_| GatewayError::InvalidIdentity(format!("{:?} is not an account id", identity)))
}

/// Extract `N` from host error text of the form `Error(Contract, #N)`
pub fn contract_error_code(message: &str) -> Option<u32> {
    let start = message.find("Error(Contract, #")? + "Error(Contract, #".len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
