use super::digest::Digest;
use serde::{Deserialize, Serialize};

/// Account used as the source of read-only simulations. It never signs and is
/// never broadcast, so it needs no real sequence number.
pub const PLACEHOLDER_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

/// Network minimum inclusion fee per operation, in stroops
pub const MIN_BASE_FEE: u64 = 100;

/// Contract entry point targeted by an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Verify,
    Notarize,
    /// Owner and timestamp lookup; not every deployment exposes it
    Details,
}

impl Operation {
    pub fn function_name(self) -> &'static str {
        match self {
            Operation::Verify => "verify",
            Operation::Notarize => "notarize",
            Operation::Details => "get_details",
        }
    }

    pub fn is_mutating(self) -> bool {
        matches!(self, Operation::Notarize)
    }
}

/// Sequence context required to build a valid transaction for an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: String,
    pub sequence: i64,
}

impl AccountState {
    pub fn placeholder() -> Self {
        Self {
            account_id: PLACEHOLDER_ACCOUNT.to_string(),
            sequence: 0,
        }
    }

    /// Sequence number the next transaction from this account must carry
    pub fn next_sequence(&self) -> i64 {
        self.sequence.saturating_add(1)
    }
}

/// One invocation attempt against the contract.
///
/// Built fresh for every call and dropped once the call resolves; intents are
/// never reused after a failed broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub operation: Operation,
    pub digest: Digest,
    pub owner: Option<String>,
    pub source_account: String,
    pub sequence: i64,
    pub fee_estimate: u64,
    /// Base64 resource data from simulation, attached during preparation
    pub footprint: Option<String>,
    /// Base64 authorization entries the simulation asked for
    pub authorization: Vec<String>,
}

impl TransactionIntent {
    pub fn verify(digest: Digest) -> Self {
        Self::read_only(Operation::Verify, digest)
    }

    pub fn details(digest: Digest) -> Self {
        Self::read_only(Operation::Details, digest)
    }

    fn read_only(operation: Operation, digest: Digest) -> Self {
        let source = AccountState::placeholder();
        Self {
            operation,
            digest,
            owner: None,
            source_account: source.account_id,
            sequence: source.sequence,
            fee_estimate: MIN_BASE_FEE,
            footprint: None,
            authorization: Vec::new(),
        }
    }

    pub fn notarize(digest: Digest, owner: &str, account: &AccountState, base_fee: u64) -> Self {
        Self {
            operation: Operation::Notarize,
            digest,
            owner: Some(owner.to_string()),
            source_account: account.account_id.clone(),
            sequence: account.next_sequence(),
            fee_estimate: base_fee.max(MIN_BASE_FEE),
            footprint: None,
            authorization: Vec::new(),
        }
    }
}

/// Stored record for a digest, as reported by `get_details`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    pub owner: String,
    pub timestamp: i64,
}

/// Decoded return value of a simulated contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValue {
    Bool(bool),
    Void,
    /// `get_details` answer; `None` when the digest has no record
    Record(Option<RecordDetails>),
    /// Any other value type, by XDR type name
    Other(&'static str),
}

/// Result of a non-committing dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub return_value: ContractValue,
    pub min_resource_fee: u64,
    pub transaction_data: Option<String>,
    pub authorization: Vec<String>,
    pub latest_ledger: u32,
}

/// An intent whose fee and footprint have been filled in, plus the unsigned
/// envelope ready to hand to a signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedIntent {
    pub intent: TransactionIntent,
    pub unsigned_envelope: String,
}

/// Envelope returned by the signer, still tied to the intent it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub intent: TransactionIntent,
    pub envelope: String,
}
