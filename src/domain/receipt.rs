use super::digest::Digest;
use serde::{Deserialize, Serialize};

/// Durable artifact of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub submission_timestamp: i64,
    pub digest: Digest,
    pub owner: String,
    pub proof: String,
}

impl TransactionReceipt {
    pub fn new(
        transaction_hash: String,
        submission_timestamp: i64,
        digest: Digest,
        owner: String,
    ) -> Self {
        let proof = format!("sha256:{}@{}", digest, transaction_hash);

        Self {
            transaction_hash,
            submission_timestamp,
            digest,
            owner,
            proof,
        }
    }
}

/// A record field the ledger may or may not be able to report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Detail<T> {
    Known(T),
    /// The deployed contract does not expose this field
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub digest: Digest,
    pub notarized: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<Detail<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<Detail<i64>>,
}

impl VerificationResult {
    pub fn not_notarized(digest: Digest) -> Self {
        Self {
            digest,
            notarized: false,
            owner: None,
            timestamp: None,
        }
    }

    /// `verify` only answers yes or no, so owner and timestamp start out
    /// unavailable rather than guessed.
    pub fn notarized(digest: Digest) -> Self {
        Self {
            digest,
            notarized: true,
            owner: Some(Detail::Unavailable),
            timestamp: Some(Detail::Unavailable),
        }
    }
}

/// What was observed while waiting for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Confirmed {
        ledger: u32,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        closed_at: Option<i64>,
    },
    Rejected {
        reason: String,
    },
    /// Nothing conclusive was observed in time. Says nothing about whether the
    /// transaction will eventually apply.
    TimedOut {
        waited_ms: u64,
    },
}

impl ConfirmationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed { .. })
    }
}
