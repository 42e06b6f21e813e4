use super::error::NotaryError;
use crate::domain::{ConfirmationOutcome, TransactionReceipt, VerificationResult};
use serde::{Deserialize, Serialize};

/// Request to check whether a digest is notarized
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyRequest {
    /// SHA-256 hash (64 hex characters)
    pub content_hash: String,
}

/// Request to notarize a digest on behalf of an owner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotarizeRequest {
    /// Account recorded as the owner; also the signing identity
    pub owner: String,
    /// SHA-256 hash (64 hex characters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Base64-encoded content, fingerprinted locally when no hash is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Request to wait for a submitted transaction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmRequest {
    pub transaction_hash: String,
    /// Defaults to 30 seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Actions accepted on the JSON surface
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum InputAction {
    Verify { data: VerifyRequest },
    Notarize { data: NotarizeRequest },
    Confirm { data: ConfirmRequest },
}

/// Response written back to the caller
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionResponse {
    Verification(VerificationResult),
    Receipt(TransactionReceipt),
    Confirmation(ConfirmationOutcome),
    Error {
        kind: String,
        message: String,
        retryable: bool,
    },
}

impl ActionResponse {
    pub fn error(err: &NotaryError) -> Self {
        Self::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResponse::Error { .. })
    }
}
