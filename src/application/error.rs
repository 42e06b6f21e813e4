use crate::domain::{Digest, DigestError};
use std::path::PathBuf;
use thiserror::Error;

/// Caller mistakes, caught before any network call
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Malformed digest: {0}")]
    MalformedDigest(#[from] DigestError),

    #[error("Identity cannot be empty")]
    MissingIdentity,

    #[error("Malformed identity: {0}")]
    InvalidIdentity(String),

    #[error("Either content or a content hash is required")]
    MissingContent,

    #[error("Transaction hash cannot be empty")]
    MissingTransactionHash,

    #[error("Invalid base64 content: {0}")]
    InvalidContent(String),

    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum NotaryError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    /// The node could not be reached or answered nonsense. Never a negative
    /// notarization result.
    #[error("Ledger unavailable: {0}")]
    Transport(String),

    #[error("Resource preparation failed: {0}")]
    ResourcePreparation(String),

    #[error("Signing declined: {0}")]
    SigningDeclined(String),

    #[error("Digest {0} is already notarized")]
    DuplicateSubmission(Digest),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
}

impl NotaryError {
    /// Stable code for callers that branch on the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            NotaryError::Input(_) => "input_error",
            NotaryError::Transport(_) => "transport_error",
            NotaryError::ResourcePreparation(_) => "resource_preparation_error",
            NotaryError::SigningDeclined(_) => "signing_declined",
            NotaryError::DuplicateSubmission(_) => "duplicate_submission",
            NotaryError::SubmissionRejected(_) => "submission_rejected",
        }
    }

    /// Whether starting a fresh invocation may succeed without changing input
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            NotaryError::Input(_) | NotaryError::DuplicateSubmission(_)
        )
    }
}

impl From<DigestError> for NotaryError {
    fn from(err: DigestError) -> Self {
        NotaryError::Input(InputError::MalformedDigest(err))
    }
}
