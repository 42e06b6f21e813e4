pub mod digest;
pub mod intent;
pub mod receipt;

pub use digest::{fingerprint, fingerprint_file, fingerprint_reader, Digest, DigestError};
pub use intent::{
    AccountState, ContractValue, Operation, PreparedIntent, RecordDetails, SignedPayload,
    SimulationOutcome, TransactionIntent,
};
pub use receipt::{ConfirmationOutcome, Detail, TransactionReceipt, VerificationResult};
