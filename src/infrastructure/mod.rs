pub mod envelope;
pub mod gateway;
pub mod rpc;
pub mod signer;
pub mod submission_queue;

pub use gateway::{GatewayError, LedgerGateway};
pub use rpc::RpcGateway;
pub use signer::{DisabledSigner, HttpSigner, NetworkContext, SignerError, TransactionSigner};
pub use submission_queue::{SubmissionLane, SubmissionQueue};
