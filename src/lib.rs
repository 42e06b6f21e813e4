pub mod application;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{NotarizationEngine, NotarizeSettings, NotaryError, VerifyUseCase};
pub use config::NotaryConfig;
pub use domain::{fingerprint, Digest, TransactionReceipt, VerificationResult};
pub use infrastructure::{HttpSigner, LedgerGateway, RpcGateway, TransactionSigner};
