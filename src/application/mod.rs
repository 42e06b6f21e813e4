mod engine;
mod error;
mod notarize;
mod types;
mod verify;
mod workflow;

pub use engine::NotarizationEngine;
pub use error::{InputError, NotaryError};
pub use notarize::{NotarizeSettings, NotarizeUseCase};
pub use types::{ActionResponse, ConfirmRequest, InputAction, NotarizeRequest, VerifyRequest};
pub use verify::VerifyUseCase;
pub use workflow::{Workflow, WorkflowState};
