// Caller-facing handlers. The binary and the integration tests both drive the
// engine through these.

use crate::application::{
    ActionResponse, ConfirmRequest, InputAction, InputError, NotarizationEngine, NotarizeRequest,
    NotaryError, VerifyRequest,
};
use crate::domain::fingerprint;
use base64::Engine;
use std::time::Duration;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse a JSON action and run it. Malformed payloads come back as input errors
/// rather than failing the call.
pub async fn handle_payload(engine: &NotarizationEngine, payload: &str) -> ActionResponse {
    match serde_json::from_str::<InputAction>(payload) {
        Ok(action) => handle_action(engine, action).await,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse input action");
            ActionResponse::Error {
                kind: "input_error".to_string(),
                message: format!("Invalid input format: {}", e),
                retryable: false,
            }
        }
    }
}

pub async fn handle_action(engine: &NotarizationEngine, action: InputAction) -> ActionResponse {
    let result = match action {
        InputAction::Verify { data } => handle_verify(engine, data).await,
        InputAction::Notarize { data } => handle_notarize(engine, data).await,
        InputAction::Confirm { data } => handle_confirm(engine, data).await,
    };
    result.unwrap_or_else(|e| ActionResponse::error(&e))
}

async fn handle_verify(
    engine: &NotarizationEngine,
    request: VerifyRequest,
) -> Result<ActionResponse, NotaryError> {
    tracing::info!(content_hash = %request.content_hash, "verify requested");
    let result = engine.check_notarization(&request.content_hash).await?;
    Ok(ActionResponse::Verification(result))
}

async fn handle_notarize(
    engine: &NotarizationEngine,
    request: NotarizeRequest,
) -> Result<ActionResponse, NotaryError> {
    let content_hash = resolve_content_hash(&request)?;
    tracing::info!(owner = %request.owner, %content_hash, "notarize requested");
    let receipt = engine
        .submit_notarization(&request.owner, &content_hash)
        .await?;
    Ok(ActionResponse::Receipt(receipt))
}

async fn handle_confirm(
    engine: &NotarizationEngine,
    request: ConfirmRequest,
) -> Result<ActionResponse, NotaryError> {
    let timeout = request
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONFIRM_TIMEOUT);
    let outcome = engine
        .await_confirmation(&request.transaction_hash, timeout)
        .await?;
    Ok(ActionResponse::Confirmation(outcome))
}

/// An explicit hash wins; otherwise the base64 content is decoded and hashed
fn resolve_content_hash(request: &NotarizeRequest) -> Result<String, NotaryError> {
    if let Some(hash) = &request.content_hash {
        return Ok(hash.clone());
    }
    let encoded = request
        .content
        .as_deref()
        .ok_or(InputError::MissingContent)?;
    let content = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| InputError::InvalidContent(e.to_string()))?;
    Ok(fingerprint(&content).to_hex())
}
