use async_trait::async_trait;
use hyper::client::connect::Connect;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing declined: {0}")]
    Declined(String),

    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed signer response: {0}")]
    MalformedResponse(String),
}

/// Network the payload is bound to, passed to the signer so it can show and
/// enforce the replay domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub network_passphrase: String,
}

/// Signing capability. Key material stays on the other side of this trait.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(
        &self,
        unsigned_envelope: &str,
        network: &NetworkContext,
        identity: &str,
    ) -> Result<String, SignerError>;
}

/// Stands in when no signer is configured; every request is unavailable
pub struct DisabledSigner;

#[async_trait]
impl TransactionSigner for DisabledSigner {
    async fn sign(
        &self,
        _unsigned_envelope: &str,
        _network: &NetworkContext,
        _identity: &str,
    ) -> Result<String, SignerError> {
        Err(SignerError::Unavailable("no signer configured".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    signed_tx_xdr: Option<String>,
    error: Option<String>,
}

/// Wallet bridge reached over HTTP.
///
/// Sends `{xdr, networkPassphrase, address}` to `<base_url>/sign` and expects
/// `{signedTxXdr}` back, or `{error}` when the holder refuses.
pub struct HttpSigner<C = HttpConnector> {
    client: Client<C>,
    base_url: String,
}

impl HttpSigner<HttpConnector> {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }
}

impl<C> HttpSigner<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    pub fn with_client(client: Client<C>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl<C> TransactionSigner for HttpSigner<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async fn sign(
        &self,
        unsigned_envelope: &str,
        network: &NetworkContext,
        identity: &str,
    ) -> Result<String, SignerError> {
        let body = json::object! {
            "xdr" => unsigned_envelope,
            "networkPassphrase" => network.network_passphrase.as_str(),
            "address" => identity
        };

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/sign", self.base_url))
            .header("content-type", "application/json")
            .body(Body::from(body.dump()))
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        tracing::debug!(identity, "requesting signature");

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let parsed: Option<SignResponse> = serde_json::from_slice(&bytes).ok();

        if !status.is_success() {
            let reason = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(SignerError::Declined(reason));
        }

        match parsed {
            Some(SignResponse {
                error: Some(reason), ..
            }) => Err(SignerError::Declined(reason)),
            Some(SignResponse {
                signed_tx_xdr: Some(signed),
                ..
            }) if !signed.is_empty() => Ok(signed),
            _ => Err(SignerError::MalformedResponse(
                "missing signedTxXdr".to_string(),
            )),
        }
    }
}
