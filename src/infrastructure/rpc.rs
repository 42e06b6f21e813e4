//! JSON-RPC ledger gateway over hyper.
//!
//! Methods used against the node:
//! - `simulateTransaction` - dry-run an envelope
//! - `getLedgerEntries` - current sequence for an account
//! - `sendTransaction` - submit a signed envelope
//! - `getTransaction` - poll a submitted transaction

use super::envelope::{
    build_envelope, contract_error_in_events, decode_contract_value, result_code,
    transaction_hash, EnvelopeContext,
};
use super::gateway::{contract_error_code, validate_account_id, GatewayError, LedgerGateway};
use super::submission_queue::{SubmissionLane, SubmissionQueue};
use crate::config::NotaryConfig;
use crate::domain::{
    AccountState, ConfirmationOutcome, ContractValue, PreparedIntent, SignedPayload,
    SimulationOutcome, TransactionIntent, TransactionReceipt,
};
use async_trait::async_trait;
use hyper::client::connect::Connect;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, PublicKey, ReadXdr,
    SorobanTransactionData, Uint256, WriteXdr,
};

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    error: Option<String>,
    #[serde(default)]
    results: Vec<SimulateHostResult>,
    transaction_data: Option<String>,
    min_resource_fee: Option<String>,
    #[serde(default)]
    latest_ledger: u32,
}

#[derive(Debug, Deserialize)]
struct SimulateHostResult {
    xdr: String,
    #[serde(default)]
    auth: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResponse {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryResult>>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntryResult {
    xdr: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    status: String,
    hash: Option<String>,
    error_result_xdr: Option<String>,
    #[serde(default)]
    diagnostic_events_xdr: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionResponse {
    status: String,
    ledger: Option<u32>,
    created_at: Option<String>,
    result_xdr: Option<String>,
}

pub struct RpcGateway<C = HttpConnector> {
    client: Client<C>,
    config: NotaryConfig,
    queue: SubmissionQueue,
}

impl RpcGateway<HttpConnector> {
    /// Plain-HTTP gateway, for local nodes
    pub fn new(config: NotaryConfig) -> Self {
        Self::with_client(Client::new(), config)
    }
}

impl<C> RpcGateway<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    pub fn with_client(client: Client<C>, config: NotaryConfig) -> Self {
        Self {
            client,
            config,
            queue: SubmissionQueue::new(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: json::JsonValue,
    ) -> Result<T, GatewayError> {
        // Build JSON-RPC request
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = json::object! {
            "jsonrpc" => "2.0",
            "id" => request_id.as_str(),
            "method" => method,
            "params" => params
        };

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.config.rpc_url.as_str())
            .header("content-type", "application/json")
            .body(Body::from(body.dump()))
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        tracing::debug!(method, id = %request_id, "ledger rpc call");

        // Send, bounded by the configured per-request timeout
        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, bytes))
        };

        let (status, bytes) = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| {
                    GatewayError::Transport(format!("{} timed out after {:?}", method, limit))
                })?,
            None => exchange.await,
        }
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // Non-2xx means the node never looked at the call
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "{} failed: HTTP {}",
                method, status
            )));
        }

        // Parse envelope; RPC-level errors may still carry a contract code
        let envelope: RpcResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::MalformedResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = envelope.error {
            if let Some(code) = contract_error_code(&error.message) {
                return Err(GatewayError::ContractRejected(code));
            }
            return Err(GatewayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| GatewayError::MalformedResponse(format!("{}: missing result", method)))
    }

    fn envelope_for(&self, intent: &TransactionIntent) -> Result<String, GatewayError> {
        let validity = self.config.transaction_timeout.as_secs();
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let context = EnvelopeContext {
            contract_id: &self.config.contract_id,
            max_time: now.saturating_add(validity),
        };
        Ok(build_envelope(intent, &context)?)
    }
}

fn parse_fee(raw: Option<&str>) -> Result<u64, GatewayError> {
    match raw {
        None => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| GatewayError::MalformedResponse(format!("minResourceFee {:?}", value))),
    }
}

#[async_trait]
impl<C> LedgerGateway for RpcGateway<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    fn validate_identity(&self, identity: &str) -> Result<(), GatewayError> {
        validate_account_id(identity)
    }

    async fn simulate(&self, intent: &TransactionIntent) -> Result<SimulationOutcome, GatewayError> {
        let encoded = self.envelope_for(intent)?;

        let response: SimulateResponse = self
            .call("simulateTransaction", json::object! { "transaction" => encoded })
            .await?;

        if let Some(error) = response.error {
            return Err(match contract_error_code(&error) {
                Some(code) => GatewayError::ContractRejected(code),
                None => GatewayError::SimulationFailed(error),
            });
        }

        let (return_value, authorization) = match response.results.into_iter().next() {
            Some(result) => (
                decode_contract_value(&result.xdr)
                    .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?,
                result.auth,
            ),
            None => (ContractValue::Void, Vec::new()),
        };

        let outcome = SimulationOutcome {
            return_value,
            min_resource_fee: parse_fee(response.min_resource_fee.as_deref())?,
            transaction_data: response.transaction_data,
            authorization,
            latest_ledger: response.latest_ledger,
        };
        tracing::debug!(
            operation = intent.operation.function_name(),
            digest = %intent.digest,
            min_resource_fee = outcome.min_resource_fee,
            latest_ledger = outcome.latest_ledger,
            "simulation complete"
        );
        Ok(outcome)
    }

    async fn submission_lane(&self, identity: &str) -> SubmissionLane {
        self.queue.acquire(identity).await
    }

    async fn fetch_account_state(&self, identity: &str) -> Result<AccountState, GatewayError> {
        let key = account_ledger_key(identity)?;
        let response: LedgerEntriesResponse = self
            .call("getLedgerEntries", json::object! { "keys" => json::array![key] })
            .await?;

        let entry = response
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                GatewayError::InvalidIdentity(format!("account {} not found on ledger", identity))
            })?;

        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none()) {
            Ok(LedgerEntryData::Account(account)) => Ok(AccountState {
                account_id: identity.to_string(),
                sequence: account.seq_num.0,
            }),
            Ok(other) => Err(GatewayError::MalformedResponse(format!(
                "expected an account entry, got {}",
                other.name()
            ))),
            Err(e) => Err(GatewayError::MalformedResponse(format!("account entry: {}", e))),
        }
    }

    async fn prepare_resources(
        &self,
        mut intent: TransactionIntent,
        outcome: &SimulationOutcome,
    ) -> Result<PreparedIntent, GatewayError> {
        let footprint = outcome.transaction_data.as_deref().ok_or_else(|| {
            GatewayError::ResourcePreparation("simulation returned no resource data".to_string())
        })?;
        if outcome.min_resource_fee > self.config.max_resource_fee {
            return Err(GatewayError::ResourcePreparation(format!(
                "resource fee {} exceeds limit {}",
                outcome.min_resource_fee, self.config.max_resource_fee
            )));
        }

        // Resource fee goes both into the soroban data and the total fee
        let mut data = SorobanTransactionData::from_xdr_base64(footprint, Limits::none())
            .map_err(|e| GatewayError::ResourcePreparation(format!("resource data: {}", e)))?;
        data.resource_fee = i64::try_from(outcome.min_resource_fee)
            .map_err(|_| GatewayError::ResourcePreparation("resource fee overflow".to_string()))?;
        intent.fee_estimate = intent
            .fee_estimate
            .checked_add(outcome.min_resource_fee)
            .ok_or_else(|| GatewayError::ResourcePreparation("fee overflow".to_string()))?;
        intent.footprint = Some(
            data.to_xdr_base64(Limits::none())
                .map_err(|e| GatewayError::ResourcePreparation(e.to_string()))?,
        );
        intent.authorization = outcome.authorization.clone();

        let unsigned_envelope = self
            .envelope_for(&intent)
            .map_err(|e| GatewayError::ResourcePreparation(e.to_string()))?;

        Ok(PreparedIntent {
            intent,
            unsigned_envelope,
        })
    }

    async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionReceipt, GatewayError> {
        let owner = payload
            .intent
            .owner
            .clone()
            .unwrap_or_else(|| payload.intent.source_account.clone());

        let response: SendResponse = self
            .call(
                "sendTransaction",
                json::object! { "transaction" => payload.envelope.as_str() },
            )
            .await?;

        match response.status.as_str() {
            "PENDING" | "DUPLICATE" => {
                let hash = match response.hash.filter(|h| !h.is_empty()) {
                    Some(hash) => hash,
                    None => transaction_hash(&payload.envelope, &self.config.network_passphrase)?,
                };
                Ok(TransactionReceipt::new(
                    hash,
                    chrono::Utc::now().timestamp(),
                    payload.intent.digest,
                    owner,
                ))
            }
            "TRY_AGAIN_LATER" => Err(GatewayError::SubmissionRejected(
                "node is congested, try again later".to_string(),
            )),
            "ERROR" => {
                if let Some(code) = contract_error_in_events(&response.diagnostic_events_xdr) {
                    return Err(GatewayError::ContractRejected(code));
                }
                let reason = match response.error_result_xdr.as_deref().map(result_code) {
                    Some(Ok(code)) => code.to_string(),
                    Some(Err(e)) => format!("unreadable result: {}", e),
                    None => "transaction rejected".to_string(),
                };
                Err(GatewayError::SubmissionRejected(reason))
            }
            other => Err(GatewayError::MalformedResponse(format!(
                "unknown send status {:?}",
                other
            ))),
        }
    }

    async fn await_confirmation(
        &self,
        transaction_hash: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        let started = Instant::now();
        loop {
            let response: GetTransactionResponse = self
                .call("getTransaction", json::object! { "hash" => transaction_hash })
                .await?;

            match response.status.as_str() {
                "SUCCESS" => {
                    return Ok(ConfirmationOutcome::Confirmed {
                        ledger: response.ledger.unwrap_or_default(),
                        closed_at: response.created_at.and_then(|t| t.parse().ok()),
                    })
                }
                "FAILED" => {
                    let reason = response
                        .result_xdr
                        .as_deref()
                        .and_then(|xdr| result_code(xdr).ok())
                        .unwrap_or("transaction failed");
                    return Ok(ConfirmationOutcome::Rejected {
                        reason: reason.to_string(),
                    });
                }
                "NOT_FOUND" => {}
                other => {
                    return Err(GatewayError::MalformedResponse(format!(
                        "unknown transaction status {:?}",
                        other
                    )))
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(ConfirmationOutcome::TimedOut {
                    waited_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(self.config.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

/// Base64 `LedgerKey` of an account entry
fn account_ledger_key(identity: &str) -> Result<String, GatewayError> {
    validate_account_id(identity)?;
    let key = super::envelope::account_key(identity)?;
    let ledger_key = LedgerKey::Account(LedgerKeyAccount {
        account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))),
    });
    ledger_key
        .to_xdr_base64(Limits::none())
        .map_err(|e| GatewayError::Encoding(e.to_string()))
}
