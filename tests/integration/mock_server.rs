use super::helpers::PASSPHRASE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use ledger_notary::infrastructure::envelope::transaction_hash;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, ContractEvent, ContractEventBody, ContractEventType,
    ContractEventV0, DecoratedSignature, DiagnosticEvent, ExtensionPoint, HostFunction,
    InvokeContractArgs, InvokeHostFunctionResult, LedgerEntryData, LedgerFootprint, LedgerKey,
    Limits, MuxedAccount, OperationBody, OperationResult, OperationResultTr, PublicKey, ReadXdr,
    ScAddress, ScError, ScSymbol, ScVal, ScVec, SequenceNumber, Signature, SignatureHint,
    SorobanResources, SorobanTransactionData, String32, StringM, Thresholds, Transaction,
    TransactionEnvelope, TransactionExt, TransactionResult, TransactionResultExt,
    TransactionResultResult, Uint256, VecM, WriteXdr,
};

pub const MIN_RESOURCE_FEE: u64 = 58_181;
pub const LEDGER_CLOSE_TIME: u64 = 1_700_000_000;
const INITIAL_SEQUENCE: i64 = 4096;

type RpcResult = Result<Value, (i64, String)>;

#[derive(Default)]
struct NodeState {
    /// digest hex -> (owner, ledger time)
    notarized: HashMap<String, (String, u64)>,
    sequences: HashMap<String, i64>,
    transactions: HashMap<String, &'static str>,
    methods: Vec<String>,
    sign_requests: usize,
    unavailable: bool,
    stale_reads: bool,
    decline_signing: bool,
    hide_details: bool,
    fail_transactions: bool,
    send_status: Option<&'static str>,
}

/// Ledger node plus wallet bridge on one ephemeral port.
///
/// JSON-RPC calls go to `/`, signature requests to `/sign`. Envelopes, keys
/// and results are ledger XDR. The contract keeps a write-once digest registry
/// and rejects duplicates with `Error(Contract, #1)`.
#[derive(Clone, Default)]
pub struct MockLedgerNode {
    state: Arc<Mutex<NodeState>>,
}

impl MockLedgerNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self) -> String {
        let state = self.state.clone();

        let make_svc = make_service_fn(move |_conn| {
            let state = state.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle_request(req, state.clone())))
            }
        });

        // Bind to random port
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = Server::bind(&addr).serve(make_svc);
        let actual_addr = server.local_addr();

        tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Mock ledger error: {}", e);
            }
        });

        format!("http://{}", actual_addr)
    }

    pub fn record(&self, digest_hex: &str, owner: &str) {
        self.state
            .lock()
            .unwrap()
            .notarized
            .insert(digest_hex.to_string(), (owner.to_string(), LEDGER_CLOSE_TIME));
    }

    pub fn is_recorded(&self, digest_hex: &str) -> bool {
        self.state.lock().unwrap().notarized.contains_key(digest_hex)
    }

    pub fn owner_of(&self, digest_hex: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .notarized
            .get(digest_hex)
            .map(|(owner, _)| owner.clone())
    }

    pub fn sequence_of(&self, account: &str) -> i64 {
        self.state
            .lock()
            .unwrap()
            .sequences
            .get(account)
            .copied()
            .unwrap_or(INITIAL_SEQUENCE)
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().methods.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    pub fn sign_requests(&self) -> usize {
        self.state.lock().unwrap().sign_requests
    }

    pub fn set_unavailable(&self, value: bool) {
        self.state.lock().unwrap().unavailable = value;
    }

    pub fn set_stale_reads(&self, value: bool) {
        self.state.lock().unwrap().stale_reads = value;
    }

    pub fn set_decline_signing(&self, value: bool) {
        self.state.lock().unwrap().decline_signing = value;
    }

    /// Contract deployed without `get_details`
    pub fn set_hide_details(&self, value: bool) {
        self.state.lock().unwrap().hide_details = value;
    }

    /// Accepted transactions fail when applied
    pub fn set_fail_transactions(&self, value: bool) {
        self.state.lock().unwrap().fail_transactions = value;
    }

    /// Answer every `sendTransaction` with this status, leaving state alone
    pub fn set_send_status(&self, status: Option<&'static str>) {
        self.state.lock().unwrap().send_status = status;
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<Body>,
    state: Arc<Mutex<NodeState>>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    let body_bytes = hyper::body::to_bytes(req.into_body())
        .await
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    let mut state = state.lock().unwrap();

    let response = match path.as_str() {
        "/" => {
            if state.unavailable {
                return Ok(json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({"error": "maintenance"}),
                ));
            }
            let method = body["method"].as_str().unwrap_or_default().to_string();
            state.methods.push(method.clone());
            let result = match method.as_str() {
                "simulateTransaction" => simulate(&state, &body["params"]),
                "getLedgerEntries" => get_ledger_entries(&state, &body["params"]),
                "sendTransaction" => send(&mut state, &body["params"]),
                "getTransaction" => get_transaction(&state, &body["params"]),
                _ => Err((-32601, "method not found".to_string())),
            };
            let payload = match result {
                Ok(result) => json!({"jsonrpc": "2.0", "id": body["id"], "result": result}),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": body["id"],
                    "error": {"code": code, "message": message}
                }),
            };
            json_response(StatusCode::OK, payload)
        }
        "/sign" => {
            state.sign_requests += 1;
            sign(&state, &body)
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    };

    Ok(response)
}

fn b64<T: WriteXdr>(value: &T) -> String {
    value.to_xdr_base64(Limits::none()).unwrap()
}

fn symbol(name: &str) -> ScSymbol {
    ScSymbol(StringM::try_from(name.as_bytes().to_vec()).unwrap())
}

fn account_str(key: &Uint256) -> String {
    stellar_strkey::ed25519::PublicKey(key.0).to_string()
}

fn account_val(account: &str) -> ScVal {
    let key = stellar_strkey::ed25519::PublicKey::from_string(account).unwrap();
    ScVal::Address(ScAddress::Account(AccountId(
        PublicKey::PublicKeyTypeEd25519(Uint256(key.0)),
    )))
}

/// The single contract call carried by an envelope
struct Call {
    tx: Transaction,
    signed: bool,
    source: String,
    function: ScSymbol,
    digest: String,
    owner: Option<String>,
}

fn decode_call(encoded: &str) -> Result<Call, (i64, String)> {
    let invalid = |what: &str| (-32602, format!("invalid transaction: {}", what));
    let envelope = TransactionEnvelope::from_xdr_base64(encoded, Limits::none())
        .map_err(|e| invalid(&e.to_string()))?;
    let TransactionEnvelope::Tx(v1) = envelope else {
        return Err(invalid("not a v1 envelope"));
    };
    let MuxedAccount::Ed25519(source) = &v1.tx.source_account else {
        return Err(invalid("muxed source"));
    };
    let OperationBody::InvokeHostFunction(op) = &v1.tx.operations[0].body else {
        return Err(invalid("not a host function"));
    };
    let HostFunction::InvokeContract(InvokeContractArgs {
        function_name,
        args,
        ..
    }) = &op.host_function
    else {
        return Err(invalid("not a contract call"));
    };
    let digest = match args.first() {
        Some(ScVal::Bytes(bytes)) if bytes.0.len() == 32 => hex::encode(bytes.0.to_vec()),
        _ => return Err(invalid("hash argument")),
    };
    let owner = match args.get(1) {
        Some(ScVal::Address(ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(
            key,
        ))))) => Some(account_str(key)),
        Some(_) => return Err(invalid("owner argument")),
        None => None,
    };

    Ok(Call {
        source: account_str(source),
        signed: !v1.signatures.is_empty(),
        function: function_name.clone(),
        digest,
        owner,
        tx: v1.tx,
    })
}

fn simulate(state: &NodeState, params: &Value) -> RpcResult {
    let encoded = params["transaction"]
        .as_str()
        .ok_or((-32602, "missing transaction".to_string()))?;
    let call = decode_call(encoded)?;
    let record = if state.stale_reads {
        None
    } else {
        state.notarized.get(&call.digest)
    };

    let value = if call.function == symbol("verify") {
        ScVal::Bool(record.is_some())
    } else if call.function == symbol("notarize") {
        if record.is_some() {
            return Ok(json!({
                "error": "HostError: Error(Contract, #1)\n\nEvent log (newest first):",
                "latestLedger": 100
            }));
        }
        ScVal::Void
    } else if call.function == symbol("get_details") && !state.hide_details {
        let items = match record {
            Some((owner, time)) => vec![ScVal::I32(1), account_val(owner), ScVal::U64(*time)],
            None => vec![ScVal::I32(0)],
        };
        ScVal::Vec(Some(ScVec(items.try_into().unwrap())))
    } else {
        return Ok(json!({
            "error": "HostError: Error(WasmVm, MissingValue)",
            "latestLedger": 100
        }));
    };

    let resources = SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: VecM::default(),
                read_write: VecM::default(),
            },
            instructions: 2_000_000,
            read_bytes: 1_024,
            write_bytes: 256,
        },
        resource_fee: MIN_RESOURCE_FEE as i64,
    };

    Ok(json!({
        "results": [{"xdr": b64(&value), "auth": []}],
        "transactionData": b64(&resources),
        "minResourceFee": MIN_RESOURCE_FEE.to_string(),
        "latestLedger": 100
    }))
}

fn get_ledger_entries(state: &NodeState, params: &Value) -> RpcResult {
    let encoded = params["keys"][0]
        .as_str()
        .ok_or((-32602, "missing keys".to_string()))?;
    let key = LedgerKey::from_xdr_base64(encoded, Limits::none())
        .map_err(|e| (-32602, e.to_string()))?;
    let LedgerKey::Account(account) = key else {
        return Ok(json!({"entries": [], "latestLedger": 100}));
    };
    let PublicKey::PublicKeyTypeEd25519(raw) = &account.account_id.0;
    let address = account_str(raw);

    let entry = LedgerEntryData::Account(AccountEntry {
        account_id: account.account_id.clone(),
        balance: 10_000_000_000,
        seq_num: SequenceNumber(
            state
                .sequences
                .get(&address)
                .copied()
                .unwrap_or(INITIAL_SEQUENCE),
        ),
        num_sub_entries: 0,
        inflation_dest: None,
        flags: 0,
        home_domain: String32::default(),
        thresholds: Thresholds([1, 0, 0, 0]),
        signers: VecM::default(),
        ext: AccountEntryExt::V0,
    });

    Ok(json!({
        "entries": [{"key": encoded, "xdr": b64(&entry), "lastModifiedLedgerSeq": 90}],
        "latestLedger": 100
    }))
}

fn rejected(hash: &str, result: TransactionResultResult) -> Value {
    let result = TransactionResult {
        fee_charged: 100,
        result,
        ext: TransactionResultExt::V0,
    };
    json!({"status": "ERROR", "hash": hash, "errorResultXdr": b64(&result), "latestLedger": 100})
}

fn contract_error_event(code: u32) -> DiagnosticEvent {
    DiagnosticEvent {
        in_successful_contract_call: false,
        event: ContractEvent {
            ext: ExtensionPoint::V0,
            contract_id: None,
            type_: ContractEventType::Diagnostic,
            body: ContractEventBody::V0(ContractEventV0 {
                topics: vec![ScVal::Symbol(symbol("error")), ScVal::Error(ScError::Contract(code))]
                    .try_into()
                    .unwrap(),
                data: ScVal::Void,
            }),
        },
    }
}

fn send(state: &mut NodeState, params: &Value) -> RpcResult {
    let encoded = params["transaction"]
        .as_str()
        .ok_or((-32602, "missing transaction".to_string()))?;
    let hash = transaction_hash(encoded, PASSPHRASE).map_err(|e| (-32602, e.to_string()))?;
    let call = decode_call(encoded)?;

    if let Some(status) = state.send_status {
        return Ok(json!({"status": status, "hash": hash, "latestLedger": 100}));
    }
    if !call.signed {
        return Ok(rejected(&hash, TransactionResultResult::TxBadAuth));
    }
    if !matches!(call.tx.ext, TransactionExt::V1(_)) {
        return Ok(rejected(&hash, TransactionResultResult::TxSorobanInvalid));
    }

    let current = state
        .sequences
        .get(&call.source)
        .copied()
        .unwrap_or(INITIAL_SEQUENCE);
    if call.tx.seq_num.0 != current + 1 {
        return Ok(rejected(&hash, TransactionResultResult::TxBadSeq));
    }
    state.sequences.insert(call.source.clone(), call.tx.seq_num.0);

    if state.notarized.contains_key(&call.digest) {
        state.transactions.insert(hash.clone(), "FAILED");
        let trapped = OperationResult::OpInner(OperationResultTr::InvokeHostFunction(
            InvokeHostFunctionResult::Trapped,
        ));
        let mut response = rejected(
            &hash,
            TransactionResultResult::TxFailed(vec![trapped].try_into().unwrap()),
        );
        response["diagnosticEventsXdr"] = json!([b64(&contract_error_event(1))]);
        return Ok(response);
    }

    let owner = call.owner.unwrap_or_else(|| call.source.clone());
    state
        .notarized
        .insert(call.digest, (owner, LEDGER_CLOSE_TIME));
    let outcome = if state.fail_transactions {
        "FAILED"
    } else {
        "SUCCESS"
    };
    state.transactions.insert(hash.clone(), outcome);
    Ok(json!({"status": "PENDING", "hash": hash, "latestLedger": 100}))
}

fn get_transaction(state: &NodeState, params: &Value) -> RpcResult {
    let hash = params["hash"]
        .as_str()
        .ok_or((-32602, "missing hash".to_string()))?;
    Ok(match state.transactions.get(hash) {
        Some(&"SUCCESS") => json!({
            "status": "SUCCESS",
            "ledger": 101,
            "createdAt": LEDGER_CLOSE_TIME.to_string()
        }),
        Some(_) => {
            let trapped = OperationResult::OpInner(OperationResultTr::InvokeHostFunction(
                InvokeHostFunctionResult::Trapped,
            ));
            let result = TransactionResult {
                fee_charged: 100,
                result: TransactionResultResult::TxFailed(vec![trapped].try_into().unwrap()),
                ext: TransactionResultExt::V0,
            };
            json!({"status": "FAILED", "ledger": 101, "resultXdr": b64(&result)})
        }
        None => json!({"status": "NOT_FOUND", "latestLedger": 100}),
    })
}

fn sign(state: &NodeState, body: &Value) -> Response<Body> {
    if state.decline_signing {
        return json_response(StatusCode::OK, json!({"error": "User declined access"}));
    }

    let (Some(xdr), Some(passphrase), Some(address)) = (
        body["xdr"].as_str(),
        body["networkPassphrase"].as_str(),
        body["address"].as_str(),
    ) else {
        return json_response(StatusCode::BAD_REQUEST, json!({"error": "bad request"}));
    };

    let call = match decode_call(xdr) {
        Ok(call) => call,
        Err((_, message)) => return json_response(StatusCode::BAD_REQUEST, json!({"error": message})),
    };
    if passphrase != PASSPHRASE || call.source != address {
        return json_response(
            StatusCode::FORBIDDEN,
            json!({"error": "envelope does not match signing request"}),
        );
    }

    let key = stellar_strkey::ed25519::PublicKey::from_string(address).unwrap().0;
    let signature = DecoratedSignature {
        hint: SignatureHint([key[28], key[29], key[30], key[31]]),
        signature: Signature(vec![0x5a; 64].try_into().unwrap()),
    };
    let signed = TransactionEnvelope::Tx(stellar_xdr::curr::TransactionV1Envelope {
        tx: call.tx,
        signatures: vec![signature].try_into().unwrap(),
    });
    json_response(StatusCode::OK, json!({"signedTxXdr": b64(&signed)}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_node_starts() {
        let node = MockLedgerNode::new();
        let url = node.start().await;

        assert!(url.starts_with("http://127.0.0.1:"));
    }
}
