//! Transaction envelope codec.
//!
//! Envelopes are ledger `TransactionEnvelope` XDR, base64 end to end. The
//! workflow never looks inside them; only this module and the gateway do.

use crate::domain::{ContractValue, Operation, RecordDetails, TransactionIntent};
use sha2::{Digest as _, Sha256};
use stellar_xdr::curr::{
    AccountId, BytesM, ContractEventBody, DiagnosticEvent, Hash, HostFunction, InvokeContractArgs,
    InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation as XdrOperation, OperationBody,
    Preconditions, PublicKey, ReadXdr, ScAddress, ScBytes, ScError, ScSymbol, ScVal,
    SequenceNumber, SorobanAuthorizationEntry, SorobanTransactionData, StringM, TimeBounds,
    TimePoint, Transaction, TransactionEnvelope, TransactionExt, TransactionResult,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, VecM, WriteXdr,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    #[error("Invalid {kind} address: {value}")]
    Address { kind: &'static str, value: String },

    #[error("Fee {0} does not fit a transaction")]
    Fee(u64),

    #[error("Unsupported envelope type {0}")]
    Unsupported(&'static str),
}

/// Everything outside the intent that goes into an envelope
#[derive(Debug, Clone)]
pub struct EnvelopeContext<'a> {
    pub contract_id: &'a str,
    /// Upper bound of the validity window, unix seconds
    pub max_time: u64,
}

/// Build the unsigned envelope for `intent`, base64 XDR.
///
/// The intent's footprint and authorization entries, when present, are
/// attached as-is: they come straight from the node's simulation.
pub fn build_envelope(
    intent: &TransactionIntent,
    context: &EnvelopeContext<'_>,
) -> Result<String, EnvelopeError> {
    let invocation = InvokeContractArgs {
        contract_address: contract_address(context.contract_id)?,
        function_name: ScSymbol(StringM::try_from(
            intent.operation.function_name().as_bytes().to_vec(),
        )?),
        args: contract_arguments(intent)?.try_into()?,
    };

    let auth = intent
        .authorization
        .iter()
        .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry, Limits::none()))
        .collect::<Result<Vec<_>, _>>()?;

    let operation = XdrOperation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(invocation),
            auth: auth.try_into()?,
        }),
    };

    let ext = match &intent.footprint {
        Some(data) => TransactionExt::V1(SorobanTransactionData::from_xdr_base64(
            data,
            Limits::none(),
        )?),
        None => TransactionExt::V0,
    };

    let tx = Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(account_key(&intent.source_account)?)),
        fee: u32::try_from(intent.fee_estimate).map_err(|_| EnvelopeError::Fee(intent.fee_estimate))?,
        seq_num: SequenceNumber(intent.sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(context.max_time),
        }),
        memo: Memo::None,
        operations: vec![operation].try_into()?,
        ext,
    };

    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    });
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// Positional contract arguments: `hash: BytesN<32>`, then `owner: Address`
/// for `notarize`
fn contract_arguments(intent: &TransactionIntent) -> Result<Vec<ScVal>, EnvelopeError> {
    let hash = ScVal::Bytes(ScBytes(BytesM::try_from(intent.digest.as_bytes().to_vec())?));
    match (intent.operation, &intent.owner) {
        (Operation::Notarize, Some(owner)) => Ok(vec![hash, account_address(owner)?]),
        _ => Ok(vec![hash]),
    }
}

/// Raw ed25519 key behind a `G...` account id
pub fn account_key(account_id: &str) -> Result<[u8; 32], EnvelopeError> {
    stellar_strkey::ed25519::PublicKey::from_string(account_id)
        .map(|key| key.0)
        .map_err(|_| EnvelopeError::Address {
            kind: "account",
            value: account_id.to_string(),
        })
}

pub fn account_address(account_id: &str) -> Result<ScVal, EnvelopeError> {
    Ok(ScVal::Address(ScAddress::Account(AccountId(
        PublicKey::PublicKeyTypeEd25519(Uint256(account_key(account_id)?)),
    ))))
}

pub fn contract_address(contract_id: &str) -> Result<ScAddress, EnvelopeError> {
    stellar_strkey::Contract::from_string(contract_id)
        .map(|contract| ScAddress::Contract(Hash(contract.0)))
        .map_err(|_| EnvelopeError::Address {
            kind: "contract",
            value: contract_id.to_string(),
        })
}

/// Replay-protection domain for a network passphrase
pub fn network_id(passphrase: &str) -> [u8; 32] {
    let mut id = [0u8; 32];
    id.copy_from_slice(&Sha256::digest(passphrase.as_bytes()));
    id
}

/// Network hash of an envelope, hex: SHA-256 over the network id, the
/// `ENVELOPE_TYPE_TX` tag and the transaction body. Signatures are not part
/// of it.
pub fn transaction_hash(envelope: &str, network_passphrase: &str) -> Result<String, EnvelopeError> {
    let tx = match TransactionEnvelope::from_xdr_base64(envelope, Limits::none())? {
        TransactionEnvelope::Tx(v1) => v1.tx,
        TransactionEnvelope::TxV0(_) => return Err(EnvelopeError::Unsupported("v0")),
        TransactionEnvelope::TxFeeBump(_) => return Err(EnvelopeError::Unsupported("fee bump")),
    };
    let payload = TransactionSignaturePayload {
        network_id: Hash(network_id(network_passphrase)),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx),
    };
    Ok(hex::encode(Sha256::digest(payload.to_xdr(Limits::none())?)))
}

/// Decode a base64 `ScVal` returned by a simulated call
pub fn decode_contract_value(encoded: &str) -> Result<ContractValue, EnvelopeError> {
    let value = ScVal::from_xdr_base64(encoded.trim(), Limits::none())?;
    Ok(match &value {
        ScVal::Bool(flag) => ContractValue::Bool(*flag),
        ScVal::Void => ContractValue::Void,
        ScVal::Vec(Some(items)) => decode_record(&items.0).unwrap_or(ContractValue::Other("Vec")),
        other => ContractValue::Other(other.name()),
    })
}

/// `get_details` answers `[1, owner, timestamp]` or `[0]`
fn decode_record(items: &[ScVal]) -> Option<ContractValue> {
    match items {
        [ScVal::I32(0)] => Some(ContractValue::Record(None)),
        [ScVal::I32(1), ScVal::Address(owner), ScVal::U64(timestamp)] => {
            let owner = match owner {
                ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
                    stellar_strkey::ed25519::PublicKey(*key).to_string()
                }
                ScAddress::Contract(Hash(id)) => stellar_strkey::Contract(*id).to_string(),
                #[allow(unreachable_patterns)]
                _ => return None,
            };
            Some(ContractValue::Record(Some(RecordDetails {
                owner,
                timestamp: i64::try_from(*timestamp).ok()?,
            })))
        }
        _ => None,
    }
}

/// Result code name of a base64 `TransactionResult`, e.g. `TxBadSeq`
pub fn result_code(encoded: &str) -> Result<&'static str, EnvelopeError> {
    let result = TransactionResult::from_xdr_base64(encoded.trim(), Limits::none())?;
    Ok(result.result.name())
}

/// First contract error code carried by base64 diagnostic events
pub fn contract_error_in_events(events: &[String]) -> Option<u32> {
    events.iter().find_map(|encoded| {
        let event = DiagnosticEvent::from_xdr_base64(encoded, Limits::none()).ok()?;
        let ContractEventBody::V0(body) = event.event.body;
        body.topics
            .iter()
            .chain(std::iter::once(&body.data))
            .find_map(|value| match value {
                ScVal::Error(ScError::Contract(code)) => Some(*code),
                _ => None,
            })
    })
}
