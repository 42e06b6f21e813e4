use crate::domain::intent::MIN_BASE_FEE;
use std::time::Duration;
use thiserror::Error;

pub const ENV_RPC_URL: &str = "NOTARY_RPC_URL";
pub const ENV_NETWORK_PASSPHRASE: &str = "NOTARY_NETWORK_PASSPHRASE";
pub const ENV_CONTRACT_ID: &str = "NOTARY_CONTRACT_ID";
pub const ENV_SIGNER_URL: &str = "NOTARY_SIGNER_URL";
pub const ENV_BASE_FEE: &str = "NOTARY_BASE_FEE";
pub const ENV_TX_TIMEOUT_SECS: &str = "NOTARY_TX_TIMEOUT_SECS";
pub const ENV_MAX_RESOURCE_FEE: &str = "NOTARY_MAX_RESOURCE_FEE";
pub const ENV_RPC_TIMEOUT_MS: &str = "NOTARY_RPC_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "NOTARY_POLL_INTERVAL_MS";
pub const ENV_DUPLICATE_ERROR_CODE: &str = "NOTARY_DUPLICATE_ERROR_CODE";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Deployment settings, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryConfig {
    pub rpc_url: String,
    pub network_passphrase: String,
    pub contract_id: String,
    pub signer_url: Option<String>,
    pub base_fee: u64,
    pub transaction_timeout: Duration,
    pub max_resource_fee: u64,
    pub request_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub duplicate_error_code: u32,
}

impl NotaryConfig {
    /// Settings with defaults for everything but the three required values
    pub fn new(rpc_url: &str, network_passphrase: &str, contract_id: &str) -> Self {
        Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            network_passphrase: network_passphrase.to_string(),
            contract_id: contract_id.to_string(),
            signer_url: None,
            base_fee: MIN_BASE_FEE,
            transaction_timeout: Duration::from_secs(60),
            max_resource_fee: 100_000_000,
            request_timeout: None,
            poll_interval: Duration::from_millis(1000),
            duplicate_error_code: 1,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let rpc_url = required(ENV_RPC_URL)?;
        validate_url(ENV_RPC_URL, &rpc_url)?;

        let contract_id = required(ENV_CONTRACT_ID)?;
        if stellar_strkey::Contract::from_string(&contract_id).is_err() {
            return Err(ConfigError::Invalid {
                key: ENV_CONTRACT_ID,
                reason: "expected a contract address (C...)".to_string(),
            });
        }

        let mut config = Self::new(&rpc_url, &required(ENV_NETWORK_PASSPHRASE)?, &contract_id);

        if let Some(url) = lookup(ENV_SIGNER_URL).filter(|v| !v.trim().is_empty()) {
            validate_url(ENV_SIGNER_URL, url.trim())?;
            config.signer_url = Some(url.trim().trim_end_matches('/').to_string());
        }

        if let Some(fee) = parse_number::<u64, _>(&lookup, ENV_BASE_FEE)? {
            if fee < MIN_BASE_FEE {
                return Err(ConfigError::Invalid {
                    key: ENV_BASE_FEE,
                    reason: format!("must be at least {}", MIN_BASE_FEE),
                });
            }
            config.base_fee = fee;
        }
        if let Some(secs) = parse_number::<u64, _>(&lookup, ENV_TX_TIMEOUT_SECS)? {
            config.transaction_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_number::<u64, _>(&lookup, ENV_MAX_RESOURCE_FEE)? {
            config.max_resource_fee = max;
        }
        if let Some(ms) = parse_number::<u64, _>(&lookup, ENV_RPC_TIMEOUT_MS)? {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_number::<u64, _>(&lookup, ENV_POLL_INTERVAL_MS)? {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_POLL_INTERVAL_MS,
                    reason: "must be positive".to_string(),
                });
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(code) = parse_number::<u32, _>(&lookup, ENV_DUPLICATE_ERROR_CODE)? {
            config.duplicate_error_code = code;
        }

        Ok(config)
    }
}

fn validate_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let uri: hyper::Uri = value.parse().map_err(|e: hyper::http::uri::InvalidUri| {
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    })?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.host().is_some() => Ok(()),
        _ => Err(ConfigError::Invalid {
            key,
            reason: "expected an http(s) URL".to_string(),
        }),
    }
}

fn parse_number<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
    }
}
