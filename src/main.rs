use clap::{Args, Parser, Subcommand};
use ledger_notary::application::{
    ActionResponse, ConfirmRequest, InputAction, NotarizationEngine, NotarizeRequest,
    NotarizeSettings, VerifyRequest,
};
use ledger_notary::config::NotaryConfig;
use ledger_notary::handlers::{handle_action, handle_payload};
use ledger_notary::infrastructure::{
    DisabledSigner, HttpSigner, LedgerGateway, RpcGateway, TransactionSigner,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Notarize file fingerprints on a ledger contract
#[derive(Parser)]
#[command(name = "notary")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Subject {
    /// File to fingerprint
    #[arg(long)]
    file: Option<PathBuf>,

    /// Precomputed SHA-256 digest (64 hex characters)
    #[arg(long)]
    hash: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the digest of a file
    Hash { file: PathBuf },

    /// Check whether a digest is notarized
    Verify {
        #[command(flatten)]
        subject: Subject,
    },

    /// Notarize a digest for an owner
    Notarize {
        /// Owner account, also used as the signing identity
        #[arg(long, env = "NOTARY_OWNER")]
        owner: String,

        #[command(flatten)]
        subject: Subject,

        /// After submission, wait up to this many seconds for confirmation
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Wait for a submitted transaction to be confirmed
    Confirm {
        transaction_hash: String,

        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Read a JSON action from stdin
    Action,
}

fn build_engine(config: &NotaryConfig) -> NotarizationEngine {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    let client = hyper::Client::builder().build(https);

    let gateway: Arc<dyn LedgerGateway> =
        Arc::new(RpcGateway::with_client(client.clone(), config.clone()));
    let signer: Arc<dyn TransactionSigner> = match &config.signer_url {
        Some(url) => Arc::new(HttpSigner::with_client(client, url)),
        None => {
            tracing::warn!("no signer configured, notarization will fail at signing");
            Arc::new(DisabledSigner)
        }
    };

    NotarizationEngine::new(gateway, signer, NotarizeSettings::from(config))
}

fn subject_hash(subject: Subject) -> Result<String, Box<dyn std::error::Error>> {
    match (subject.file, subject.hash) {
        (Some(path), _) => Ok(NotarizationEngine::fingerprint_path(&path)?.to_hex()),
        (None, Some(hash)) => Ok(hash),
        (None, None) => Err("either --file or --hash is required".into()),
    }
}

fn emit(response: &ActionResponse) -> Result<bool, Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(!response.is_error())
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    if let Commands::Hash { file } = &cli.command {
        let digest = NotarizationEngine::fingerprint_path(file)?;
        println!("{}", digest);
        return Ok(true);
    }

    let config = NotaryConfig::from_env()?;
    tracing::info!(rpc_url = %config.rpc_url, contract_id = %config.contract_id, "ledger notary starting");
    let engine = build_engine(&config);

    match cli.command {
        Commands::Hash { .. } => Ok(true),
        Commands::Verify { subject } => {
            let data = VerifyRequest {
                content_hash: subject_hash(subject)?,
            };
            emit(&handle_action(&engine, InputAction::Verify { data }).await)
        }
        Commands::Notarize {
            owner,
            subject,
            wait,
        } => {
            let data = NotarizeRequest {
                owner,
                content_hash: Some(subject_hash(subject)?),
                content: None,
            };
            let response = handle_action(&engine, InputAction::Notarize { data }).await;
            let transaction_hash = match (&response, wait) {
                (ActionResponse::Receipt(receipt), Some(_)) => Some(receipt.transaction_hash.clone()),
                _ => None,
            };
            if !emit(&response)? {
                return Ok(false);
            }
            match transaction_hash {
                Some(transaction_hash) => {
                    let data = ConfirmRequest {
                        transaction_hash,
                        timeout_secs: wait,
                    };
                    emit(&handle_action(&engine, InputAction::Confirm { data }).await)
                }
                None => Ok(true),
            }
        }
        Commands::Confirm {
            transaction_hash,
            timeout,
        } => {
            let data = ConfirmRequest {
                transaction_hash,
                timeout_secs: Some(timeout),
            };
            emit(&handle_action(&engine, InputAction::Confirm { data }).await)
        }
        Commands::Action => {
            let mut payload = String::new();
            tokio::io::stdin().read_to_string(&mut payload).await?;
            emit(&handle_payload(&engine, &payload).await)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "notary failed");
            std::process::exit(1);
        }
    }
}
