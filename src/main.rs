//! G-Naira deployment CLI
//!
//! Deploys the compiled GNaira contract with its governor and approver
//! constructor arguments, waits for confirmation depth, and submits the
//! source to the explorer's verification API. Exit code 0 when the
//! deployment lands (verification is best-effort), 1 otherwise.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

mod abi;
mod artifacts;
mod config;
mod deploy;
mod error;
mod rpc;
mod types;
mod verify;

use artifacts::ArtifactRegistry;
use config::DeployConfig;
use deploy::DeployRunner;
use rpc::{ChainBackend, ChainClient};
use types::Address;
use verify::EtherscanVerifier;

/// Deploy and verify the G-Naira contract
#[derive(Parser, Debug)]
#[command(name = "gnaira-deploy")]
#[command(version = "0.1.0")]
#[command(about = "Deployment and source-verification orchestrator for the G-Naira contract", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "deploy.toml")]
    config: PathBuf,

    /// Chain JSON-RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Network identifier reported to the verification service
    #[arg(long)]
    network: Option<String>,

    /// Sender account for the creation transaction
    #[arg(long)]
    from: Option<Address>,

    /// GOVERNOR constructor argument
    #[arg(long)]
    governor: Option<Address>,

    /// Approver constructor argument
    #[arg(long)]
    approver: Option<Address>,

    /// Directory of compiled artifacts
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Block depth to reach before verification
    #[arg(long)]
    confirmations: Option<u64>,

    /// Verification API key (never stored in the config file)
    #[arg(long, env = "BASESCAN_API_KEY")]
    api_key: Option<String>,

    /// Deploy without calling the verification service
    #[arg(long)]
    skip_verify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("🪙 G-Naira deploy v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        DeployConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        DeployConfig::default()
    };

    // Override config with CLI args
    let config = config
        .with_rpc_url(args.rpc_url)
        .with_network(args.network)
        .with_from(args.from)
        .with_governor(args.governor)
        .with_approver(args.approver)
        .with_artifacts_dir(args.artifacts_dir)
        .with_confirmations(args.confirmations);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   Network: {}", config.network);
    info!("   RPC endpoint: {}", config.rpc_url);
    info!("   Contract: {}", config.contract_name);
    info!("   Governor: {}", config.governor);
    info!("   Approver: {}", config.approver);
    info!("   Confirmations: {}", config.confirmations);

    let chain = ChainClient::new(&config.rpc_url);
    let chain_id = chain.chain_id().await?;
    info!("🔗 Connected, chain id {chain_id}");

    // Verification needs an API key; without one we deploy and tell the
    // operator how to verify later
    let verifier = if args.skip_verify {
        None
    } else {
        match args.api_key.as_deref() {
            Some(key) => Some(EtherscanVerifier::new(&config.verifier_api_url, key)),
            None => {
                warn!("No API key (set BASESCAN_API_KEY); skipping verification");
                None
            }
        }
    };

    let artifacts = ArtifactRegistry::new(config.artifacts_dir.clone());
    let runner = DeployRunner::new(config, artifacts, chain, verifier);

    let outcome = runner.run().await?;

    info!("🏁 Deployment complete");
    info!("   Address: {}", outcome.address);
    info!("   Transaction: {}", outcome.tx_hash);
    info!("   Block: {}", outcome.block);
    info!(
        "   Verified: {}",
        if outcome.verified { "yes" } else { "no" }
    );

    Ok(())
}
