//! devchain CLI
//!
//! - `devchain setup`  -> deploy + mint + snapshot, or revert + re-snapshot
//! - `devchain status` -> chain and mock token state

use alloy::primitives::{utils::format_units, Address, U256};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use devchain::{
    AnvilTestClient, DevChainConfig, EnvironmentState, ForgeArtifact, PublicClient, QueryCache,
    SetupAction, SetupOutcome, SharedEnvironment, SnapshotId, WalletClient, ALICE,
};

#[derive(Parser)]
#[command(name = "devchain")]
#[command(about = "Mock token setup and snapshot reset for a local test chain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the mock token, or revert to the given snapshot
    ///
    /// Prints the resulting state as KEY=value lines.
    Setup {
        /// Snapshot from a previous run (overrides SNAPSHOT_ID)
        #[arg(long)]
        snapshot_id: Option<String>,

        /// Forge artifact for the mock token (overrides MOCK_ERC20_ARTIFACT)
        #[arg(long)]
        artifact: Option<PathBuf>,
    },

    /// Show chain and token state
    Status {
        /// Mock token address
        #[arg(long, env = "TOKEN_ADDRESS")]
        token: Address,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = DevChainConfig::load()?;
    let rpc_url = config.rpc_url.to_string();
    let public = Arc::new(PublicClient::new(
        &rpc_url,
        config.receipt_timeout,
        config.poll_interval,
    )?);
    let chain_id = match config.chain_id {
        Some(id) => id,
        None => public.chain_id().await?,
    };

    match cli.command {
        Commands::Setup {
            snapshot_id,
            artifact,
        } => {
            if let Some(id) = snapshot_id {
                config.snapshot_id = Some(SnapshotId::new(id));
            }
            if let Some(path) = artifact {
                config.artifact_path = path;
            }

            let artifact = ForgeArtifact::from_file(&config.artifact_path)?;
            let environment = SharedEnvironment::with_state(
                chain_id,
                EnvironmentState {
                    snapshot_id: config.snapshot_id.clone(),
                    token: None,
                },
            );
            // Nothing is cached within one CLI run; library callers share a
            // long-lived cache with their read paths.
            let cache = Arc::new(QueryCache::<U256>::new(config.cache));
            let action = SetupAction::new(
                Arc::new(WalletClient::new(&rpc_url)?),
                public,
                Arc::new(AnvilTestClient::new(&rpc_url)),
                Arc::new(environment),
                cache,
                artifact.creation_code().clone(),
            );

            match action.execute().await? {
                SetupOutcome::Deployed { token, snapshot_id } => {
                    tracing::info!("Mock token {} ready", token.symbol);
                    println!("TOKEN_ADDRESS={}", token.address);
                    println!("SNAPSHOT_ID={}", snapshot_id);
                }
                SetupOutcome::Reset {
                    reverted_to,
                    snapshot_id,
                } => {
                    tracing::info!("Chain reset to snapshot {}", reverted_to);
                    println!("SNAPSHOT_ID={}", snapshot_id);
                }
            }
        }

        Commands::Status { token } => {
            let block = public.block_number().await?;
            let (name, symbol, decimals) = public.token_metadata(token).await?;
            let balance = public.token_balance(token, ALICE).await?;

            println!("chain id:  {}", chain_id);
            println!("block:     {}", block);
            println!("token:     {} ({}) at {}", name, symbol, token);
            println!("decimals:  {}", decimals);
            println!(
                "balance:   {} {} (ALICE {})",
                format_units(balance, decimals)?,
                symbol,
                ALICE
            );
        }
    }

    Ok(())
}
