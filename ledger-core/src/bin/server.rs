//! Ledger server binary
//!
//! Opens the ledger (creating genesis on first start) and keeps the stores
//! and event channel alive until interrupted.

use ledger_core::{amount, tasks, Config, Ledger};
use tracing::{info, warn};

fn load_config() -> anyhow::Result<Config> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LEDGER_CONFIG").ok());

    let config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::from_file(&path)?.with_env_overrides()?
        }
        None => Config::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting ledger server");

    let config = load_config()?;
    info!(
        "Configuration loaded - data dir: {}, difficulty: {}, reward: {}",
        config.data_dir.display(),
        config.chain.difficulty,
        config.chain.mining_reward
    );

    let ledger = Ledger::open(config).await?;

    let info = ledger.chain_info().await;
    info!(
        length = info.length,
        pending = info.pending_transactions,
        reward = %amount::format(i128::try_from(info.mining_reward).unwrap_or(i128::MAX)),
        "Ledger opened"
    );
    if !info.is_valid {
        warn!("Stored chain failed validation");
    }

    let report = tasks::update_cache_task(&ledger).await;
    if !report.success {
        warn!("{}", report.message);
    }

    tokio::signal::ctrl_c().await?;

    info!("Shutting down ledger server");
    Ok(())
}
