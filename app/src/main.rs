// In app/src/main.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use core_types::Symbol;
use tokio::sync::{Mutex, watch};
use tracing_subscriber::EnvFilter;

use app_config::Settings;
use audit::JsonlAuditSink;
use engine::{AccountState, Engine, SymbolProcessor};
use execution::PaperExecutor;
use market_data::RestMarketData;
use oracle::{DecisionOracle, HybridOracle, LlmOracle, MomentumOracle, OracleMode};
use risk::RiskManager;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "An LLM-gated autonomous trading agent.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the trading agent until a shutdown signal arrives.
    Run,

    /// Loads and validates the configuration, then exits.
    CheckConfig,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // Configuration problems are fatal before any cycle runs.
    let settings = app_config::load_settings().context("failed to load configuration")?;
    let live_config = app_config::load_live_config().context("failed to load live.toml")?;

    let filter = EnvFilter::try_new(&settings.app.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_agent(settings, live_config).await?,
        Commands::CheckConfig => {
            tracing::info!(
                environment = %settings.app.environment,
                symbols = live_config.enabled_symbols().len(),
                "Configuration is valid"
            );
        }
    }

    Ok(())
}

async fn run_agent(settings: Settings, live_config: app_config::LiveRunConfig) -> Result<()> {
    tracing::info!(environment = %settings.app.environment, "Starting trading agent");

    // --- Shared collaborators ---
    let decision_oracle = build_oracle(&settings)?;
    let risk_manager = Arc::new(RiskManager::new(settings.risk.clone())?);
    let executor = Arc::new(PaperExecutor::new(settings.execution.clone())?);
    let market_data = Arc::new(RestMarketData::new(settings.market_data.clone()));
    let audit_sink = Arc::new(
        JsonlAuditSink::open(&settings.audit.log_path)
            .await
            .context("failed to open audit log")?,
    );
    let account = Arc::new(Mutex::new(AccountState::new(
        Utc::now(),
        settings.agent.starting_equity,
    )));

    // --- One processor per enabled symbol ---
    let oracle_timeout = Duration::from_secs(settings.oracle.timeout_secs);
    let processors: Vec<SymbolProcessor> = live_config
        .enabled_symbols()
        .into_iter()
        .map(|symbol| {
            tracing::info!(symbol = %symbol, "Setting up symbol processor");
            SymbolProcessor::new(
                Symbol(symbol),
                decision_oracle.clone(),
                oracle_timeout,
                risk_manager.clone(),
                executor.clone(),
                market_data.clone(),
                audit_sink.clone(),
                account.clone(),
            )
        })
        .collect();

    // --- Graceful shutdown wiring ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing the in-flight cycle");
        let _ = shutdown_tx.send(true);
    });

    let engine = Engine::new(
        processors,
        Duration::from_secs(settings.agent.loop_interval_secs),
        shutdown_rx,
    );
    engine.run().await
}

fn build_oracle(settings: &Settings) -> Result<Arc<dyn DecisionOracle>> {
    let oracle: Arc<dyn DecisionOracle> = match settings.oracle.mode {
        OracleMode::Rules => Arc::new(MomentumOracle::new()),
        OracleMode::Llm => {
            let llm = settings
                .oracle
                .llm
                .clone()
                .context("oracle mode 'llm' requires an [oracle.llm] section")?;
            Arc::new(LlmOracle::new(llm))
        }
        OracleMode::Hybrid => {
            let llm = settings
                .oracle
                .llm
                .clone()
                .context("oracle mode 'hybrid' requires an [oracle.llm] section")?;
            Arc::new(HybridOracle::new(MomentumOracle::new(), LlmOracle::new(llm)))
        }
    };
    tracing::info!(oracle = oracle.name(), "Decision oracle selected");
    Ok(oracle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
