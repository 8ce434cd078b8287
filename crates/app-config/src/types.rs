// In crates/app-config/src/types.rs

use audit::AuditSettings;
use execution::ExecutionSettings;
use market_data::MarketDataSettings;
use oracle::{OracleMode, OracleSettings};
use risk::RiskSettings;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Cycle pacing and account bookkeeping.
    pub agent: AgentSettings,
    pub risk: RiskSettings,
    pub oracle: OracleSettings,
    pub execution: ExecutionSettings,
    pub market_data: MarketDataSettings,
    pub audit: AuditSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AgentSettings {
    /// Wall-clock seconds between cycle starts.
    pub loop_interval_secs: u64,
    /// Paper-account equity at startup, in the quote currency.
    pub starting_equity: Decimal,
}

impl Settings {
    /// All range checks that must hold before the first cycle runs. A failure
    /// here aborts startup.
    pub fn validate(&self) -> crate::Result<()> {
        if self.agent.loop_interval_secs == 0 {
            return Err(crate::Error::Invalid(
                "agent.loop_interval_secs must be positive".to_string(),
            ));
        }
        if self.agent.starting_equity <= Decimal::ZERO {
            return Err(crate::Error::Invalid(
                "agent.starting_equity must be positive".to_string(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(crate::Error::Invalid(
                "oracle.timeout_secs must be positive".to_string(),
            ));
        }
        if matches!(self.oracle.mode, OracleMode::Llm | OracleMode::Hybrid)
            && self.oracle.llm.is_none()
        {
            return Err(crate::Error::Invalid(format!(
                "oracle mode {:?} requires an [oracle.llm] section",
                self.oracle.mode
            )));
        }
        self.risk
            .validate()
            .map_err(|e| crate::Error::Invalid(e.to_string()))?;
        self.execution
            .validate()
            .map_err(|e| crate::Error::Invalid(e.to_string()))?;
        Ok(())
    }
}

// --- Structs for live.toml Configuration ---

/// The symbol set for a trading run.
#[derive(Deserialize, Debug, Clone)]
pub struct LiveRunConfig {
    #[serde(rename = "symbols")]
    pub symbol_configs: Vec<SymbolConfig>,
}

/// Configuration for a single traded symbol.
#[derive(Deserialize, Debug, Clone)]
pub struct SymbolConfig {
    pub symbol: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl LiveRunConfig {
    /// Symbols that will actually be traded this run.
    pub fn enabled_symbols(&self) -> Vec<String> {
        self.symbol_configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.symbol.clone())
            .collect()
    }
}
