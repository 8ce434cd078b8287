// In crates/oracle/src/types.rs

use serde::Deserialize;

/// Which decision oracle drives the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    /// LLM decides directly from the market snapshot.
    Llm,
    /// Pure rule-based momentum signals, no LLM involved.
    Rules,
    /// Rules generate signals, the LLM only vetoes entries.
    Hybrid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSettings {
    pub mode: OracleMode,
    /// Hard ceiling on one oracle call, enforced by the caller.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Required for `llm` and `hybrid` modes.
    pub llm: Option<LlmSettings>,
}

fn default_timeout_secs() -> u64 {
    5
}

/// Connection details for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}
