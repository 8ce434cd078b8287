// In crates/oracle/src/lib.rs

//! Decision oracles: the collaborators that propose trades.
//!
//! An oracle only ever produces raw text. Whatever it is — an LLM, a rule
//! engine, or a composition of both — its output is untrusted and goes
//! through [`parser::DecisionParser`] before anything else sees it.

pub mod error;
pub mod hybrid;
pub mod llm;
pub mod momentum;
pub mod parser;
pub mod types;

use async_trait::async_trait;
use core_types::Snapshot;
use rust_decimal::Decimal;

pub use error::{Error, Result};
pub use hybrid::HybridOracle;
pub use llm::LlmOracle;
pub use momentum::MomentumOracle;
pub use parser::DecisionParser;
pub use types::{LlmSettings, OracleMode, OracleSettings};

/// A source of trading decisions.
///
/// `signed_exposure` is the caller's current net position (long positive,
/// short negative, zero when flat) so the oracle can reason about exits.
/// Implementations do not enforce their own deadline; the caller wraps the
/// call in a hard timeout.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn produce_decision(
        &self,
        snapshot: &Snapshot,
        signed_exposure: f64,
        equity: Decimal,
    ) -> Result<String>;

    fn name(&self) -> &'static str;
}
