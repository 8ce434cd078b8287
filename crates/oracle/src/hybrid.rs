// In crates/oracle/src/hybrid.rs

use async_trait::async_trait;
use core_types::Snapshot;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, warn};

use crate::momentum::MomentumOracle;
use crate::{DecisionOracle, DecisionParser, LlmOracle, Result};

/// Rules propose, the LLM disposes.
///
/// Momentum signals drive all trading; the LLM is consulted only on entries,
/// as a veto-or-approve risk filter. Exits and holds never wait on the LLM,
/// and a failed filter call approves by default so a flaky endpoint cannot
/// freeze the strategy.
pub struct HybridOracle {
    strategy: MomentumOracle,
    filter: LlmOracle,
}

impl HybridOracle {
    pub fn new(strategy: MomentumOracle, filter: LlmOracle) -> Self {
        Self { strategy, filter }
    }

    async fn filter_approves(&self, snapshot: &Snapshot, raw_signal: &str) -> bool {
        let prompt = format!(
            "You are a risk filter for a trading bot. A rule-based strategy \
             proposes this entry on {symbol} at price {price}:\n\
             {raw_signal}\n\
             \n\
             Veto ONLY on serious red flags; when in doubt, approve.\n\
             Your first word MUST be APPROVE or VETO, then a brief reason.",
            symbol = snapshot.symbol,
            price = snapshot.price,
        );

        let response = match self.filter.chat(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                // The filter is advisory; its outage must not block the strategy.
                warn!(%err, "Entry filter call failed, approving by default");
                return true;
            }
        };

        let lowered = response.to_lowercase();
        let first_word = lowered.split_whitespace().next().unwrap_or("");
        match first_word {
            "veto" | "reject" | "no" => {
                debug!(response = %response, "Entry filter vetoed the signal");
                false
            }
            "approve" => true,
            _ => {
                warn!(response = %response, "Unclear filter response, approving by default");
                true
            }
        }
    }
}

#[async_trait]
impl DecisionOracle for HybridOracle {
    async fn produce_decision(
        &self,
        snapshot: &Snapshot,
        signed_exposure: f64,
        equity: Decimal,
    ) -> Result<String> {
        let raw_signal = self
            .strategy
            .produce_decision(snapshot, signed_exposure, equity)
            .await?;

        let signal = DecisionParser::parse(&raw_signal);
        if !signal.action.is_entry() {
            return Ok(raw_signal);
        }

        if self.filter_approves(snapshot, &raw_signal).await {
            Ok(raw_signal)
        } else {
            Ok(json!({
                "action": "hold",
                "size_pct": 0.0,
                "confidence": 0.0,
                "reason": format!("entry filter vetoed: {}", signal.reason),
                "position_type": signal.position_type.as_str(),
            })
            .to_string())
        }
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}
