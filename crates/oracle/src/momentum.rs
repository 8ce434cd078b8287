// In crates/oracle/src/momentum.rs

use async_trait::async_trait;
use core_types::Snapshot;
use rust_decimal::Decimal;
use serde_json::json;

use crate::{DecisionOracle, Result};

/// Rule-based oracle: EMA cross with an RSI guard.
///
/// Emits the same raw JSON dialect an LLM would, so the rest of the pipeline
/// cannot tell the difference.
pub struct MomentumOracle;

const ENTRY_SIZE_PCT: f64 = 0.15;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_EXIT_LONG: f64 = 80.0;
const RSI_EXIT_SHORT: f64 = 20.0;

impl MomentumOracle {
    pub fn new() -> Self {
        Self
    }

    fn decide(&self, snapshot: &Snapshot, signed_exposure: f64) -> serde_json::Value {
        let fast = snapshot.indicators.get("ema_20").copied();
        let slow = snapshot.indicators.get("ema_50").copied();
        let rsi = snapshot
            .indicators
            .get("rsi_14")
            .copied()
            .unwrap_or(50.0);

        let (Some(fast), Some(slow)) = (fast, slow) else {
            return hold(0.0, "insufficient indicator data");
        };
        if slow <= 0.0 {
            return hold(0.0, "insufficient indicator data");
        }

        // Manage an existing position before looking for entries.
        if signed_exposure > 0.0 {
            return if fast < slow || rsi > RSI_EXIT_LONG {
                close(format!(
                    "exit long: ema20 {fast:.2} vs ema50 {slow:.2}, rsi {rsi:.1}"
                ))
            } else {
                hold(0.6, "long position, trend intact")
            };
        }
        if signed_exposure < 0.0 {
            return if fast > slow || rsi < RSI_EXIT_SHORT {
                close(format!(
                    "exit short: ema20 {fast:.2} vs ema50 {slow:.2}, rsi {rsi:.1}"
                ))
            } else {
                hold(0.6, "short position, trend intact")
            };
        }

        // Flat: look for a cross with room left on the RSI.
        if fast > slow && rsi < RSI_OVERBOUGHT {
            let confidence = cross_confidence(fast, slow);
            return entry("long", confidence, format!(
                "bullish cross: ema20 {fast:.2} > ema50 {slow:.2}, rsi {rsi:.1}"
            ));
        }
        if fast < slow && rsi > RSI_OVERSOLD {
            let confidence = cross_confidence(slow, fast);
            return entry("short", confidence, format!(
                "bearish cross: ema20 {fast:.2} < ema50 {slow:.2}, rsi {rsi:.1}"
            ));
        }

        hold(0.0, "no entry signal")
    }
}

impl Default for MomentumOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence grows with the spread between the EMAs, saturating at a 2%
/// separation.
fn cross_confidence(leading: f64, lagging: f64) -> f64 {
    let spread = ((leading - lagging) / lagging).clamp(0.0, 0.02);
    0.6 + 0.3 * (spread / 0.02)
}

fn hold(confidence: f64, reason: &str) -> serde_json::Value {
    json!({
        "action": "hold",
        "size_pct": 0.0,
        "confidence": confidence,
        "reason": reason,
        "position_type": "swing",
    })
}

fn close(reason: String) -> serde_json::Value {
    json!({
        "action": "close",
        "size_pct": 0.0,
        "confidence": 0.8,
        "reason": reason,
        "position_type": "swing",
    })
}

fn entry(action: &str, confidence: f64, reason: String) -> serde_json::Value {
    json!({
        "action": action,
        "size_pct": ENTRY_SIZE_PCT,
        "confidence": confidence,
        "reason": reason,
        "position_type": "swing",
    })
}

#[async_trait]
impl DecisionOracle for MomentumOracle {
    async fn produce_decision(
        &self,
        snapshot: &Snapshot,
        signed_exposure: f64,
        _equity: Decimal,
    ) -> Result<String> {
        Ok(self.decide(snapshot, signed_exposure).to_string())
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}
