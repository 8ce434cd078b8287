// In crates/oracle/src/parser.rs

//! The trust boundary between the oracle and the rest of the agent.
//!
//! `parse` is a total function: whatever the oracle sends back, the output is
//! a well-formed [`Decision`], with malformed input collapsing to a forced
//! hold that carries the failure cause in its reason.

use core_types::{Action, Decision, PositionType};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{error, warn};

pub struct DecisionParser;

impl DecisionParser {
    /// Parse raw oracle text into a decision. Never fails.
    pub fn parse(raw_response: &str) -> Decision {
        let cleaned = strip_code_fences(raw_response);

        let value: Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(err) => {
                error!(%err, raw = raw_response, "Oracle output is not valid JSON");
                return Decision::forced_hold("parse error");
            }
        };
        let Some(obj) = value.as_object() else {
            error!(raw = raw_response, "Oracle output is not a JSON object");
            return Decision::forced_hold("parse error");
        };

        let action = match obj.get("action").and_then(Value::as_str) {
            Some(s) => match s.parse::<Action>() {
                Ok(a) => a,
                Err(_) => {
                    error!(action = s, raw = raw_response, "Unknown action literal");
                    return Decision::forced_hold("invalid action");
                }
            },
            None => {
                error!(raw = raw_response, "Missing or non-string action field");
                return Decision::forced_hold("invalid action");
            }
        };

        let size_pct = match obj.get("size_pct").and_then(Value::as_f64) {
            Some(v) if (0.0..=1.0).contains(&v) => v,
            Some(v) => {
                error!(size_pct = v, raw = raw_response, "size_pct out of range");
                return Decision::forced_hold("invalid size");
            }
            // Holds and closes routinely omit size_pct.
            None if !action.is_entry() => 0.0,
            None => {
                error!(raw = raw_response, "Missing or non-numeric size_pct");
                return Decision::forced_hold("invalid size");
            }
        };

        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let confidence = obj
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        let position_type = match obj.get("position_type").and_then(Value::as_str) {
            Some(s) => s.parse::<PositionType>().unwrap_or_else(|_| {
                warn!(position_type = s, "Unknown position type, defaulting to swing");
                PositionType::Swing
            }),
            None => PositionType::Swing,
        };

        Decision {
            action,
            size_pct,
            confidence,
            reason,
            position_type,
            stop_loss: optional_price(obj.get("stop_loss")),
            take_profit: optional_price(obj.get("take_profit")),
        }
    }
}

/// Non-numeric or non-positive protective levels are dropped, not fatal.
fn optional_price(value: Option<&Value>) -> Option<Decimal> {
    let v = value?.as_f64()?;
    let price = Decimal::from_f64(v)?;
    (price > Decimal::ZERO).then_some(price)
}

/// LLMs like to wrap JSON in a markdown code block; peel it off.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
