// In crates/core-types/src/types.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A trading symbol, e.g. "BTCUSDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical trade intent produced by the decision parser.
///
/// This is a closed enum: downstream code matches exhaustively, so an
/// unexpected fifth action literal cannot survive past the parser boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Long,
    Short,
    Close,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Long => "long",
            Action::Short => "short",
            Action::Close => "close",
            Action::Hold => "hold",
        }
    }

    /// Opening actions are the ones gated by cooldowns.
    pub fn is_entry(&self) -> bool {
        matches!(self, Action::Long | Action::Short)
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Action::Long),
            "short" => Ok(Action::Short),
            "close" => Ok(Action::Close),
            "hold" => Ok(Action::Hold),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// The holding-horizon style of a position.
///
/// Swing and scalp positions on the same symbol live in independent slots and
/// may coexist; two positions of the same type may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Swing,
    Scalp,
}

impl PositionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Swing => "swing",
            PositionType::Scalp => "scalp",
        }
    }

    pub const ALL: [PositionType; 2] = [PositionType::Swing, PositionType::Scalp];
}

impl FromStr for PositionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swing" => Ok(PositionType::Swing),
            "scalp" => Ok(PositionType::Scalp),
            other => Err(Error::UnknownPositionType(other.to_string())),
        }
    }
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated trading decision. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Fraction of equity the oracle wants to commit, in [0.0, 1.0].
    pub size_pct: f64,
    /// Oracle confidence in [0.0, 1.0]; defaults to a neutral 0.5 if omitted.
    pub confidence: f64,
    pub reason: String,
    pub position_type: PositionType,
    /// Optional protective levels proposed by the oracle.
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl Decision {
    /// The decision every malformed or missing oracle response collapses to.
    pub fn forced_hold(cause: &str) -> Self {
        Self {
            action: Action::Hold,
            size_pct: 0.0,
            confidence: 0.0,
            reason: format!("forced hold: {cause}"),
            position_type: PositionType::Swing,
            stop_loss: None,
            take_profit: None,
        }
    }
}

/// A normalized market data snapshot for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: Symbol,
    /// Unix milliseconds.
    pub timestamp_ms: i64,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Precomputed indicator values keyed by name (e.g. "ema_20", "rsi_14").
    #[serde(default)]
    pub indicators: HashMap<String, f64>,
}

/// The outcome of risk validation, as it appears in the audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResult {
    pub approved: bool,
    /// Empty iff approved.
    pub reason: String,
}

impl RiskResult {
    pub fn approved() -> Self {
        Self {
            approved: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }
}

/// An open position in one (symbol, position-type) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    pub position_type: PositionType,
    pub entry_price: Decimal,
    /// Quantity in the base asset; always positive (direction lives in `side`).
    pub quantity: Decimal,
    pub leverage: f64,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Trailing distance as a fraction of price, assigned at open from
    /// confidence and fixed for the life of the position.
    pub trailing_pct: f64,
    pub confidence: f64,
    /// Best favorable price seen since entry: the highest price for a long,
    /// the lowest for a short. Drives the trailing-stop ratchet.
    pub high_water: Decimal,
    /// Unix seconds.
    pub opened_at: i64,
}

impl Position {
    /// Signed quantity: positive for long, negative for short.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Side::Long => self.quantity,
            Side::Short => -self.quantity,
        }
    }
}

/// The result of one execution-gateway call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub executed: bool,
    pub order_id: Option<String>,
    pub filled_size: Option<Decimal>,
    pub fill_price: Option<Decimal>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn not_executed(error: impl Into<String>) -> Self {
        Self {
            executed: false,
            order_id: None,
            filled_size: None,
            fill_price: None,
            error: Some(error.into()),
        }
    }
}

/// A finished round trip, emitted when a position slot goes back to flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub symbol: Symbol,
    pub side: Side,
    pub position_type: PositionType,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub holding_secs: i64,
    pub realized_pnl: Decimal,
}

/// One append-only audit record per decision processed. A symbol's cycle
/// normally yields exactly one; when both position slots breach their
/// protective levels on the same tick, each synthetic close gets its own
/// record.
///
/// This schema is the durable contract external tooling replays; field names
/// are stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Unix seconds.
    pub timestamp: i64,
    pub symbol: String,
    pub market_price: Decimal,
    /// Signed total position (swing + scalp) before this cycle acted.
    pub position_before: f64,
    pub raw_oracle_output: String,
    pub parsed_action: String,
    pub parsed_size_pct: f64,
    pub parsed_reason: String,
    pub risk_approved: bool,
    pub risk_reason: String,
    pub executed: bool,
    pub order_id: Option<String>,
    pub filled_size: Option<Decimal>,
    pub fill_price: Option<Decimal>,
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn action_round_trips_through_str() {
        for (text, action) in [
            ("long", Action::Long),
            ("short", Action::Short),
            ("close", Action::Close),
            ("hold", Action::Hold),
        ] {
            assert_eq!(text.parse::<Action>().unwrap(), action);
            assert_eq!(action.as_str(), text);
        }
        assert!("buy".parse::<Action>().is_err());
    }

    #[test]
    fn forced_hold_is_inert() {
        let d = Decision::forced_hold("parse error");
        assert_eq!(d.action, Action::Hold);
        assert_eq!(d.size_pct, 0.0);
        assert!(d.reason.starts_with("forced hold:"));
    }

    #[test]
    fn signed_quantity_follows_side() {
        let mut pos = Position {
            symbol: Symbol("BTCUSDT".to_string()),
            side: Side::Long,
            position_type: PositionType::Swing,
            entry_price: dec!(50_000),
            quantity: dec!(0.5),
            leverage: 2.0,
            stop_loss: None,
            take_profit: None,
            trailing_pct: 0.10,
            confidence: 0.8,
            high_water: dec!(50_000),
            opened_at: 0,
        };
        assert_eq!(pos.signed_quantity(), dec!(0.5));
        pos.side = Side::Short;
        assert_eq!(pos.signed_quantity(), dec!(-0.5));
    }

    #[test]
    fn cycle_record_serializes_with_stable_field_names() {
        let record = CycleRecord {
            timestamp: 1_700_000_000,
            symbol: "ETHUSDT".to_string(),
            market_price: dec!(3000),
            position_before: 0.0,
            raw_oracle_output: "{}".to_string(),
            parsed_action: "hold".to_string(),
            parsed_size_pct: 0.0,
            parsed_reason: "forced hold: parse error".to_string(),
            risk_approved: true,
            risk_reason: String::new(),
            executed: false,
            order_id: None,
            filled_size: None,
            fill_price: None,
            mode: "paper".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["symbol"], "ETHUSDT");
        assert_eq!(json["parsed_action"], "hold");
        assert!(json.get("raw_oracle_output").is_some());
    }
}
