// In crates/execution/src/types.rs

use core_types::{Side, Symbol};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Whether an order opens new exposure or unwinds existing exposure. Decides
/// which way slippage hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderIntent {
    Open,
    Close,
}

/// Everything the gateway needs for one order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub intent: OrderIntent,
    /// Base-asset quantity, always positive.
    pub quantity: Decimal,
    /// Last observed market price, used as the fill reference.
    pub reference_price: Decimal,
}

impl OrderRequest {
    /// True when this order buys the base asset (opening a long or closing a
    /// short).
    pub fn is_buy(&self) -> bool {
        matches!(
            (self.side, self.intent),
            (Side::Long, OrderIntent::Open) | (Side::Short, OrderIntent::Close)
        )
    }
}

/// Paper-trading fill model.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSettings {
    /// Adverse price movement applied to every fill, as a fraction.
    pub slippage_pct: f64,
    /// Taker fee, as a fraction of notional, folded into the fill price.
    pub fee_pct: f64,
}

impl ExecutionSettings {
    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [("slippage_pct", self.slippage_pct), ("fee_pct", self.fee_pct)] {
            if !(0.0..0.1).contains(&value) {
                return Err(crate::Error::InvalidSettings(format!(
                    "{name} must be in [0, 0.1), got {value}"
                )));
            }
        }
        Ok(())
    }
}
