// In crates/position/src/lib.rs

//! Position lifecycle for one symbol: two independent slots (swing and scalp),
//! each a small state machine that only the symbol's own processor drives.

pub mod error;
pub mod sizing;

use chrono::{DateTime, Utc};
use core_types::{CompletedTrade, Decision, Position, PositionType, Side, Symbol};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

pub use error::{Error, Result};
pub use sizing::SizingOutcome;

/// Lifecycle of one (symbol, position-type) slot.
///
/// `Opening` and `Closing` exist only while an execution call is in flight;
/// between cycles a slot is always `Flat` or `Open`.
#[derive(Debug, Clone, Default)]
pub enum SlotState {
    #[default]
    Flat,
    Opening,
    Open(Position),
    Closing(Position),
}

/// Owns the swing and scalp slots for a single symbol.
#[derive(Debug)]
pub struct PositionManager {
    symbol: Symbol,
    swing: SlotState,
    scalp: SlotState,
}

impl PositionManager {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            swing: SlotState::Flat,
            scalp: SlotState::Flat,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn slot(&self, position_type: PositionType) -> &SlotState {
        match position_type {
            PositionType::Swing => &self.swing,
            PositionType::Scalp => &self.scalp,
        }
    }

    fn slot_mut(&mut self, position_type: PositionType) -> &mut SlotState {
        match position_type {
            PositionType::Swing => &mut self.swing,
            PositionType::Scalp => &mut self.scalp,
        }
    }

    /// The open position in a slot, if any. A slot mid-close still reports its
    /// position so risk checks see the true exposure.
    pub fn position(&self, position_type: PositionType) -> Option<&Position> {
        match self.slot(position_type) {
            SlotState::Open(p) | SlotState::Closing(p) => Some(p),
            SlotState::Flat | SlotState::Opening => None,
        }
    }

    /// Net exposure across both slots, signed (long positive, short negative).
    pub fn signed_exposure(&self) -> f64 {
        PositionType::ALL
            .iter()
            .filter_map(|t| self.position(*t))
            .map(|p| p.signed_quantity().to_f64().unwrap_or(0.0))
            .sum()
    }

    /// Reserve a slot for an entry. Fails if the slot is not flat.
    pub fn begin_open(&mut self, position_type: PositionType) -> Result<()> {
        match self.slot(position_type) {
            SlotState::Flat => {
                *self.slot_mut(position_type) = SlotState::Opening;
                Ok(())
            }
            _ => Err(Error::SlotOccupied {
                symbol: self.symbol.clone(),
                position_type,
            }),
        }
    }

    /// Land a filled entry into a slot reserved by [`begin_open`].
    ///
    /// [`begin_open`]: PositionManager::begin_open
    pub fn commit_open(&mut self, position: Position) -> Result<()> {
        let position_type = position.position_type;
        match self.slot(position_type) {
            SlotState::Opening => {
                info!(
                    symbol = %self.symbol,
                    position_type = %position_type,
                    side = ?position.side,
                    entry_price = %position.entry_price,
                    quantity = %position.quantity,
                    "Position opened"
                );
                *self.slot_mut(position_type) = SlotState::Open(position);
                Ok(())
            }
            _ => Err(Error::NoPendingTransition {
                symbol: self.symbol.clone(),
                position_type,
            }),
        }
    }

    /// Start closing an open position. The position stays visible while the
    /// close order is in flight.
    pub fn begin_close(&mut self, position_type: PositionType) -> Result<Position> {
        match std::mem::take(self.slot_mut(position_type)) {
            SlotState::Open(p) => {
                *self.slot_mut(position_type) = SlotState::Closing(p.clone());
                Ok(p)
            }
            other => {
                *self.slot_mut(position_type) = other;
                Err(Error::NoPosition {
                    symbol: self.symbol.clone(),
                    position_type,
                })
            }
        }
    }

    /// Finish a close started by [`begin_close`], returning the round trip.
    ///
    /// [`begin_close`]: PositionManager::begin_close
    pub fn commit_close(
        &mut self,
        position_type: PositionType,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<CompletedTrade> {
        match std::mem::take(self.slot_mut(position_type)) {
            SlotState::Closing(p) => {
                let realized_pnl = match p.side {
                    Side::Long => (exit_price - p.entry_price) * p.quantity,
                    Side::Short => (p.entry_price - exit_price) * p.quantity,
                };
                let trade = CompletedTrade {
                    symbol: p.symbol.clone(),
                    side: p.side,
                    position_type,
                    entry_price: p.entry_price,
                    exit_price,
                    quantity: p.quantity,
                    holding_secs: closed_at.timestamp() - p.opened_at,
                    realized_pnl,
                };
                info!(
                    symbol = %self.symbol,
                    position_type = %position_type,
                    exit_price = %exit_price,
                    realized_pnl = %realized_pnl,
                    "Position closed"
                );
                Ok(trade)
            }
            other => {
                *self.slot_mut(position_type) = other;
                Err(Error::NoPendingTransition {
                    symbol: self.symbol.clone(),
                    position_type,
                })
            }
        }
    }

    /// Roll back an in-flight transition after a failed execution call.
    /// `Opening` falls back to flat, `Closing` restores the open position.
    pub fn revert(&mut self, position_type: PositionType) {
        let state = std::mem::take(self.slot_mut(position_type));
        *self.slot_mut(position_type) = match state {
            SlotState::Opening => SlotState::Flat,
            SlotState::Closing(p) => SlotState::Open(p),
            other => other,
        };
    }

    /// Build the position record for a filled entry.
    ///
    /// The trailing distance is fixed at open from confidence; if the decision
    /// carried no stop, one is synthesized at the trailing distance so every
    /// position is protected from its first cycle.
    pub fn build_position(
        &self,
        decision: &Decision,
        side: Side,
        fill_price: Decimal,
        quantity: Decimal,
        leverage: f64,
        trailing_pct: f64,
        opened_at: DateTime<Utc>,
    ) -> Position {
        let stop_loss = decision
            .stop_loss
            .or_else(|| trailing_level(side, fill_price, trailing_pct));
        Position {
            symbol: self.symbol.clone(),
            side,
            position_type: decision.position_type,
            entry_price: fill_price,
            quantity,
            leverage,
            stop_loss,
            take_profit: decision.take_profit,
            trailing_pct,
            confidence: decision.confidence,
            high_water: fill_price,
            opened_at: opened_at.timestamp(),
        }
    }

    /// Advance the trailing stop for one slot against the latest price.
    ///
    /// The stop only ever tightens: a new level is installed when it is closer
    /// to the current price than the stored one, never when it is further.
    /// Returns the new stop when it moved.
    pub fn ratchet_trailing_stop(
        &mut self,
        position_type: PositionType,
        price: Decimal,
    ) -> Option<Decimal> {
        let symbol = self.symbol.clone();
        let slot = self.slot_mut(position_type);
        let SlotState::Open(p) = slot else {
            return None;
        };

        match p.side {
            Side::Long => {
                if price > p.high_water {
                    p.high_water = price;
                }
            }
            Side::Short => {
                if price < p.high_water {
                    p.high_water = price;
                }
            }
        }

        let candidate = trailing_level(p.side, p.high_water, p.trailing_pct)?;
        let tightened = match (p.side, p.stop_loss) {
            (_, None) => true,
            (Side::Long, Some(stop)) => candidate > stop,
            (Side::Short, Some(stop)) => candidate < stop,
        };
        if tightened {
            p.stop_loss = Some(candidate);
            info!(
                symbol = %symbol,
                position_type = %position_type,
                new_stop = %candidate,
                high_water = %p.high_water,
                "Trailing stop tightened"
            );
            return Some(candidate);
        }
        None
    }

    /// Check one slot's protective levels against the latest price. On a
    /// breach, returns a synthetic close decision (as raw oracle text) that is
    /// fed through the normal parse/risk/execute pipeline.
    pub fn protective_exit(&self, position_type: PositionType, price: Decimal) -> Option<String> {
        let p = match self.slot(position_type) {
            SlotState::Open(p) => p,
            _ => return None,
        };

        let stop_hit = match (p.side, p.stop_loss) {
            (Side::Long, Some(stop)) => price <= stop,
            (Side::Short, Some(stop)) => price >= stop,
            (_, None) => false,
        };
        let target_hit = match (p.side, p.take_profit) {
            (Side::Long, Some(tp)) => price >= tp,
            (Side::Short, Some(tp)) => price <= tp,
            (_, None) => false,
        };

        let reason = if stop_hit {
            format!("stop loss breached at {price}")
        } else if target_hit {
            format!("take profit reached at {price}")
        } else {
            return None;
        };

        Some(
            json!({
                "action": "close",
                "position_type": position_type.as_str(),
                "size_pct": 0.0,
                "confidence": 1.0,
                "reason": reason,
            })
            .to_string(),
        )
    }
}

/// Stop level at `trailing_pct` away from `reference`, on the losing side.
fn trailing_level(side: Side, reference: Decimal, trailing_pct: f64) -> Option<Decimal> {
    let pct = Decimal::from_f64(trailing_pct)?;
    Some(match side {
        Side::Long => reference * (Decimal::ONE - pct),
        Side::Short => reference * (Decimal::ONE + pct),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Action;
    use rust_decimal_macros::dec;

    fn manager() -> PositionManager {
        PositionManager::new(Symbol("BTCUSDT".to_string()))
    }

    fn decision(position_type: PositionType) -> Decision {
        Decision {
            action: Action::Long,
            size_pct: 0.1,
            confidence: 0.85,
            reason: "test".to_string(),
            position_type,
            stop_loss: None,
            take_profit: None,
        }
    }

    fn open_long(mgr: &mut PositionManager, position_type: PositionType, entry: Decimal) {
        mgr.begin_open(position_type).unwrap();
        let d = decision(position_type);
        let pos = mgr.build_position(&d, Side::Long, entry, dec!(1), 2.0, 0.10, Utc::now());
        mgr.commit_open(pos).unwrap();
    }

    #[test]
    fn swing_and_scalp_slots_are_independent() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        // The scalp slot is still free.
        assert!(mgr.begin_open(PositionType::Scalp).is_ok());
        // A second swing entry is not.
        assert!(matches!(
            mgr.begin_open(PositionType::Swing),
            Err(Error::SlotOccupied { .. })
        ));
    }

    #[test]
    fn failed_open_reverts_to_flat() {
        let mut mgr = manager();
        mgr.begin_open(PositionType::Swing).unwrap();
        mgr.revert(PositionType::Swing);
        assert!(mgr.position(PositionType::Swing).is_none());
        assert!(mgr.begin_open(PositionType::Swing).is_ok());
    }

    #[test]
    fn failed_close_restores_the_position() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        mgr.begin_close(PositionType::Swing).unwrap();
        mgr.revert(PositionType::Swing);
        let p = mgr.position(PositionType::Swing).unwrap();
        assert_eq!(p.entry_price, dec!(100));
    }

    #[test]
    fn close_computes_realized_pnl_for_both_sides() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        mgr.begin_close(PositionType::Swing).unwrap();
        let trade = mgr
            .commit_close(PositionType::Swing, dec!(110), Utc::now())
            .unwrap();
        assert_eq!(trade.realized_pnl, dec!(10));

        mgr.begin_open(PositionType::Scalp).unwrap();
        let d = Decision {
            position_type: PositionType::Scalp,
            ..decision(PositionType::Scalp)
        };
        let pos = mgr.build_position(&d, Side::Short, dec!(100), dec!(2), 1.0, 0.10, Utc::now());
        mgr.commit_open(pos).unwrap();
        mgr.begin_close(PositionType::Scalp).unwrap();
        let trade = mgr
            .commit_close(PositionType::Scalp, dec!(90), Utc::now())
            .unwrap();
        assert_eq!(trade.realized_pnl, dec!(20));
    }

    #[test]
    fn trailing_stop_never_loosens() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        // Entry stop sits 10% below the fill.
        assert_eq!(
            mgr.position(PositionType::Swing).unwrap().stop_loss,
            Some(dec!(90.0))
        );

        // Rally to 120 drags the stop up to 108.
        let moved = mgr.ratchet_trailing_stop(PositionType::Swing, dec!(120));
        assert_eq!(moved, Some(dec!(108.0)));

        // A pullback to 110 must not move the stop back down.
        let moved = mgr.ratchet_trailing_stop(PositionType::Swing, dec!(110));
        assert_eq!(moved, None);
        assert_eq!(
            mgr.position(PositionType::Swing).unwrap().stop_loss,
            Some(dec!(108.0))
        );
    }

    #[test]
    fn short_trailing_stop_follows_price_down() {
        let mut mgr = manager();
        mgr.begin_open(PositionType::Swing).unwrap();
        let d = decision(PositionType::Swing);
        let pos = mgr.build_position(&d, Side::Short, dec!(100), dec!(1), 1.0, 0.10, Utc::now());
        mgr.commit_open(pos).unwrap();

        let moved = mgr.ratchet_trailing_stop(PositionType::Swing, dec!(80));
        assert_eq!(moved, Some(dec!(88.0)));
        // Bounce back up: stop holds.
        assert_eq!(mgr.ratchet_trailing_stop(PositionType::Swing, dec!(95)), None);
    }

    #[test]
    fn protective_exit_emits_synthetic_close() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        // Price above the stop: nothing to do.
        assert!(mgr.protective_exit(PositionType::Swing, dec!(95)).is_none());

        let raw = mgr
            .protective_exit(PositionType::Swing, dec!(89))
            .expect("stop breach should synthesize a close");
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["action"], "close");
        assert_eq!(v["position_type"], "swing");
        assert!(v["reason"].as_str().unwrap().contains("stop loss"));
    }

    #[test]
    fn signed_exposure_nets_across_slots() {
        let mut mgr = manager();
        open_long(&mut mgr, PositionType::Swing, dec!(100));
        mgr.begin_open(PositionType::Scalp).unwrap();
        let d = Decision {
            position_type: PositionType::Scalp,
            ..decision(PositionType::Scalp)
        };
        let pos = mgr.build_position(&d, Side::Short, dec!(100), dec!(0.4), 1.0, 0.10, Utc::now());
        mgr.commit_open(pos).unwrap();
        assert!((mgr.signed_exposure() - 0.6).abs() < 1e-9);
    }
}
