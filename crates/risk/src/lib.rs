// In crates/risk/src/lib.rs

//! Stateful risk gate in front of the execution layer.
//!
//! Every parsed decision passes through an ordered rule chain before it may
//! touch the market. The chain is deterministic: given the same decision,
//! snapshot, position, equity and risk state it always produces the same
//! verdict, and its only state mutations are the documented approval
//! bookkeeping (cooldown timestamps, full-size streak) and the daily
//! re-baseline.

pub mod error;
pub mod state;
pub mod types;

use chrono::{DateTime, Utc};
use core_types::{Action, Decision, Position, Snapshot};
use num_traits::FromPrimitive;
use position::sizing;
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub use error::{Error, Result};
pub use state::{AccountRiskState, SlotRiskState, SymbolRiskState};
pub use types::{RiskSettings, RiskVerdict};

/// Decisions asking for the whole account this many times in a row trip the
/// oracle sanity breaker.
const FULL_SIZE_STREAK_LIMIT: u32 = 3;

pub struct RiskManager {
    settings: RiskSettings,
}

impl RiskManager {
    pub fn new(settings: RiskSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &RiskSettings {
        &self.settings
    }

    /// Run the rule chain. Rules are evaluated in order and the first failure
    /// wins; `hold` short-circuits to approval before any of them.
    ///
    /// `slot_state` is this symbol and position type's own slice; `account` is
    /// the shared daily-loss baseline and must be held under its lock for the
    /// duration of the call.
    pub fn validate(
        &self,
        decision: &Decision,
        snapshot: &Snapshot,
        open_position: Option<&Position>,
        equity: Decimal,
        slot_state: &mut SlotRiskState,
        account: &mut AccountRiskState,
        now: DateTime<Utc>,
    ) -> RiskVerdict {
        // 1. Holds are inert: approve without touching any state.
        if decision.action == Action::Hold {
            return RiskVerdict::Approved;
        }

        // 2. Nothing to close.
        if decision.action == Action::Close && open_position.is_none() {
            return RiskVerdict::Denied {
                reason: "no position to close".to_string(),
            };
        }

        // 3. A snapshot without a usable price cannot be traded on.
        if snapshot.price <= Decimal::ZERO {
            return RiskVerdict::Denied {
                reason: "no valid price".to_string(),
            };
        }

        // 4. Requested notional against the equity-usage cap.
        if decision.size_pct > self.settings.max_equity_usage {
            return RiskVerdict::Denied {
                reason: "exceeds max position size".to_string(),
            };
        }

        // 5. Resulting leverage, after the confidence multiplier, against the
        //    account-size-tiered ceiling.
        let resulting_leverage =
            decision.size_pct * sizing::leverage_multiplier(decision.confidence);
        let leverage_ceiling = sizing::tier_ceiling(equity, self.settings.max_leverage);
        if resulting_leverage > leverage_ceiling {
            return RiskVerdict::Denied {
                reason: "exceeds max leverage".to_string(),
            };
        }

        // 6. Daily loss cap, re-baselined at the first observation of each
        //    new UTC day. Closes are always allowed through this rule so a
        //    losing day can still be flattened.
        if let Some(cap) = self.settings.daily_loss_cap_pct {
            let baseline = account.observe(now, equity);
            if let Some(cap_dec) = Decimal::from_f64(cap) {
                let floor = baseline * (Decimal::ONE - cap_dec);
                if equity < floor && decision.action != Action::Close {
                    return RiskVerdict::Denied {
                        reason: "daily loss cap reached".to_string(),
                    };
                }
            }
        }

        // 7. Entry cooldown per symbol and position type.
        if let (Some(cooldown), true) = (self.settings.cooldown_secs, decision.action.is_entry()) {
            if let Some(last_open) = slot_state.last_open_at {
                let elapsed = (now - last_open).num_seconds();
                if elapsed < cooldown as i64 {
                    return RiskVerdict::Denied {
                        reason: "cooldown active".to_string(),
                    };
                }
            }
        }

        // 8. Oracle sanity breaker: an oracle that keeps demanding the whole
        //    account is not trusted with another order. Not a denial, the
        //    decision was within the rules; we just sit this cycle out.
        if decision.size_pct >= 1.0 && slot_state.full_size_streak >= FULL_SIZE_STREAK_LIMIT {
            warn!(
                symbol = %snapshot.symbol,
                position_type = %decision.position_type,
                streak = slot_state.full_size_streak,
                "Oracle sanity breaker tripped, forcing hold"
            );
            slot_state.full_size_streak = 0;
            return RiskVerdict::ForcedHold {
                reason: "oracle sanity check: repeated full-size decisions".to_string(),
            };
        }

        // Approval bookkeeping.
        if decision.action.is_entry() {
            slot_state.last_open_at = Some(now);
        }
        if decision.size_pct >= 1.0 {
            slot_state.full_size_streak += 1;
        } else {
            slot_state.full_size_streak = 0;
        }

        debug!(
            symbol = %snapshot.symbol,
            action = %decision.action,
            position_type = %decision.position_type,
            "Decision approved"
        );
        RiskVerdict::Approved
    }
}
