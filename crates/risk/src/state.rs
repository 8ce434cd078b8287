// In crates/risk/src/state.rs

//! Mutable risk bookkeeping. Cooldown and oracle-sanity state is partitioned
//! per (symbol, position type) and owned by that symbol's processor, so no
//! locking is needed there. The daily-equity baseline is account-wide and must
//! live behind a single lock shared by every processor.

use chrono::{DateTime, NaiveDate, Utc};
use core_types::PositionType;
use rust_decimal::Decimal;
use tracing::info;

/// Per-(symbol, position-type) slice of risk state.
#[derive(Debug, Clone, Default)]
pub struct SlotRiskState {
    /// When the last entry on this slot was approved.
    pub last_open_at: Option<DateTime<Utc>>,
    /// Consecutive approved decisions that asked for the full account.
    pub full_size_streak: u32,
}

/// Both slots' risk state for one symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolRiskState {
    swing: SlotRiskState,
    scalp: SlotRiskState,
}

impl SymbolRiskState {
    pub fn slot(&self, position_type: PositionType) -> &SlotRiskState {
        match position_type {
            PositionType::Swing => &self.swing,
            PositionType::Scalp => &self.scalp,
        }
    }

    pub fn slot_mut(&mut self, position_type: PositionType) -> &mut SlotRiskState {
        match position_type {
            PositionType::Swing => &mut self.swing,
            PositionType::Scalp => &mut self.scalp,
        }
    }
}

/// Account-wide state for the daily loss cap.
#[derive(Debug, Clone)]
pub struct AccountRiskState {
    baseline_day: NaiveDate,
    daily_start_equity: Decimal,
}

impl AccountRiskState {
    pub fn new(now: DateTime<Utc>, equity: Decimal) -> Self {
        Self {
            baseline_day: now.date_naive(),
            daily_start_equity: equity,
        }
    }

    /// Current baseline, re-anchored to today's first observed equity when a
    /// new UTC day has started since the last call.
    pub fn observe(&mut self, now: DateTime<Utc>, equity: Decimal) -> Decimal {
        let today = now.date_naive();
        if today != self.baseline_day {
            info!(
                %today,
                equity = %equity,
                "New UTC day, re-baselining daily starting equity"
            );
            self.baseline_day = today;
            self.daily_start_equity = equity;
        }
        self.daily_start_equity
    }

    pub fn daily_start_equity(&self) -> Decimal {
        self.daily_start_equity
    }
}
