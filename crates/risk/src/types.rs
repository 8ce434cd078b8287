// In crates/risk/src/types.rs

use core_types::RiskResult;
use serde::Deserialize;

/// Risk limits, loaded from configuration and fixed for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    /// Largest fraction of equity a single decision may commit, in (0.0, 1.0].
    pub max_equity_usage: f64,
    /// Hard leverage ceiling for accounts above the top size tier.
    pub max_leverage: f64,
    /// Fraction of the daily starting equity that may be lost before all
    /// non-close actions are refused for the rest of the UTC day.
    pub daily_loss_cap_pct: Option<f64>,
    /// Minimum seconds between approved entries on the same symbol and
    /// position type.
    pub cooldown_secs: Option<u64>,
}

impl RiskSettings {
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.max_equity_usage > 0.0 && self.max_equity_usage <= 1.0) {
            return Err(crate::Error::InvalidSettings(format!(
                "max_equity_usage must be in (0, 1], got {}",
                self.max_equity_usage
            )));
        }
        if self.max_leverage < 1.0 {
            return Err(crate::Error::InvalidSettings(format!(
                "max_leverage must be at least 1.0, got {}",
                self.max_leverage
            )));
        }
        if let Some(cap) = self.daily_loss_cap_pct {
            if !(cap > 0.0 && cap < 1.0) {
                return Err(crate::Error::InvalidSettings(format!(
                    "daily_loss_cap_pct must be in (0, 1), got {cap}"
                )));
            }
        }
        Ok(())
    }
}

/// The full outcome of the rule chain.
///
/// `ForcedHold` is distinct from `Denied`: the decision itself was not against
/// the rules, but the oracle's behavior tripped a sanity breaker and the safe
/// reaction is to do nothing this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskVerdict {
    Approved,
    Denied { reason: String },
    ForcedHold { reason: String },
}

impl RiskVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskVerdict::Approved)
    }

    /// Flatten to the two-field form recorded in the audit log.
    pub fn to_risk_result(&self) -> RiskResult {
        match self {
            RiskVerdict::Approved => RiskResult::approved(),
            RiskVerdict::Denied { reason } | RiskVerdict::ForcedHold { reason } => {
                RiskResult::denied(reason.clone())
            }
        }
    }
}
