// In crates/engine/src/processor.rs

//! Per-symbol pipeline: snapshot, oracle, parse, risk, execute, record.
//!
//! A processor owns everything private to its symbol (position slots, the
//! cooldown/sanity slice of risk state) and shares only the account-wide
//! state behind a lock. Every failure inside the pipeline is absorbed here:
//! `run_cycle` never returns an error and never panics its task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use core_types::{Action, CycleRecord, Decision, ExecutionResult, PositionType, Side, Snapshot, Symbol};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, warn};

use audit::AuditSink;
use execution::{Executor, OrderIntent, OrderRequest};
use market_data::MarketDataProvider;
use oracle::{DecisionOracle, DecisionParser};
use position::{PositionManager, sizing};
use risk::{RiskManager, RiskVerdict, SymbolRiskState};

use crate::AccountState;

pub struct SymbolProcessor {
    symbol: Symbol,
    positions: PositionManager,
    risk_state: SymbolRiskState,
    oracle: Arc<dyn DecisionOracle>,
    oracle_timeout: Duration,
    risk: Arc<RiskManager>,
    executor: Arc<dyn Executor>,
    market_data: Arc<dyn MarketDataProvider>,
    audit: Arc<dyn AuditSink>,
    account: Arc<Mutex<AccountState>>,
}

impl SymbolProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        oracle: Arc<dyn DecisionOracle>,
        oracle_timeout: Duration,
        risk: Arc<RiskManager>,
        executor: Arc<dyn Executor>,
        market_data: Arc<dyn MarketDataProvider>,
        audit: Arc<dyn AuditSink>,
        account: Arc<Mutex<AccountState>>,
    ) -> Self {
        Self {
            positions: PositionManager::new(symbol.clone()),
            risk_state: SymbolRiskState::default(),
            symbol,
            oracle,
            oracle_timeout,
            risk,
            executor,
            market_data,
            audit,
            account,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// One full cycle for this symbol. Infallible by design: every error path
    /// degrades to a logged no-op and an audit record where one is due.
    pub async fn run_cycle(&mut self) {
        let now = Utc::now();
        let position_before = self.positions.signed_exposure();

        let snapshot = match self.market_data.fetch_snapshot(&self.symbol).await {
            Ok(s) => s,
            Err(err) => {
                warn!(symbol = %self.symbol, %err, "Market data unavailable, holding");
                self.append_record(self.data_unavailable_record(position_before, now))
                    .await;
                return;
            }
        };

        // Ratchet trailing stops against the fresh price before anything else
        // looks at the protective levels.
        for position_type in PositionType::ALL {
            self.positions
                .ratchet_trailing_stop(position_type, snapshot.price);
        }

        // A breached stop or target preempts the oracle: the synthetic close
        // runs through the same parse/risk/execute pipeline a real decision
        // would, so it is audited and risk-checked identically.
        let exits: Vec<String> = PositionType::ALL
            .iter()
            .filter_map(|t| self.positions.protective_exit(*t, snapshot.price))
            .collect();
        if !exits.is_empty() {
            for raw in exits {
                info!(symbol = %self.symbol, "Protective level breached");
                self.process_decision(&snapshot, position_before, raw, now)
                    .await;
            }
            return;
        }

        let raw = self.request_raw_decision(&snapshot).await;
        self.process_decision(&snapshot, position_before, raw, now)
            .await;
    }

    /// Ask the oracle, bounded by the hard timeout. Failures never propagate:
    /// they are substituted with a forced-hold raw response so the rest of the
    /// pipeline (and the audit trail) proceeds uniformly.
    async fn request_raw_decision(&self, snapshot: &Snapshot) -> String {
        let equity = self.account.lock().await.equity;
        let exposure = self.positions.signed_exposure();

        let call = self.oracle.produce_decision(snapshot, exposure, equity);
        match timeout(self.oracle_timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!(symbol = %self.symbol, %err, "Oracle call failed, forcing hold");
                forced_hold_raw(&format!("oracle error: {err}"))
            }
            Err(_) => {
                warn!(
                    symbol = %self.symbol,
                    timeout_secs = self.oracle_timeout.as_secs(),
                    "Oracle call timed out, forcing hold"
                );
                forced_hold_raw("oracle timeout")
            }
        }
    }

    /// Steps 3-6 of the pipeline: parse, risk-validate, execute, record.
    ///
    /// The audit record always carries the decision as parsed, even when the
    /// verdict rewrote the effective action to a hold.
    async fn process_decision(
        &mut self,
        snapshot: &Snapshot,
        position_before: f64,
        raw: String,
        now: DateTime<Utc>,
    ) {
        let decision = DecisionParser::parse(&raw);
        let open_position = self.positions.position(decision.position_type).cloned();

        let (verdict, equity) = {
            let mut account = self.account.lock().await;
            let equity = account.equity;
            let verdict = self.risk.validate(
                &decision,
                snapshot,
                open_position.as_ref(),
                equity,
                self.risk_state.slot_mut(decision.position_type),
                &mut account.risk,
                now,
            );
            (verdict, equity)
        };

        let execution = match &verdict {
            RiskVerdict::Approved if decision.action != Action::Hold => {
                self.execute_decision(&decision, snapshot, equity, now).await
            }
            RiskVerdict::Approved => None,
            RiskVerdict::Denied { reason } => {
                info!(
                    symbol = %self.symbol,
                    action = %decision.action,
                    reason = %reason,
                    "Decision denied, holding instead"
                );
                None
            }
            RiskVerdict::ForcedHold { reason } => {
                warn!(symbol = %self.symbol, reason = %reason, "Decision forced to hold");
                None
            }
        };

        let risk_result = verdict.to_risk_result();
        let record = CycleRecord {
            timestamp: now.timestamp(),
            symbol: self.symbol.0.clone(),
            market_price: snapshot.price,
            position_before,
            raw_oracle_output: raw,
            parsed_action: decision.action.as_str().to_string(),
            parsed_size_pct: decision.size_pct,
            parsed_reason: decision.reason.clone(),
            risk_approved: risk_result.approved,
            risk_reason: risk_result.reason,
            executed: execution.as_ref().is_some_and(|e| e.executed),
            order_id: execution.as_ref().and_then(|e| e.order_id.clone()),
            filled_size: execution.as_ref().and_then(|e| e.filled_size),
            fill_price: execution.as_ref().and_then(|e| e.fill_price),
            mode: self.executor.mode().to_string(),
        };
        self.append_record(record).await;
    }

    async fn execute_decision(
        &mut self,
        decision: &Decision,
        snapshot: &Snapshot,
        equity: Decimal,
        now: DateTime<Utc>,
    ) -> Option<ExecutionResult> {
        match decision.action {
            Action::Long => self.execute_entry(decision, snapshot, equity, Side::Long, now).await,
            Action::Short => self.execute_entry(decision, snapshot, equity, Side::Short, now).await,
            Action::Close => self.execute_close(decision.position_type, snapshot, now).await,
            Action::Hold => None,
        }
    }

    async fn execute_entry(
        &mut self,
        decision: &Decision,
        snapshot: &Snapshot,
        equity: Decimal,
        side: Side,
        now: DateTime<Utc>,
    ) -> Option<ExecutionResult> {
        let limits = self.risk.settings();
        let Some(outcome) = sizing::size_position(
            decision.position_type,
            decision.confidence,
            equity,
            snapshot.price,
            limits.max_equity_usage,
            limits.max_leverage,
        ) else {
            return Some(ExecutionResult::not_executed("position size computed to zero"));
        };

        if let Err(err) = self.positions.begin_open(decision.position_type) {
            return Some(ExecutionResult::not_executed(err.to_string()));
        }

        let order = OrderRequest {
            symbol: self.symbol.clone(),
            side,
            intent: OrderIntent::Open,
            quantity: outcome.quantity,
            reference_price: snapshot.price,
        };
        match self.executor.execute(&order).await {
            Ok(result) => {
                let fill_price = result.fill_price.unwrap_or(snapshot.price);
                let filled_size = result.filled_size.unwrap_or(outcome.quantity);
                let position = self.positions.build_position(
                    decision,
                    side,
                    fill_price,
                    filled_size,
                    outcome.leverage,
                    outcome.trailing_pct,
                    now,
                );
                if let Err(err) = self.positions.commit_open(position) {
                    error!(symbol = %self.symbol, %err, "Open slot vanished mid-fill");
                    self.positions.revert(decision.position_type);
                }
                Some(result)
            }
            Err(err) => {
                warn!(symbol = %self.symbol, %err, "Entry execution failed, reverting slot");
                self.positions.revert(decision.position_type);
                Some(ExecutionResult::not_executed(err.to_string()))
            }
        }
    }

    async fn execute_close(
        &mut self,
        position_type: PositionType,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Option<ExecutionResult> {
        let position = match self.positions.begin_close(position_type) {
            Ok(p) => p,
            Err(err) => return Some(ExecutionResult::not_executed(err.to_string())),
        };

        let order = OrderRequest {
            symbol: self.symbol.clone(),
            side: position.side,
            intent: OrderIntent::Close,
            quantity: position.quantity,
            reference_price: snapshot.price,
        };
        match self.executor.execute(&order).await {
            Ok(result) => {
                let exit_price = result.fill_price.unwrap_or(snapshot.price);
                match self.positions.commit_close(position_type, exit_price, now) {
                    Ok(trade) => {
                        let mut account = self.account.lock().await;
                        account.apply_trade(&trade);
                        info!(
                            symbol = %self.symbol,
                            position_type = %position_type,
                            realized_pnl = %trade.realized_pnl,
                            equity = %account.equity,
                            "Trade completed"
                        );
                    }
                    Err(err) => {
                        error!(symbol = %self.symbol, %err, "Close slot vanished mid-fill");
                    }
                }
                Some(result)
            }
            Err(err) => {
                warn!(symbol = %self.symbol, %err, "Close execution failed, restoring position");
                self.positions.revert(position_type);
                Some(ExecutionResult::not_executed(err.to_string()))
            }
        }
    }

    fn data_unavailable_record(&self, position_before: f64, now: DateTime<Utc>) -> CycleRecord {
        CycleRecord {
            timestamp: now.timestamp(),
            symbol: self.symbol.0.clone(),
            market_price: Decimal::ZERO,
            position_before,
            raw_oracle_output: String::new(),
            parsed_action: Action::Hold.as_str().to_string(),
            parsed_size_pct: 0.0,
            parsed_reason: "data unavailable".to_string(),
            risk_approved: true,
            risk_reason: String::new(),
            executed: false,
            order_id: None,
            filled_size: None,
            fill_price: None,
            mode: self.executor.mode().to_string(),
        }
    }

    /// The sink is fire-and-forget from the pipeline's point of view; its
    /// failure is logged and the cycle goes on.
    async fn append_record(&self, record: CycleRecord) {
        if let Err(err) = self.audit.append(&record).await {
            error!(symbol = %self.symbol, %err, "Audit sink failed");
        }
    }
}

fn forced_hold_raw(cause: &str) -> String {
    json!({
        "action": "hold",
        "size_pct": 0.0,
        "confidence": 0.0,
        "reason": format!("forced hold: {cause}"),
    })
    .to_string()
}
