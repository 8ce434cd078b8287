// In crates/engine/src/lib.rs

//! The cycle controller: runs every symbol's pipeline on a fixed wall-clock
//! interval, never overlapping cycles, and drains cleanly on shutdown.

pub mod processor;

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use core_types::CompletedTrade;
use futures::future;
use risk::AccountRiskState;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub use processor::SymbolProcessor;

/// Account-wide mutable state shared by every symbol processor. Lives behind
/// a single `tokio::sync::Mutex` so the daily-loss baseline and the paper
/// equity see one writer at a time.
#[derive(Debug)]
pub struct AccountState {
    /// Current equity in the quote currency. In paper mode this is the
    /// starting equity plus realized P&L.
    pub equity: Decimal,
    /// Daily loss-cap baseline.
    pub risk: AccountRiskState,
}

impl AccountState {
    pub fn new(now: DateTime<Utc>, starting_equity: Decimal) -> Self {
        Self {
            equity: starting_equity,
            risk: AccountRiskState::new(now, starting_equity),
        }
    }

    pub fn apply_trade(&mut self, trade: &CompletedTrade) {
        self.equity += trade.realized_pnl;
    }
}

/// Fans one cycle out across all symbols, waits for every worker to finish,
/// then sleeps until the next interval tick. Cycles never overlap: a slow
/// cycle delays the next tick instead of stacking on top of it.
pub struct Engine {
    processors: Vec<SymbolProcessor>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(
        processors: Vec<SymbolProcessor>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processors,
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown signal flips. The in-flight cycle always
    /// finishes: an order half-way to the gateway is never cancelled, and no
    /// positions are auto-closed on the way out.
    pub async fn run(mut self) -> Result<()> {
        info!(
            symbols = self.processors.len(),
            interval_secs = self.interval.as_secs(),
            "Starting cycle controller"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            self.run_cycle().await;

            if *self.shutdown.borrow_and_update() {
                break;
            }
        }

        info!("Cycle controller stopped");
        Ok(())
    }

    /// One cycle: every processor moves into its own task, runs, and is handed
    /// back. Worker failures are independent by construction; the only way a
    /// worker is lost is a panic, which is logged and drops that symbol from
    /// rotation rather than poisoning the controller.
    async fn run_cycle(&mut self) {
        let started = std::time::Instant::now();

        let mut handles = Vec::with_capacity(self.processors.len());
        for mut processor in self.processors.drain(..) {
            handles.push(tokio::spawn(async move {
                processor.run_cycle().await;
                processor
            }));
        }

        for joined in future::join_all(handles).await {
            match joined {
                Ok(processor) => self.processors.push(processor),
                Err(err) => {
                    error!(%err, "Symbol task panicked and was dropped from rotation");
                }
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= self.interval {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "Cycle overran its interval; next cycle starts immediately"
            );
        } else {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "Cycle complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use core_types::{CycleRecord, Snapshot, Symbol};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tokio::sync::Mutex;

    use audit::AuditSink;
    use execution::{ExecutionSettings, Executor, PaperExecutor};
    use market_data::MarketDataProvider;
    use oracle::DecisionOracle;
    use risk::{RiskManager, RiskSettings};

    // --- Test collaborators ---

    struct ScriptedOracle {
        responses: StdMutex<VecDeque<String>>,
    }

    impl ScriptedOracle {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl DecisionOracle for ScriptedOracle {
        async fn produce_decision(
            &self,
            _snapshot: &Snapshot,
            _signed_exposure: f64,
            _equity: Decimal,
        ) -> oracle::Result<String> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!({"action": "hold", "size_pct": 0.0}).to_string()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl DecisionOracle for SlowOracle {
        async fn produce_decision(
            &self,
            _snapshot: &Snapshot,
            _signed_exposure: f64,
            _equity: Decimal,
        ) -> oracle::Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({"action": "hold", "size_pct": 0.0}).to_string())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct FixedMarketData {
        price: StdMutex<Decimal>,
    }

    impl FixedMarketData {
        fn new(price: Decimal) -> Self {
            Self {
                price: StdMutex::new(price),
            }
        }

        fn set_price(&self, price: Decimal) {
            *self.price.lock().unwrap() = price;
        }
    }

    #[async_trait]
    impl MarketDataProvider for FixedMarketData {
        async fn fetch_snapshot(&self, symbol: &Symbol) -> market_data::Result<Snapshot> {
            let price = *self.price.lock().unwrap();
            Ok(Snapshot {
                symbol: symbol.clone(),
                timestamp_ms: 0,
                price,
                bid: price,
                ask: price,
                indicators: Default::default(),
            })
        }
    }

    struct FailingMarketData;

    #[async_trait]
    impl MarketDataProvider for FailingMarketData {
        async fn fetch_snapshot(&self, _symbol: &Symbol) -> market_data::Result<Snapshot> {
            Err(market_data::Error::MalformedResponse("feed down".to_string()))
        }
    }

    struct RejectingExecutor;

    #[async_trait]
    impl execution::Executor for RejectingExecutor {
        async fn execute(
            &self,
            _order: &execution::OrderRequest,
        ) -> execution::Result<core_types::ExecutionResult> {
            Err(execution::Error::OrderRejected("venue offline".to_string()))
        }

        async fn query_position(&self, _symbol: &Symbol) -> execution::Result<Decimal> {
            Ok(Decimal::ZERO)
        }

        fn mode(&self) -> &'static str {
            "paper"
        }
    }

    struct RecordingSink {
        records: StdMutex<Vec<CycleRecord>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                records: StdMutex::new(Vec::new()),
            }
        }

        fn records(&self) -> Vec<CycleRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn append(&self, record: &CycleRecord) -> audit::Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    // --- Wiring helpers ---

    fn risk_settings() -> RiskSettings {
        RiskSettings {
            max_equity_usage: 1.0,
            max_leverage: 3.0,
            daily_loss_cap_pct: None,
            cooldown_secs: None,
        }
    }

    fn paper_executor() -> Arc<PaperExecutor> {
        Arc::new(
            PaperExecutor::new(ExecutionSettings {
                slippage_pct: 0.0,
                fee_pct: 0.0,
            })
            .unwrap(),
        )
    }

    fn long_entry_raw() -> String {
        entry_raw("swing")
    }

    fn entry_raw(position_type: &str) -> String {
        json!({
            "action": "long",
            "size_pct": 0.2,
            "confidence": 0.85,
            "reason": "breakout",
            "position_type": position_type,
        })
        .to_string()
    }

    struct Harness {
        processor: SymbolProcessor,
        sink: Arc<RecordingSink>,
        account: Arc<Mutex<AccountState>>,
    }

    fn harness(
        oracle: Arc<dyn DecisionOracle>,
        market_data: Arc<dyn MarketDataProvider>,
        executor: Arc<dyn execution::Executor>,
        settings: RiskSettings,
    ) -> Harness {
        let sink = Arc::new(RecordingSink::new());
        let account = Arc::new(Mutex::new(AccountState::new(Utc::now(), dec!(10_000))));
        let processor = SymbolProcessor::new(
            Symbol("BTCUSDT".to_string()),
            oracle,
            Duration::from_millis(100),
            Arc::new(RiskManager::new(settings).unwrap()),
            executor,
            market_data,
            sink.clone(),
            account.clone(),
        );
        Harness {
            processor,
            sink,
            account,
        }
    }

    // --- Pipeline tests ---

    #[tokio::test]
    async fn approved_entry_executes_and_is_recorded() {
        let executor = paper_executor();
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![long_entry_raw()])),
            Arc::new(FixedMarketData::new(dec!(100))),
            executor.clone(),
            risk_settings(),
        );

        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.parsed_action, "long");
        assert!(r.risk_approved);
        assert!(r.executed);
        assert!(r.order_id.is_some());
        // 10k equity, 25% bucket, 2x leverage => 5000 notional => 50 units.
        assert_eq!(r.filled_size, Some(dec!(50)));

        let booked = executor
            .query_position(&Symbol("BTCUSDT".to_string()))
            .await
            .unwrap();
        assert_eq!(booked, dec!(50));
    }

    #[tokio::test]
    async fn denied_entry_keeps_parsed_decision_verbatim() {
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![json!({
                "action": "long",
                "size_pct": 0.5,
                "confidence": 0.7,
                "reason": "big bet",
            })
            .to_string()])),
            Arc::new(FixedMarketData::new(dec!(100))),
            paper_executor(),
            RiskSettings {
                max_equity_usage: 0.1,
                ..risk_settings()
            },
        );

        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        // The audit trail shows what the oracle asked for, not the rewrite.
        assert_eq!(r.parsed_action, "long");
        assert_eq!(r.parsed_size_pct, 0.5);
        assert!(!r.risk_approved);
        assert_eq!(r.risk_reason, "exceeds max position size");
        assert!(!r.executed);
    }

    #[tokio::test]
    async fn oracle_timeout_degrades_to_forced_hold() {
        let mut h = harness(
            Arc::new(SlowOracle),
            Arc::new(FixedMarketData::new(dec!(100))),
            paper_executor(),
            risk_settings(),
        );

        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.parsed_action, "hold");
        assert!(r.raw_oracle_output.contains("forced hold: oracle timeout"));
        assert!(r.risk_approved);
        assert!(!r.executed);
    }

    #[tokio::test]
    async fn missing_market_data_is_a_recorded_no_op() {
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![long_entry_raw()])),
            Arc::new(FailingMarketData),
            paper_executor(),
            risk_settings(),
        );

        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parsed_reason, "data unavailable");
        assert!(!records[0].executed);
        assert_eq!(records[0].raw_oracle_output, "");
    }

    #[tokio::test]
    async fn failed_execution_leaves_the_slot_flat() {
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![
                long_entry_raw(),
                json!({"action": "close", "position_type": "swing"}).to_string(),
            ])),
            Arc::new(FixedMarketData::new(dec!(100))),
            Arc::new(RejectingExecutor),
            risk_settings(),
        );

        h.processor.run_cycle().await;
        let records = h.sink.records();
        assert!(records[0].risk_approved);
        assert!(!records[0].executed);

        // If the failed entry had leaked state, this close would be approved.
        h.processor.run_cycle().await;
        let records = h.sink.records();
        assert_eq!(records[1].risk_reason, "no position to close");
    }

    #[tokio::test]
    async fn stop_breach_closes_the_position_and_realizes_pnl() {
        let market = Arc::new(FixedMarketData::new(dec!(100)));
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![long_entry_raw()])),
            market.clone(),
            paper_executor(),
            risk_settings(),
        );

        // Cycle 1: open the long at 100 with a 10% trailing stop.
        h.processor.run_cycle().await;
        assert!(h.sink.records()[0].executed);

        // Cycle 2: price crashes through the stop at 90; the synthetic close
        // preempts the oracle (which has no script left anyway).
        market.set_price(dec!(85));
        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 2);
        let r = &records[1];
        assert_eq!(r.parsed_action, "close");
        assert!(r.raw_oracle_output.contains("stop loss breached"));
        assert!(r.executed);

        // 50 units long from 100 to 85 => -750 realized.
        let equity = h.account.lock().await.equity;
        assert_eq!(equity, dec!(9_250));
    }

    #[tokio::test]
    async fn simultaneous_breaches_record_one_close_per_slot() {
        let market = Arc::new(FixedMarketData::new(dec!(100)));
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![
                entry_raw("swing"),
                entry_raw("scalp"),
            ])),
            market.clone(),
            paper_executor(),
            risk_settings(),
        );

        // Cycles 1 and 2: one long per slot, both stops at 90.
        h.processor.run_cycle().await;
        h.processor.run_cycle().await;
        assert!(h.sink.records().iter().all(|r| r.executed));

        // The crash breaches both stops in the same tick; each slot's
        // synthetic close lands in its own record.
        market.set_price(dec!(85));
        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert_eq!(records.len(), 4);
        assert!(
            records[2..]
                .iter()
                .all(|r| r.parsed_action == "close" && r.executed)
        );

        // 50 swing units and 30 scalp units long from 100 to 85.
        let equity = h.account.lock().await.equity;
        assert_eq!(equity, dec!(8_800));
    }

    #[tokio::test]
    async fn cooldown_denial_reaches_the_audit_trail() {
        let mut h = harness(
            Arc::new(ScriptedOracle::new(vec![long_entry_raw(), long_entry_raw()])),
            Arc::new(FixedMarketData::new(dec!(100))),
            paper_executor(),
            RiskSettings {
                cooldown_secs: Some(3600),
                ..risk_settings()
            },
        );

        h.processor.run_cycle().await;
        h.processor.run_cycle().await;

        let records = h.sink.records();
        assert!(records[0].executed);
        // The second entry lands inside the cooldown window. Its slot is also
        // still occupied, but the rule chain speaks first.
        assert_eq!(records[1].risk_reason, "cooldown active");
        assert!(!records[1].executed);
    }

    // --- Controller tests ---

    #[tokio::test]
    async fn engine_runs_cycles_until_shutdown_and_finishes_in_flight_work() {
        let executor = paper_executor();
        let h = harness(
            Arc::new(ScriptedOracle::new(vec![])),
            Arc::new(FixedMarketData::new(dec!(100))),
            executor,
            risk_settings(),
        );
        let sink = h.sink.clone();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(
            vec![h.processor],
            Duration::from_millis(10),
            shutdown_rx,
        );
        let handle = tokio::spawn(engine.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let count = sink.records().len();
        assert!(count >= 2, "expected several cycles, got {count}");

        // No new cycles after shutdown resolved.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.records().len(), count);
    }
}
