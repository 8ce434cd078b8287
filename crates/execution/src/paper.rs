// In crates/execution/src/paper.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use core_types::{ExecutionResult, Symbol};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::types::{ExecutionSettings, OrderRequest};
use crate::{Error, Executor, Result};

/// Fills every order instantly against the reference price, with slippage and
/// the taker fee folded into the fill price. Keeps a book of net quantities so
/// reconciliation has something real to query.
pub struct PaperExecutor {
    settings: ExecutionSettings,
    order_seq: AtomicU64,
    book: Mutex<HashMap<Symbol, Decimal>>,
}

impl PaperExecutor {
    pub fn new(settings: ExecutionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            order_seq: AtomicU64::new(1),
            book: Mutex::new(HashMap::new()),
        })
    }

    /// Reference price moved against the order by slippage plus fee: buys fill
    /// higher, sells fill lower.
    fn fill_price(&self, order: &OrderRequest) -> Option<Decimal> {
        let drag = Decimal::from_f64(self.settings.slippage_pct + self.settings.fee_pct)?;
        Some(if order.is_buy() {
            order.reference_price * (Decimal::ONE + drag)
        } else {
            order.reference_price * (Decimal::ONE - drag)
        })
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    async fn execute(&self, order: &OrderRequest) -> Result<ExecutionResult> {
        if order.quantity <= Decimal::ZERO {
            return Err(Error::OrderRejected(format!(
                "non-positive quantity {}",
                order.quantity
            )));
        }
        if order.reference_price <= Decimal::ZERO {
            return Err(Error::OrderRejected(format!(
                "non-positive reference price {}",
                order.reference_price
            )));
        }

        let fill_price = self
            .fill_price(order)
            .ok_or_else(|| Error::OrderRejected("unrepresentable fill model".to_string()))?;

        let signed = if order.is_buy() {
            order.quantity
        } else {
            -order.quantity
        };
        {
            let mut book = self.book.lock().await;
            *book.entry(order.symbol.clone()).or_default() += signed;
        }

        let order_id = format!("paper-{}", self.order_seq.fetch_add(1, Ordering::Relaxed));
        info!(
            symbol = %order.symbol,
            %order_id,
            side = ?order.side,
            intent = ?order.intent,
            quantity = %order.quantity,
            fill_price = %fill_price,
            "Paper fill"
        );

        Ok(ExecutionResult {
            executed: true,
            order_id: Some(order_id),
            filled_size: Some(order.quantity),
            fill_price: Some(fill_price),
            error: None,
        })
    }

    async fn query_position(&self, symbol: &Symbol) -> Result<Decimal> {
        let book = self.book.lock().await;
        Ok(book.get(symbol).copied().unwrap_or(Decimal::ZERO))
    }

    fn mode(&self) -> &'static str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderIntent;
    use core_types::Side;
    use rust_decimal_macros::dec;

    fn executor() -> PaperExecutor {
        PaperExecutor::new(ExecutionSettings {
            slippage_pct: 0.001,
            fee_pct: 0.0005,
        })
        .unwrap()
    }

    fn order(side: Side, intent: OrderIntent, quantity: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: Symbol("BTCUSDT".to_string()),
            side,
            intent,
            quantity,
            reference_price: dec!(10_000),
        }
    }

    #[tokio::test]
    async fn buys_fill_above_reference_and_sells_below() {
        let exec = executor();
        let buy = exec
            .execute(&order(Side::Long, OrderIntent::Open, dec!(1)))
            .await
            .unwrap();
        assert_eq!(buy.fill_price, Some(dec!(10_015.0))); // +0.15%

        let sell = exec
            .execute(&order(Side::Long, OrderIntent::Close, dec!(1)))
            .await
            .unwrap();
        assert_eq!(sell.fill_price, Some(dec!(9_985.0)));
    }

    #[tokio::test]
    async fn book_tracks_net_quantity() {
        let exec = executor();
        let symbol = Symbol("BTCUSDT".to_string());
        exec.execute(&order(Side::Long, OrderIntent::Open, dec!(2)))
            .await
            .unwrap();
        assert_eq!(exec.query_position(&symbol).await.unwrap(), dec!(2));

        exec.execute(&order(Side::Long, OrderIntent::Close, dec!(2)))
            .await
            .unwrap();
        assert_eq!(exec.query_position(&symbol).await.unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn rejects_degenerate_orders() {
        let exec = executor();
        assert!(
            exec.execute(&order(Side::Long, OrderIntent::Open, dec!(0)))
                .await
                .is_err()
        );
        let mut bad_price = order(Side::Short, OrderIntent::Open, dec!(1));
        bad_price.reference_price = dec!(0);
        assert!(exec.execute(&bad_price).await.is_err());
    }

    #[tokio::test]
    async fn order_ids_are_unique_and_sequential() {
        let exec = executor();
        let a = exec
            .execute(&order(Side::Long, OrderIntent::Open, dec!(1)))
            .await
            .unwrap();
        let b = exec
            .execute(&order(Side::Short, OrderIntent::Open, dec!(1)))
            .await
            .unwrap();
        assert_eq!(a.order_id.as_deref(), Some("paper-1"));
        assert_eq!(b.order_id.as_deref(), Some("paper-2"));
    }

    #[test]
    fn settings_outside_range_are_rejected() {
        assert!(
            PaperExecutor::new(ExecutionSettings {
                slippage_pct: 0.5,
                fee_pct: 0.0,
            })
            .is_err()
        );
    }
}
