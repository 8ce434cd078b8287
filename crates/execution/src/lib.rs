// In crates/execution/src/lib.rs

//! The execution gateway boundary. The agent core only ever talks to the
//! [`Executor`] trait; the concrete gateway decides whether orders hit a real
//! venue or a simulated fill model.

pub mod error;
pub mod paper;
pub mod types;

use async_trait::async_trait;
use core_types::{ExecutionResult, Symbol};
use rust_decimal::Decimal;

pub use error::{Error, Result};
pub use paper::PaperExecutor;
pub use types::{ExecutionSettings, OrderIntent, OrderRequest};

#[async_trait]
pub trait Executor: Send + Sync {
    /// Submit one order. A rejected order is an `Err`; the caller records it
    /// and leaves its position state untouched.
    async fn execute(&self, order: &OrderRequest) -> Result<ExecutionResult>;

    /// Signed net quantity the venue believes we hold, for reconciliation.
    async fn query_position(&self, symbol: &Symbol) -> Result<Decimal>;

    /// Tag written into every audit record, e.g. "paper".
    fn mode(&self) -> &'static str;
}
