// In crates/position/src/error.rs

use core_types::{PositionType, Symbol};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{position_type} slot for {symbol} already holds a position")]
    SlotOccupied {
        symbol: Symbol,
        position_type: PositionType,
    },

    #[error("no open {position_type} position for {symbol}")]
    NoPosition {
        symbol: Symbol,
        position_type: PositionType,
    },

    #[error("{position_type} slot for {symbol} has no transition in flight")]
    NoPendingTransition {
        symbol: Symbol,
        position_type: PositionType,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
