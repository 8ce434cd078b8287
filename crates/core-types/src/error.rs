// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown action literal: {0}")]
    UnknownAction(String),

    #[error("unknown position type literal: {0}")]
    UnknownPositionType(String),
}

pub type Result<T> = std::result::Result<T, Error>;
