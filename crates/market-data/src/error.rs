// In crates/market-data/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("market data request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed market data response: {0}")]
    MalformedResponse(String),

    #[error("indicator setup failed: {0}")]
    Indicator(String),
}

pub type Result<T> = std::result::Result<T, Error>;
