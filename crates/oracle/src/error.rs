// In crates/oracle/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle returned an empty response")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
