//! Error types for the loyalty-core library

use thiserror::Error;

/// Custom error type for loyalty-core operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown fact: {0}")]
    UnknownFact(String),

    #[error("calculation error: {0}")]
    Calculation(String),

    #[error("invalid rule file: {0}")]
    InvalidRuleFile(String),
}

/// Result type for loyalty-core operations
pub type Result<T> = std::result::Result<T, Error>;
