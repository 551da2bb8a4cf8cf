//! Error types for cbind

use thiserror::Error;

/// cbind error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for cbind
pub type Result<T> = std::result::Result<T, Error>;
