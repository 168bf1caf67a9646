use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two JSON decodes of the cache file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The file text itself.
    Outer,
    /// The JSON document stored as a string inside the `cache` property.
    Inner,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStage::Outer => write!(f, "outer"),
            ParseStage::Inner => write!(f, "inner"),
        }
    }
}

/// Every failure here is fatal to an export run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache file not found at: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read cache file {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {stage} cache payload: {source}")]
    ParseError {
        stage: ParseStage,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid cache format: {0}")]
    InvalidFormat(String),

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
