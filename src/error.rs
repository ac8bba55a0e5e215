//! Custom error types for the diagnostics library.
//!
//! `DiagError` consolidates the failures that are allowed to reach a caller. Most faults
//! met while resolving probe data never become errors at all: an unconfigured probe is
//! simply inactive, a missing acquisition file downgrades the shot to "no data", and a
//! missing channel leaves that probe's current absent. What remains here are the faults
//! an operator has to fix:
//!
//! - **`Config`**: the configuration file or environment could not be parsed.
//! - **`Configuration`**: the configuration parsed but holds invalid values.
//! - **`Table`**: a position or mapping table could not be read or decoded.
//! - **`Reader`**: an invalid channel identifier, rejected immediately, or a machine-data
//!   file that could not be decoded.
//! - **`Io`** / **`Json`**: plain I/O and serialization failures.

use ddaq_reader::ReaderError;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type DiagResult<T> = std::result::Result<T, DiagError>;

/// Errors surfaced by the diagnostics library.
#[derive(Error, Debug)]
pub enum DiagError {
    /// Configuration source could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Probe table could not be loaded
    #[error("Failed to load probe table '{}': {source}", path.display())]
    Table {
        /// Table file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: Box<DiagError>,
    },

    /// Acquisition read failed
    #[error("Acquisition read error: {0}")]
    Reader(#[from] ReaderError),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output table could not be written
    #[error("Output error: {0}")]
    Output(#[from] csv::Error),
}

impl From<figment::Error> for DiagError {
    fn from(value: figment::Error) -> Self {
        DiagError::Config(Box::new(value))
    }
}

impl DiagError {
    /// Attach the table path to an error raised while loading it.
    pub fn table(path: impl Into<PathBuf>, source: impl Into<DiagError>) -> Self {
        DiagError::Table {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }
}
