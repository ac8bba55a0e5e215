//! Error types for acquisition reads.
//!
//! The read contract distinguishes three classes of failure:
//!
//! - **File-not-found**: the acquisition file for the shot does not exist. Callers treat this
//!   as "no data for this shot" rather than a hard failure (see [`ReaderError::is_not_found`]).
//! - **Channel-not-found**: a channel was requested that the file does not contain. In a
//!   multi-channel read this is reported per channel and skipped; in a single-channel read it
//!   is returned to the caller.
//! - **Invalid input**: a channel identifier that is not a channel number. This is a
//!   programming error and is rejected before any I/O takes place
//!   (see [`ReaderError::is_invalid_input`]).
//!
//! Everything else (unreadable files, malformed samples in a required column) concerns the
//! data of one shot only.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that can occur while reading an acquisition file.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The acquisition file for the shot does not exist.
    #[error("Acquisition file not found: {}", path.display())]
    AcquisitionFileNotFound { path: PathBuf },

    /// The requested channel is not present in the acquisition file.
    #[error("Channel ch{channel} not found in shot {shot}")]
    ChannelNotFound { shot: u32, channel: u32 },

    /// A named column is missing from a machine-data file.
    #[error("Column '{column}' not found in {}", path.display())]
    ColumnNotFound { path: PathBuf, column: String },

    /// A channel identifier that cannot name an acquisition channel.
    #[error("Invalid channel identifier '{0}': expected a channel number")]
    InvalidChannel(String),

    /// A sample value that could not be parsed as a number.
    #[error("Malformed sample '{value}' in column {column} at line {line}")]
    Malformed {
        line: u64,
        column: String,
        value: String,
    },

    /// Error reported by the CSV decoder.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Whether this error belongs to the file-not-found class.
    pub fn is_not_found(&self) -> bool {
        match self {
            ReaderError::AcquisitionFileNotFound { .. } => true,
            ReaderError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Whether this error was caused by the caller's channel selection.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ReaderError::InvalidChannel(_))
    }
}
