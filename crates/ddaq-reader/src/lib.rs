//! # ddaq-reader
//!
//! Reads probe channels from the NORTH ddaq acquisition files and converts them into
//! physical units.
//!
//! The crate defines the read contract used by the diagnostics layer:
//!
//! - [`RawDataReader`]: given a data directory, a shot and a [`ChannelSelection`], return a
//!   calibrated [`Acquisition`] (time axis, bias voltage and per-channel currents).
//! - [`Calibration`]: the fixed conversion constants of the acquisition chain.
//! - [`CsvDdaqReader`]: a reader for the text export of the acquisition files
//!   (`<dir>/ddaq<shot>.csv`, one `chN` column of raw counts per channel).
//! - [`CsvMachineReader`]: the machine sensors logged by the CRIO controller
//!   (`<dir>/CRIO<shot>.csv`), converted with [`MachineScaling`].
//!
//! A missing acquisition file is reported as [`ReaderError::AcquisitionFileNotFound`] so
//! that callers can downgrade it to "no data"; channels missing from a multi-channel read
//! are logged and skipped.

pub mod calibration;
pub mod csv_reader;
pub mod error;
pub mod machine;

pub use calibration::Calibration;
pub use csv_reader::CsvDdaqReader;
pub use error::{ReaderError, Result};
pub use machine::{CsvMachineReader, MachineData, MachineScaling};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Identifier of an acquisition channel as found in mapping tables.
///
/// Mapping files store channels either as numbers or as numeric strings; both forms name
/// the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Number(u32),
    Text(String),
}

impl ChannelId {
    /// Channel number, or [`ReaderError::InvalidChannel`] if the identifier does not name one.
    pub fn number(&self) -> Result<u32> {
        match self {
            ChannelId::Number(n) => Ok(*n),
            ChannelId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ReaderError::InvalidChannel(text.clone())),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Number(n) => write!(f, "{n}"),
            ChannelId::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<u32> for ChannelId {
    fn from(value: u32) -> Self {
        ChannelId::Number(value)
    }
}

/// Channels requested from a single read.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSelection {
    /// One channel; a missing channel fails the read.
    Single(ChannelId),
    /// Several channels; missing channels are skipped.
    Many(Vec<u32>),
}

impl ChannelSelection {
    /// Resolve the selection into channel numbers, rejecting invalid identifiers.
    pub fn channel_numbers(&self) -> Result<Vec<u32>> {
        match self {
            ChannelSelection::Single(id) => Ok(vec![id.number()?]),
            ChannelSelection::Many(channels) => Ok(channels.clone()),
        }
    }
}

/// Calibrated samples returned by a read.
///
/// `time` and `bias_voltage` are shared by every probe of a shot; `currents` holds one
/// array per channel that was found.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Time axis in seconds
    pub time: Arc<[f64]>,
    /// Bias voltage in volts, absent if the bias channel was not recorded
    pub bias_voltage: Option<Arc<[f64]>>,
    /// Probe currents in amperes, keyed by channel number
    pub currents: BTreeMap<u32, Arc<[f64]>>,
}

impl Acquisition {
    /// Current array of one channel.
    pub fn current(&self, channel: u32) -> Option<&Arc<[f64]>> {
        self.currents.get(&channel)
    }
}

/// Source of calibrated probe channels.
///
/// Implementations must apply the calibration themselves and report a missing acquisition
/// file with a file-not-found-class error (see [`ReaderError::is_not_found`]).
pub trait RawDataReader: Send + Sync {
    /// Read the selected channels of `shot` from the acquisition data under `path`.
    fn read(&self, path: &Path, shot: u32, selection: &ChannelSelection) -> Result<Acquisition>;
}
