//! Reader for the CSV export of ddaq acquisition files.
//!
//! Each shot is stored as `<dir>/<prefix><shot>.csv`. The header row names the channels
//! (`ch0`, `ch1`, ...) and every following row holds one raw ADC count per channel.
//! Columns whose header is not of the `chN` form are ignored.
//!
//! In a multi-channel read a current or bias column holding a non-numeric sample is
//! reported and dropped, the same way a missing column is. The time column is always
//! required.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{Acquisition, Calibration, ChannelSelection, RawDataReader, ReaderError, Result};

/// File name prefix of the ddaq acquisition files.
pub const DEFAULT_FILE_PREFIX: &str = "ddaq";

/// Calibrated reader for `ddaq<shot>.csv` files.
#[derive(Debug, Clone)]
pub struct CsvDdaqReader {
    prefix: String,
    calibration: Calibration,
}

impl Default for CsvDdaqReader {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

impl CsvDdaqReader {
    /// Create a reader for `ddaq<shot>.csv` files using `calibration`.
    pub fn new(calibration: Calibration) -> Self {
        Self {
            prefix: DEFAULT_FILE_PREFIX.to_string(),
            calibration,
        }
    }

    /// Use a different file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Calibration applied to every read.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Location of the acquisition file for `shot` under `dir`.
    pub fn file_path(&self, dir: &Path, shot: u32) -> PathBuf {
        dir.join(format!("{}{}.csv", self.prefix, shot))
    }

    /// Decode the raw counts of the `wanted` channels that are present in `source`.
    ///
    /// A channel listed in `droppable` whose column holds a non-numeric sample is logged
    /// and left out of the result; for any other channel the sample is an error.
    fn read_columns<R: Read>(
        &self,
        source: R,
        shot: u32,
        wanted: &[u32],
        droppable: &[u32],
    ) -> Result<HashMap<u32, Vec<f64>>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);

        let mut index = Vec::new();
        for (column, header) in reader.headers()?.iter().enumerate() {
            let channel = header
                .strip_prefix("ch")
                .and_then(|digits| digits.parse::<u32>().ok());
            if let Some(channel) = channel.filter(|ch| wanted.contains(ch)) {
                index.push((column, channel));
            }
        }

        let mut columns: HashMap<u32, Vec<f64>> = index
            .iter()
            .map(|&(_, channel)| (channel, Vec::new()))
            .collect();
        let mut dropped = BTreeSet::new();

        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |pos| pos.line());
            for &(column, channel) in &index {
                if dropped.contains(&channel) {
                    continue;
                }
                let field = record.get(column).unwrap_or("");
                match field.parse::<f64>() {
                    Ok(value) => columns.entry(channel).or_default().push(value),
                    Err(_) => {
                        let err = ReaderError::Malformed {
                            line,
                            column: format!("ch{channel}"),
                            value: field.to_string(),
                        };
                        if !droppable.contains(&channel) {
                            return Err(err);
                        }
                        warn!(shot, channel, error = %err, "Dropping channel ch{channel} of shot {shot}");
                        columns.remove(&channel);
                        dropped.insert(channel);
                    }
                }
            }
        }

        Ok(columns)
    }
}

impl RawDataReader for CsvDdaqReader {
    fn read(&self, path: &Path, shot: u32, selection: &ChannelSelection) -> Result<Acquisition> {
        // Reject malformed channel identifiers before touching the file system.
        let requested = selection.channel_numbers()?;

        let file_path = self.file_path(path, shot);
        let file = File::open(&file_path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ReaderError::AcquisitionFileNotFound {
                    path: file_path.clone(),
                }
            } else {
                ReaderError::Io(err)
            }
        })?;

        let cal = &self.calibration;
        let mut wanted = requested.clone();
        wanted.extend([cal.time_channel, cal.bias_channel]);
        let mut droppable = vec![cal.bias_channel];
        if let ChannelSelection::Many(_) = selection {
            droppable.extend(requested.iter().copied());
        }
        droppable.retain(|&ch| ch != cal.time_channel);
        let columns = self.read_columns(file, shot, &wanted, &droppable)?;

        let samples = columns
            .get(&cal.time_channel)
            .map(Vec::len)
            .ok_or(ReaderError::ChannelNotFound {
                shot,
                channel: cal.time_channel,
            })?;
        let time: Arc<[f64]> = cal.time_axis(samples).into();

        let bias_voltage: Option<Arc<[f64]>> = match columns.get(&cal.bias_channel) {
            Some(raw) => Some(cal.bias_voltage(raw).into()),
            None => {
                warn!(shot, channel = cal.bias_channel, "Bias channel not found in acquisition file");
                None
            }
        };

        let mut currents = BTreeMap::new();
        for channel in requested {
            match columns.get(&channel) {
                Some(raw) => {
                    currents.insert(channel, Arc::from(cal.current(raw)));
                }
                None => match selection {
                    ChannelSelection::Single(_) => {
                        return Err(ReaderError::ChannelNotFound { shot, channel });
                    }
                    ChannelSelection::Many(_) => {
                        warn!(shot, channel, "Channel ch{channel} not found in shot {shot}, skipping");
                    }
                },
            }
        }

        debug!(
            shot,
            samples,
            channels = currents.len(),
            path = %file_path.display(),
            "Read acquisition file"
        );

        Ok(Acquisition {
            time,
            bias_voltage,
            currents,
        })
    }
}
