//! Reader for the CSV export of the CRIO machine-data files.
//!
//! The CRIO controller logs the machine state of a shot next to the probe data, in
//! `<dir>/CRIO<shot>.csv`. Columns are named rather than numbered:
//!
//! | Column     | Quantity                | Stored as        |
//! |------------|-------------------------|------------------|
//! | `Time`     | time                    | milliseconds     |
//! | `Light`    | light sensor            | arbitrary units  |
//! | `I_TF`     | toroidal coil current   | amperes          |
//! | `Pressure` | vessel pressure         | millibar         |
//! | `LFSset`   | low-field-side power    | controller units |
//! | `HFSset`   | high-field-side power   | controller units |
//!
//! Only rows between time zero and the last logged time are kept.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ReaderError, Result};

/// File name prefix of the CRIO machine-data files.
pub const DEFAULT_MACHINE_PREFIX: &str = "CRIO";

const TIME: &str = "Time";
const LIGHT: &str = "Light";
const COIL_CURRENT: &str = "I_TF";
const PRESSURE: &str = "Pressure";
const LFS_POWER: &str = "LFSset";
const HFS_POWER: &str = "HFSset";

/// Unit conversions of the CRIO logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineScaling {
    /// Seconds per logged time unit
    #[serde(default = "default_time_scale")]
    pub time_scale_s: f64,
    /// Pascal per logged pressure unit
    #[serde(default = "default_pressure_scale")]
    pub pressure_scale_pa: f64,
    /// Watt per heating-power set-point unit
    #[serde(default = "default_power_scale")]
    pub power_scale_w: f64,
}

fn default_time_scale() -> f64 {
    1e-3
}

fn default_pressure_scale() -> f64 {
    1e2
}

fn default_power_scale() -> f64 {
    450.0 / 3000.0
}

impl Default for MachineScaling {
    fn default() -> Self {
        Self {
            time_scale_s: default_time_scale(),
            pressure_scale_pa: default_pressure_scale(),
            power_scale_w: default_power_scale(),
        }
    }
}

/// Machine sensor series of one shot, in SI units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineData {
    /// Time in seconds
    pub time: Vec<f64>,
    /// Light sensor signal, uncalibrated
    pub light: Vec<f64>,
    /// Toroidal coil current in amperes
    pub coil_current: Vec<f64>,
    /// Vessel pressure in pascal
    pub pressure: Vec<f64>,
    /// Low-field-side heating power in watts
    pub lfs_power: Vec<f64>,
    /// High-field-side heating power in watts
    pub hfs_power: Vec<f64>,
}

impl MachineData {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the shot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Reader for `CRIO<shot>.csv` files.
#[derive(Debug, Clone)]
pub struct CsvMachineReader {
    prefix: String,
    scaling: MachineScaling,
}

impl Default for CsvMachineReader {
    fn default() -> Self {
        Self::new(MachineScaling::default())
    }
}

impl CsvMachineReader {
    /// Create a reader for `CRIO<shot>.csv` files using `scaling`.
    pub fn new(scaling: MachineScaling) -> Self {
        Self {
            prefix: DEFAULT_MACHINE_PREFIX.to_string(),
            scaling,
        }
    }

    /// Use a different file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Location of the machine-data file for `shot` under `dir`.
    pub fn file_path(&self, dir: &Path, shot: u32) -> PathBuf {
        dir.join(format!("{}{}.csv", self.prefix, shot))
    }

    /// Read and convert the machine data of `shot`.
    pub fn read(&self, dir: &Path, shot: u32) -> Result<MachineData> {
        let path = self.file_path(dir, shot);
        let file = File::open(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ReaderError::AcquisitionFileNotFound { path: path.clone() }
            } else {
                ReaderError::Io(err)
            }
        })?;

        let mut columns = read_named_columns(file, &path)?;
        let mut take = |name: &str, scale: f64| -> Vec<f64> {
            columns
                .remove(name)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v * scale)
                .collect()
        };

        let scaling = &self.scaling;
        let raw_time = take(TIME, 1.0);
        let light = take(LIGHT, 1.0);
        let coil_current = take(COIL_CURRENT, 1.0);
        let pressure = take(PRESSURE, scaling.pressure_scale_pa);
        let lfs_power = take(LFS_POWER, scaling.power_scale_w);
        let hfs_power = take(HFS_POWER, scaling.power_scale_w);

        let end = raw_time.last().copied().unwrap_or(0.0);
        let keep: Vec<usize> = raw_time
            .iter()
            .enumerate()
            .filter(|&(_, &t)| (0.0..=end).contains(&t))
            .map(|(row, _)| row)
            .collect();
        let select = |series: &[f64]| keep.iter().map(|&row| series[row]).collect::<Vec<_>>();

        let data = MachineData {
            time: keep
                .iter()
                .map(|&row| raw_time[row] * scaling.time_scale_s)
                .collect(),
            light: select(&light),
            coil_current: select(&coil_current),
            pressure: select(&pressure),
            lfs_power: select(&lfs_power),
            hfs_power: select(&hfs_power),
        };

        debug!(
            shot,
            samples = data.len(),
            dropped = raw_time.len() - data.len(),
            path = %path.display(),
            "Read machine data"
        );
        Ok(data)
    }
}

/// Parse every required column of `source`, keyed by header name.
fn read_named_columns<R: Read>(source: R, path: &Path) -> Result<HashMap<String, Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let mut index = Vec::new();
    for name in [TIME, LIGHT, COIL_CURRENT, PRESSURE, LFS_POWER, HFS_POWER] {
        let column = headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| ReaderError::ColumnNotFound {
                path: path.to_path_buf(),
                column: name.to_string(),
            })?;
        index.push((column, name));
    }

    let mut columns: HashMap<String, Vec<f64>> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| pos.line());
        for &(column, name) in &index {
            let field = record.get(column).unwrap_or("");
            let value = field.parse::<f64>().map_err(|_| ReaderError::Malformed {
                line,
                column: name.to_string(),
                value: field.to_string(),
            })?;
            columns.entry(name.to_string()).or_default().push(value);
        }
    }

    Ok(columns)
}
