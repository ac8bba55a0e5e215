//! Machine sensor data of a shot.
//!
//! The CRIO logger records the machine state alongside the probe data: light, toroidal
//! coil current, vessel pressure and the two heating powers. These series are used to
//! check that a shot looks fine before its probe data is analysed.

use crate::config::AcquisitionConfig;
use crate::error::DiagResult;
use ddaq_reader::{CsvMachineReader, MachineData};
use std::io::Write;
use tracing::{info, warn};

/// Header line of the machine-data output table.
pub const MACHINE_HEADER: &str =
    "Time; Light sensor; Coil current; Pressure sensor; LFS power; HFS power in SI units";

/// Machine-data reader described by `config`.
pub fn machine_reader(config: &AcquisitionConfig) -> CsvMachineReader {
    CsvMachineReader::new(config.machine.clone()).with_prefix(config.machine_file_prefix.clone())
}

/// Machine data of `shot`, or `None` when the shot has no machine-data file.
pub fn load_machine_data(config: &AcquisitionConfig, shot: u32) -> DiagResult<Option<MachineData>> {
    info!(shot, "Loading machine data");
    match machine_reader(config).read(&config.data_dir, shot) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.is_not_found() => {
            warn!(shot, error = %err, "Machine data file not found for shot {shot}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Write `data` as `;`-separated text with a `#` header line.
pub fn write_machine_table<W: Write>(data: &MachineData, mut writer: W) -> DiagResult<()> {
    writeln!(writer, "# {MACHINE_HEADER}")?;

    let mut csv = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(writer);
    for row in 0..data.len() {
        let record = [
            data.time[row],
            data.light[row],
            data.coil_current[row],
            data.pressure[row],
            data.lfs_power[row],
            data.hfs_power[row],
        ]
        .map(|value| format!("{value:.18e}"));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}
