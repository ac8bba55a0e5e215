//! Ion-saturation density estimates from probe currents.
//!
//! With the probes biased deep into ion saturation, the collected current is
//! `I = 0.61 · e · n · c_s · A`, where `c_s = sqrt(k_B·T_e / m_i)` is the Bohm speed.
//! Solving for `n` with an assumed electron temperature gives a density per sample.

use crate::config::PlasmaConfig;
use crate::diagnostic::Diagnostic;
use crate::error::DiagResult;
use crate::probe::Probe;
use std::io::Write;

/// Elementary charge in coulombs.
pub const ELEMENTARY_CHARGE: f64 = 1.602e-19;
/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.38e-23;
/// Atomic mass unit in kg, as used for the ion mass.
pub const ATOMIC_MASS: f64 = 1.67e-27;
/// Bohm sheath coefficient.
pub const BOHM_COEFFICIENT: f64 = 0.61;

/// Header line of the density output table.
pub const DENSITY_HEADER: &str = "Time; probes in the numerical order in SI units";

/// Physical parameters of the density estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityParams {
    /// Ion mass in kg
    pub ion_mass_kg: f64,
    /// Probe collecting area in m^2
    pub probe_area_m2: f64,
    /// Electron temperature in kelvin
    pub electron_temperature_k: f64,
}

impl From<&PlasmaConfig> for DensityParams {
    fn from(config: &PlasmaConfig) -> Self {
        Self {
            ion_mass_kg: config.gas_mass_number * ATOMIC_MASS,
            probe_area_m2: config.probe_area_m2,
            electron_temperature_k: config.electron_temperature_ev * ELEMENTARY_CHARGE
                / BOLTZMANN,
        }
    }
}

impl DensityParams {
    /// Ion sound (Bohm) speed in m/s.
    pub fn bohm_speed(&self) -> f64 {
        (BOLTZMANN * self.electron_temperature_k / self.ion_mass_kg).sqrt()
    }

    /// Current collected per unit density, in A·m³.
    fn current_per_density(&self) -> f64 {
        BOHM_COEFFICIENT * ELEMENTARY_CHARGE * self.bohm_speed() * self.probe_area_m2
    }
}

/// Density in m^-3 for each ion-saturation current sample.
pub fn ion_saturation_density(current: &[f64], params: &DensityParams) -> Vec<f64> {
    let per_density = params.current_per_density();
    current.iter().map(|&i| i / per_density).collect()
}

/// Density time series of all probes of a shot.
///
/// Probes without data keep a column of NaN so that columns always line up with probe
/// numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityTable {
    time: Vec<f64>,
    columns: Vec<(u32, Vec<f64>)>,
}

impl DensityTable {
    /// Build the table from `probes`, in the given order.
    ///
    /// The time axis is taken from the first probe that has one.
    pub fn build(probes: &mut [Probe], params: &DensityParams) -> DiagResult<Self> {
        let mut time: Option<Vec<f64>> = None;
        let mut densities = Vec::with_capacity(probes.len());

        for probe in probes.iter_mut() {
            if time.is_none() {
                time = probe.time()?.map(|t| t.to_vec());
            }
            let density = probe
                .current()?
                .map(|current| ion_saturation_density(&current, params));
            densities.push((probe.number(), density));
        }

        let time = time.unwrap_or_default();
        let rows = time.len();
        let columns = densities
            .into_iter()
            .map(|(number, density)| {
                let mut column = density.unwrap_or_default();
                column.resize(rows, f64::NAN);
                (number, column)
            })
            .collect();

        Ok(Self { time, columns })
    }

    /// Shared time axis in seconds.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Density column of probe `number`.
    pub fn column(&self, number: u32) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, column)| column.as_slice())
    }

    /// Number of probe columns.
    pub fn probe_count(&self) -> usize {
        self.columns.len()
    }

    /// Write the table as `;`-separated text with a `#` header line.
    pub fn write_delimited<W: Write>(&self, mut writer: W) -> DiagResult<()> {
        writeln!(writer, "# {DENSITY_HEADER}")?;

        let mut csv = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(writer);
        for (row, t) in self.time.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(format!("{t:.18e}"));
            record.extend(
                self.columns
                    .iter()
                    .map(|(_, column)| format!("{:.18e}", column[row])),
            );
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }
}
