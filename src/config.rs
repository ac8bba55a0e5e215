//! Configuration using Figment
//!
//! Configuration is layered from:
//! 1. built-in defaults (the NORTH installation layout and calibration constants)
//! 2. a TOML file (`config/diagnostics.toml` by default)
//! 3. environment variables prefixed with `NORTH_DIAG_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use north_diagnostics::config::DiagnosticsConfig;
//!
//! let config = DiagnosticsConfig::load()?;
//! println!("Position table: {}", config.tables.position_file.display());
//! # Ok::<(), north_diagnostics::error::DiagError>(())
//! ```

use crate::error::{DiagError, DiagResult};
use ddaq_reader::{Calibration, MachineScaling};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/diagnostics.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "NORTH_DIAG_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Probe position and mapping tables
    #[serde(default)]
    pub tables: TableConfig,
    /// Acquisition data location and calibration
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Plasma parameters used for density estimates
    #[serde(default)]
    pub plasma: PlasmaConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "NORTH diagnostics".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Installation-relative probe tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Probe positions and active flags
    #[serde(default = "default_position_file")]
    pub position_file: PathBuf,
    /// Channel mapping for probes above the deprecation threshold
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    /// Channel mapping for probes at or below the deprecation threshold
    #[serde(default = "default_deprecated_mapping_file")]
    pub deprecated_mapping_file: PathBuf,
    /// Highest probe number served by the deprecated mapping
    #[serde(default = "default_deprecation_threshold")]
    pub deprecation_threshold: u32,
    /// Number of probes installed on the machine
    #[serde(default = "default_total_probes")]
    pub total_probes: u32,
}

/// Acquisition data settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Directory holding the acquisition files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name prefix of the acquisition files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// ADC calibration constants
    #[serde(default)]
    pub calibration: Calibration,
    /// File name prefix of the machine-data files
    #[serde(default = "default_machine_file_prefix")]
    pub machine_file_prefix: String,
    /// Unit conversions of the machine-data logger
    #[serde(default)]
    pub machine: MachineScaling,
}

/// Plasma parameters for the ion-saturation density estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlasmaConfig {
    /// Ion mass number of the working gas (4 for helium)
    #[serde(default = "default_gas_mass_number")]
    pub gas_mass_number: f64,
    /// Collecting area of a probe tip in m^2
    #[serde(default = "default_probe_area")]
    pub probe_area_m2: f64,
    /// Assumed electron temperature in eV
    #[serde(default = "default_electron_temperature")]
    pub electron_temperature_ev: f64,
}

// Default value functions
fn default_position_file() -> PathBuf {
    PathBuf::from("config/probe_positions.json")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("config/probe_mappings.json")
}

fn default_deprecated_mapping_file() -> PathBuf {
    PathBuf::from("config/probe_mappings__deprecated.json")
}

fn default_deprecation_threshold() -> u32 {
    9831
}

fn default_total_probes() -> u32 {
    50
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("Data")
}

fn default_file_prefix() -> String {
    ddaq_reader::csv_reader::DEFAULT_FILE_PREFIX.to_string()
}

fn default_machine_file_prefix() -> String {
    ddaq_reader::machine::DEFAULT_MACHINE_PREFIX.to_string()
}

fn default_gas_mass_number() -> f64 {
    4.0
}

fn default_probe_area() -> f64 {
    1e-6
}

fn default_electron_temperature() -> f64 {
    10.0
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            position_file: default_position_file(),
            mapping_file: default_mapping_file(),
            deprecated_mapping_file: default_deprecated_mapping_file(),
            deprecation_threshold: default_deprecation_threshold(),
            total_probes: default_total_probes(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_prefix: default_file_prefix(),
            calibration: Calibration::default(),
            machine_file_prefix: default_machine_file_prefix(),
            machine: MachineScaling::default(),
        }
    }
}

impl Default for PlasmaConfig {
    fn default() -> Self {
        Self {
            gas_mass_number: default_gas_mass_number(),
            probe_area_m2: default_probe_area(),
            electron_temperature_ev: default_electron_temperature(),
        }
    }
}

impl DiagnosticsConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override the file with prefix `NORTH_DIAG_`.
    /// Example: `NORTH_DIAG_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> DiagResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DiagResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> DiagResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.application.log_level.to_lowercase();
        if !valid_levels.contains(&level.as_str()) {
            return Err(DiagError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.tables.total_probes == 0 {
            return Err(DiagError::Configuration(
                "total_probes must be at least 1".to_string(),
            ));
        }

        let cal = &self.acquisition.calibration;
        let factors = [
            ("full_scale_volts", cal.full_scale_volts),
            ("bias_gain", cal.bias_gain),
            ("current_divisor", cal.current_divisor),
            ("sample_period_s", cal.sample_period_s),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value > 0.0) {
                return Err(DiagError::Configuration(format!(
                    "Calibration factor {name} must be positive, got {value}"
                )));
            }
        }
        if cal.adc_max_count == 0 {
            return Err(DiagError::Configuration(
                "Calibration adc_max_count must be positive".to_string(),
            ));
        }
        if cal.time_channel == cal.bias_channel {
            return Err(DiagError::Configuration(format!(
                "Time and bias channels must differ (both ch{})",
                cal.time_channel
            )));
        }

        let machine = &self.acquisition.machine;
        let scales = [
            ("time_scale_s", machine.time_scale_s),
            ("pressure_scale_pa", machine.pressure_scale_pa),
            ("power_scale_w", machine.power_scale_w),
        ];
        for (name, value) in scales {
            if !(value.is_finite() && value > 0.0) {
                return Err(DiagError::Configuration(format!(
                    "Machine scale {name} must be positive, got {value}"
                )));
            }
        }

        let plasma = [
            ("gas_mass_number", self.plasma.gas_mass_number),
            ("probe_area_m2", self.plasma.probe_area_m2),
            ("electron_temperature_ev", self.plasma.electron_temperature_ev),
        ];
        for (name, value) in plasma {
            if !(value.is_finite() && value > 0.0) {
                return Err(DiagError::Configuration(format!(
                    "Plasma parameter {name} must be positive, got {value}"
                )));
            }
        }

        Ok(())
    }
}
