//! Langmuir probe entity.
//!
//! A [`Probe`] resolves, on demand and at most once each:
//!
//! 1. its position and activity flag ([`Probe::resolve_position`]),
//! 2. its acquisition channel ([`Probe::channel`]),
//! 3. its calibrated samples ([`Probe::samples`]): time, bias voltage and current.
//!
//! With [`CachingMode::Shared`] the tables and the acquisition file are loaded once per
//! shot through the [`SharedCache`] handed out by the [`ProbeFactory`], and every probe
//! takes its own slice of the bulk data. With [`CachingMode::Disabled`] each probe reads
//! the tables and its own channel directly.
//!
//! Inactive probes never touch the acquisition data. A missing or unreadable acquisition
//! file, a missing channel or a corrupt channel column leaves the affected samples absent;
//! only table-loading failures and malformed channel identifiers are returned as errors.

use crate::cache::{SharedCache, ShotCache};
use crate::config::{DiagnosticsConfig, TableConfig};
use crate::diagnostic::{Diagnostic, DiagnosticInfo};
use crate::error::DiagResult;
use crate::tables::{ChannelMap, MappingVariant, Position, PositionResolution, PositionTable};
use ddaq_reader::{ChannelId, ChannelSelection, CsvDdaqReader, RawDataReader, ReaderError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of probes installed on the machine.
pub const TOTAL_PROBES: u32 = 50;

/// Type tag of probe diagnostics.
pub const PROBE_KIND: &str = "Probe";

/// How a probe obtains its tables and samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachingMode {
    /// Share per-shot loads with every probe using the same cache
    #[default]
    Shared,
    /// Read tables and the probe's own channel directly
    Disabled,
}

/// Calibrated samples of one probe.
///
/// Fields are `None` when the data could not be obtained.
#[derive(Debug, Clone, Default)]
pub struct ProbeSamples {
    /// Time axis in seconds
    pub time: Option<Arc<[f64]>>,
    /// Bias voltage in volts
    pub bias_voltage: Option<Arc<[f64]>>,
    /// Probe current in amperes
    pub current: Option<Arc<[f64]>>,
}

/// Collaborators shared by all probes of a factory.
#[derive(Clone)]
struct ProbeSources {
    tables: Arc<TableConfig>,
    reader: Arc<dyn RawDataReader>,
    cache: SharedCache,
}

// =============================================================================
// Factory
// =============================================================================

/// Creates probes that share a table configuration, a reader and a cache.
#[derive(Clone)]
pub struct ProbeFactory {
    sources: ProbeSources,
    data_dir: PathBuf,
    caching: CachingMode,
}

impl ProbeFactory {
    /// Create a factory reading acquisition data from `data_dir` with `reader`.
    pub fn new(
        tables: TableConfig,
        data_dir: impl Into<PathBuf>,
        reader: Arc<dyn RawDataReader>,
        cache: SharedCache,
    ) -> Self {
        Self {
            sources: ProbeSources {
                tables: Arc::new(tables),
                reader,
                cache,
            },
            data_dir: data_dir.into(),
            caching: CachingMode::Shared,
        }
    }

    /// Create a factory reading ddaq CSV files as described by `config`, with a fresh cache.
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let acquisition = &config.acquisition;
        let reader = CsvDdaqReader::new(acquisition.calibration.clone())
            .with_prefix(acquisition.file_prefix.clone());
        Self::new(
            config.tables.clone(),
            acquisition.data_dir.clone(),
            Arc::new(reader),
            ShotCache::shared(),
        )
    }

    /// Set the caching mode of probes created from now on.
    pub fn with_caching(mut self, caching: CachingMode) -> Self {
        self.caching = caching;
        self
    }

    /// Create probe `number` of `shot`.
    pub fn probe(&self, shot: u32, number: u32) -> Probe {
        Probe {
            info: DiagnosticInfo::new(self.data_dir.clone(), shot, PROBE_KIND),
            number,
            caching: self.caching,
            sources: self.sources.clone(),
            resolution: None,
            channel: None,
            samples: None,
        }
    }

    /// Create every installed probe of `shot`, numbered from 1.
    pub fn probes(&self, shot: u32) -> Vec<Probe> {
        (1..=self.sources.tables.total_probes)
            .map(|number| self.probe(shot, number))
            .collect()
    }

    /// Cache shared by the probes of this factory.
    pub fn cache(&self) -> &SharedCache {
        &self.sources.cache
    }

    /// Table configuration used by the probes of this factory.
    pub fn tables(&self) -> &TableConfig {
        &self.sources.tables
    }
}

// =============================================================================
// Probe
// =============================================================================

/// A single Langmuir probe of one shot.
pub struct Probe {
    info: DiagnosticInfo,
    number: u32,
    caching: CachingMode,
    sources: ProbeSources,
    /// `None` until the position table has been consulted
    resolution: Option<PositionResolution>,
    /// `None` until the mapping table has been consulted
    channel: Option<Option<ChannelId>>,
    /// `None` until an active probe has loaded its data
    samples: Option<ProbeSamples>,
}

impl Probe {
    /// Probe number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Caching mode fixed at creation.
    pub fn caching(&self) -> CachingMode {
        self.caching
    }

    /// Mapping file serving this probe.
    pub fn mapping_variant(&self) -> MappingVariant {
        MappingVariant::for_probe(self.number, self.sources.tables.deprecation_threshold)
    }

    /// Position and activity of the probe, from the position table.
    pub fn resolve_position(&mut self) -> DiagResult<PositionResolution> {
        if let Some(resolution) = self.resolution {
            return Ok(resolution);
        }

        let shot = self.info.shot();
        let path = &self.sources.tables.position_file;
        let resolution = match self.caching {
            CachingMode::Shared => self
                .sources
                .cache
                .lock()
                .positions(shot, path)?
                .resolve(self.number),
            CachingMode::Disabled => {
                info!(shot, probe = self.number, "Loading configuration for probe");
                PositionTable::load(path)?.resolve(self.number)
            }
        };

        self.resolution = Some(resolution);
        Ok(resolution)
    }

    /// Probe location, `None` if the probe is not in the position table.
    pub fn position(&mut self) -> DiagResult<Option<Position>> {
        Ok(self.resolve_position()?.position().copied())
    }

    /// Acquisition channel of the probe, `None` if unmapped.
    pub fn channel(&mut self) -> DiagResult<Option<ChannelId>> {
        if let Some(channel) = &self.channel {
            return Ok(channel.clone());
        }

        let shot = self.info.shot();
        let variant = self.mapping_variant();
        let tables = Arc::clone(&self.sources.tables);
        let path = variant.path(&tables);
        let channel = match self.caching {
            CachingMode::Shared => self
                .sources
                .cache
                .lock()
                .mapping(shot, variant, path)?
                .channel(self.number),
            CachingMode::Disabled => {
                info!(shot, probe = self.number, ?variant, "Loading channel for probe");
                ChannelMap::load(path)?.channel(self.number)
            }
        };

        if channel.is_none() {
            warn!(
                shot,
                probe = self.number,
                "Probe {} does not have a mapped channel",
                self.number
            );
        }

        self.channel = Some(channel.clone());
        Ok(channel)
    }

    /// Calibrated samples of the probe.
    ///
    /// Returns `None` for inactive probes, which never load data. Active probes load once;
    /// later calls return the memoized samples.
    pub fn samples(&mut self) -> DiagResult<Option<&ProbeSamples>> {
        if !self.resolve_position()?.is_active() {
            return Ok(None);
        }

        if self.samples.is_none() {
            let samples = match self.caching {
                CachingMode::Shared => self.samples_from_cache()?,
                CachingMode::Disabled => self.read_own_channel()?,
            };
            self.samples = Some(samples);
        }

        Ok(self.samples.as_ref())
    }

    /// Bias voltage in volts, if available.
    pub fn bias_voltage(&mut self) -> DiagResult<Option<Arc<[f64]>>> {
        Ok(self.samples()?.and_then(|s| s.bias_voltage.clone()))
    }

    /// Probe current in amperes, if available.
    pub fn current(&mut self) -> DiagResult<Option<Arc<[f64]>>> {
        Ok(self.samples()?.and_then(|s| s.current.clone()))
    }

    fn samples_from_cache(&mut self) -> DiagResult<ProbeSamples> {
        let shot = self.info.shot();
        let channel = self.channel()?;
        let variant = self.mapping_variant();
        let tables = Arc::clone(&self.sources.tables);

        let data = self.sources.cache.lock().shot_data(
            shot,
            variant,
            variant.path(&tables),
            self.info.path(),
            self.sources.reader.as_ref(),
        )?;
        debug!(shot, probe = self.number, "Accessing cached data");

        let current = match channel {
            Some(id) => {
                let ch = id.number()?;
                let current = data.currents.get(&ch).cloned();
                if current.is_none() && !data.is_missing() {
                    warn!(
                        shot,
                        probe = self.number,
                        channel = ch,
                        "Channel {ch} not found in cached data for shot {shot}"
                    );
                }
                current
            }
            None => None,
        };

        Ok(ProbeSamples {
            time: data.time.clone(),
            bias_voltage: data.bias_voltage.clone(),
            current,
        })
    }

    fn read_own_channel(&mut self) -> DiagResult<ProbeSamples> {
        let shot = self.info.shot();
        let Some(channel) = self.channel()? else {
            return Ok(ProbeSamples::default());
        };

        info!(shot, probe = self.number, %channel, "Loading data for probe");
        let selection = ChannelSelection::Single(channel.clone());
        match self
            .sources
            .reader
            .read(self.info.path(), shot, &selection)
        {
            Ok(acquisition) => {
                let current = acquisition.current(channel.number()?).cloned();
                Ok(ProbeSamples {
                    time: Some(acquisition.time),
                    bias_voltage: acquisition.bias_voltage,
                    current,
                })
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    shot,
                    path = %self.info.path().display(),
                    "Data file not found for shot {shot}"
                );
                Ok(ProbeSamples::default())
            }
            Err(ReaderError::ChannelNotFound { channel: ch, .. }) => {
                warn!(
                    shot,
                    probe = self.number,
                    channel = ch,
                    "Channel {ch} not found in shot {shot}"
                );
                Ok(ProbeSamples::default())
            }
            Err(err) if !err.is_invalid_input() => {
                warn!(
                    shot,
                    probe = self.number,
                    %channel,
                    error = %err,
                    "Failed to read data for probe {}",
                    self.number
                );
                Ok(ProbeSamples::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Diagnostic for Probe {
    fn info(&self) -> &DiagnosticInfo {
        &self.info
    }

    fn is_active(&mut self) -> DiagResult<bool> {
        Ok(self.resolve_position()?.is_active())
    }

    fn time(&mut self) -> DiagResult<Option<Arc<[f64]>>> {
        Ok(self.samples()?.and_then(|s| s.time.clone()))
    }
}
