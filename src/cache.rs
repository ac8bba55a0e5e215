//! Shot-scoped cache of probe tables and bulk-loaded acquisition data.
//!
//! Every probe of a shot needs the same position table, the same mapping table and the
//! same acquisition file. [`ShotCache`] loads each of them once per shot and hands out
//! shared references. Entries are only ever added: once a shot is cached it is never
//! updated, evicted or invalidated.
//!
//! Mapping tables and bulk data are keyed by `(shot, MappingVariant)`. Probes on either
//! side of the deprecation threshold can share a shot without one mapping file shadowing
//! the other, and the channel set of a bulk load always matches the mapping it was
//! derived from.
//!
//! The cache is owned by the caller and shared through a [`SharedCache`] handle, so
//! independent analyses (and tests) never see each other's entries.

use crate::error::DiagResult;
use crate::tables::{ChannelMap, MappingVariant, PositionTable};
use ddaq_reader::{ChannelSelection, RawDataReader};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle to a cache shared by several probes.
pub type SharedCache = Arc<Mutex<ShotCache>>;

/// Number of loads performed by a cache since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Position tables read from disk
    pub position_loads: usize,
    /// Mapping tables read from disk
    pub mapping_loads: usize,
    /// Bulk acquisition reads issued, including reads of missing files
    pub bulk_loads: usize,
}

/// Calibrated data of every mapped channel of a shot.
///
/// A shot whose acquisition file is missing or unreadable is stored as the empty sentinel returned by
/// [`ShotData::missing`]; probes of that shot resolve to no data instead of retrying.
#[derive(Debug, Clone, Default)]
pub struct ShotData {
    /// Shared time axis in seconds
    pub time: Option<Arc<[f64]>>,
    /// Shared bias voltage in volts
    pub bias_voltage: Option<Arc<[f64]>>,
    /// Current per channel in amperes
    pub currents: BTreeMap<u32, Arc<[f64]>>,
}

impl ShotData {
    /// Sentinel for a shot without acquisition data.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Whether this is the missing-data sentinel.
    pub fn is_missing(&self) -> bool {
        self.time.is_none() && self.bias_voltage.is_none() && self.currents.is_empty()
    }
}

/// Position tables, mapping tables and bulk data keyed by shot.
#[derive(Debug, Default)]
pub struct ShotCache {
    positions: HashMap<u32, Arc<PositionTable>>,
    mappings: HashMap<(u32, MappingVariant), Arc<ChannelMap>>,
    data: HashMap<(u32, MappingVariant), Arc<ShotData>>,
    stats: CacheStats,
}

impl ShotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache behind a shareable handle.
    pub fn shared() -> SharedCache {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Position table of `shot`, loading it from `path` on first use.
    pub fn positions(&mut self, shot: u32, path: &Path) -> DiagResult<Arc<PositionTable>> {
        if let Some(table) = self.positions.get(&shot) {
            return Ok(Arc::clone(table));
        }

        info!(shot, path = %path.display(), "Loading position data");
        let table = Arc::new(PositionTable::load(path)?);
        self.stats.position_loads += 1;
        self.positions.insert(shot, Arc::clone(&table));
        Ok(table)
    }

    /// Mapping table of `shot` for `variant`, loading it from `path` on first use.
    pub fn mapping(
        &mut self,
        shot: u32,
        variant: MappingVariant,
        path: &Path,
    ) -> DiagResult<Arc<ChannelMap>> {
        if let Some(map) = self.mappings.get(&(shot, variant)) {
            return Ok(Arc::clone(map));
        }

        info!(shot, ?variant, path = %path.display(), "Loading mapping data");
        let map = Arc::new(ChannelMap::load(path)?);
        self.stats.mapping_loads += 1;
        self.mappings.insert((shot, variant), Arc::clone(&map));
        Ok(map)
    }

    /// Bulk data of every numeric channel in the `variant` mapping of `shot`.
    ///
    /// All channels are read with a single call to `reader`. A missing or unreadable
    /// acquisition file is logged and cached as [`ShotData::missing`], so the read is not
    /// retried for the other probes of the shot. Only an invalid channel selection is
    /// returned as an error, and nothing is cached for it.
    pub fn shot_data(
        &mut self,
        shot: u32,
        variant: MappingVariant,
        mapping_path: &Path,
        data_dir: &Path,
        reader: &dyn RawDataReader,
    ) -> DiagResult<Arc<ShotData>> {
        if let Some(data) = self.data.get(&(shot, variant)) {
            return Ok(Arc::clone(data));
        }

        let mapping = self.mapping(shot, variant, mapping_path)?;
        let channels: Vec<u32> = mapping.numeric_channels().into_iter().collect();

        info!(shot, ?variant, channels = channels.len(), "Bulk loading probe data");
        self.stats.bulk_loads += 1;
        let data = match reader.read(data_dir, shot, &ChannelSelection::Many(channels)) {
            Ok(acquisition) => ShotData {
                time: Some(acquisition.time),
                bias_voltage: acquisition.bias_voltage,
                currents: acquisition.currents,
            },
            Err(err) if err.is_not_found() => {
                warn!(
                    shot,
                    path = %data_dir.display(),
                    error = %err,
                    "Data file not found for shot {shot}"
                );
                ShotData::missing()
            }
            Err(err) if !err.is_invalid_input() => {
                warn!(
                    shot,
                    path = %data_dir.display(),
                    error = %err,
                    "Failed to read data for shot {shot}"
                );
                ShotData::missing()
            }
            Err(err) => return Err(err.into()),
        };

        let data = Arc::new(data);
        self.data.insert((shot, variant), Arc::clone(&data));
        Ok(data)
    }

    /// Load counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether bulk data of `shot` is cached for `variant`.
    pub fn has_shot_data(&self, shot: u32, variant: MappingVariant) -> bool {
        self.data.contains_key(&(shot, variant))
    }

    /// Shots with a cached position table, in ascending order.
    pub fn cached_shots(&self) -> Vec<u32> {
        let mut shots: Vec<u32> = self.positions.keys().copied().collect();
        shots.sort_unstable();
        shots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddaq_reader::{Acquisition, ChannelId, ReaderError};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    /// Reader that records requested channels and serves a ramp per channel.
    #[derive(Default)]
    struct RampReader {
        reads: AtomicUsize,
        missing: bool,
        corrupt: bool,
        requested: Mutex<Vec<u32>>,
    }

    impl RawDataReader for RampReader {
        fn read(
            &self,
            path: &Path,
            _shot: u32,
            selection: &ChannelSelection,
        ) -> ddaq_reader::Result<Acquisition> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.missing {
                return Err(ReaderError::AcquisitionFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let channels = selection.channel_numbers()?;
            if self.corrupt {
                return Err(ReaderError::Malformed {
                    line: 2,
                    column: "ch2".into(),
                    value: "x".into(),
                });
            }
            self.requested.lock().extend(channels.iter().copied());
            Ok(Acquisition {
                time: vec![0.0, 1e-6].into(),
                bias_voltage: Some(vec![-1.0, 1.0].into()),
                currents: channels
                    .into_iter()
                    .map(|ch| (ch, Arc::from(vec![f64::from(ch), f64::from(ch) + 1.0])))
                    .collect(),
            })
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_position_table_loaded_once_per_shot() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "positions.json",
            r#"{"probes": {"1": {"active": true, "position": [1.0, 0.0, 0.0]}}}"#,
        );
        let mut cache = ShotCache::new();

        let first = cache.positions(100, &path).unwrap();
        let second = cache.positions(100, &path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().position_loads, 1);

        cache.positions(101, &path).unwrap();
        assert_eq!(cache.stats().position_loads, 2);
        assert_eq!(cache.cached_shots(), vec![100, 101]);
    }

    #[test]
    fn test_mapping_keyed_by_variant() {
        let dir = TempDir::new().unwrap();
        let current = write(&dir, "current.json", r#"{"1": 30}"#);
        let deprecated = write(&dir, "deprecated.json", r#"{"1": 16}"#);
        let mut cache = ShotCache::new();

        let dep = cache
            .mapping(100, MappingVariant::Deprecated, &deprecated)
            .unwrap();
        let cur = cache.mapping(100, MappingVariant::Current, &current).unwrap();

        assert_eq!(dep.channel(1), Some(ChannelId::Number(16)));
        assert_eq!(cur.channel(1), Some(ChannelId::Number(30)));
        assert_eq!(cache.stats().mapping_loads, 2);
    }

    #[test]
    fn test_bulk_load_reads_all_numeric_channels_once() {
        let dir = TempDir::new().unwrap();
        let mapping = write(&dir, "map.json", r#"{"1": 16, "2": "17", "3": null, "4": 16}"#);
        let reader = RampReader::default();
        let mut cache = ShotCache::new();

        let data = cache
            .shot_data(100, MappingVariant::Deprecated, &mapping, dir.path(), &reader)
            .unwrap();
        let again = cache
            .shot_data(100, MappingVariant::Deprecated, &mapping, dir.path(), &reader)
            .unwrap();

        assert!(Arc::ptr_eq(&data, &again));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
        assert_eq!(*reader.requested.lock(), vec![16, 17]);
        assert_eq!(data.currents.len(), 2);
        assert_eq!(cache.stats().bulk_loads, 1);
        assert_eq!(cache.stats().mapping_loads, 1);
        assert!(cache.has_shot_data(100, MappingVariant::Deprecated));
        assert!(!cache.has_shot_data(100, MappingVariant::Current));
    }

    #[test]
    #[traced_test]
    fn test_missing_file_cached_as_sentinel() {
        let dir = TempDir::new().unwrap();
        let mapping = write(&dir, "map.json", r#"{"1": 16}"#);
        let reader = RampReader {
            missing: true,
            ..Default::default()
        };
        let mut cache = ShotCache::new();

        let data = cache
            .shot_data(200, MappingVariant::Deprecated, &mapping, dir.path(), &reader)
            .unwrap();
        assert!(data.is_missing());
        assert!(logs_contain("Data file not found for shot 200"));

        // The sentinel is served without retrying the read
        let again = cache
            .shot_data(200, MappingVariant::Deprecated, &mapping, dir.path(), &reader)
            .unwrap();
        assert!(again.is_missing());
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_unreadable_file_cached_as_sentinel() {
        let dir = TempDir::new().unwrap();
        let mapping = write(&dir, "map.json", r#"{"1": 16, "2": 17}"#);
        let reader = RampReader {
            corrupt: true,
            ..Default::default()
        };
        let mut cache = ShotCache::new();

        for _ in 0..3 {
            let data = cache
                .shot_data(300, MappingVariant::Deprecated, &mapping, dir.path(), &reader)
                .unwrap();
            assert!(data.is_missing());
        }
        assert!(logs_contain("Failed to read data for shot 300"));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().bulk_loads, 1);
    }

    #[test]
    fn test_missing_mapping_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let reader = RampReader::default();
        let mut cache = ShotCache::new();

        let result = cache.shot_data(
            1,
            MappingVariant::Current,
            &dir.path().join("absent.json"),
            dir.path(),
            &reader,
        );
        assert!(result.is_err());
        assert_eq!(reader.reads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
