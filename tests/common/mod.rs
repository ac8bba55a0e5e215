//! Shared fixtures for probe integration tests.

#![allow(dead_code)]

use ddaq_reader::{Acquisition, ChannelSelection, RawDataReader, ReaderError};
use north_diagnostics::config::TableConfig;
use north_diagnostics::{CachingMode, ProbeFactory, ShotCache};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Samples per channel served by [`CountingReader`].
pub const SAMPLES: usize = 5;

/// Shot whose acquisition file does not exist.
pub const MISSING_SHOT: u32 = 404;

/// Shot whose acquisition file exists but cannot be decoded.
pub const CORRUPT_SHOT: u32 = 500;

/// Channel absent from every acquisition.
pub const ABSENT_CHANNEL: u32 = 99;

/// Probes 1-4 and 7 are active, 5 is inactive, 6 is not listed; 9832 sits above the
/// deprecation threshold.
pub const POSITIONS: &str = r#"{
    "probes": {
        "1": { "active": true,  "position": [0.3, 0.4, 0.0] },
        "2": { "active": true,  "position": [0.6, 0.8, 0.1] },
        "3": { "active": true,  "position": [1.0, 0.0, -0.1] },
        "4": { "active": true,  "position": [0.0, 1.0, 0.0] },
        "5": { "active": false, "position": [0.0, 0.5, 0.0] },
        "7": { "active": true,  "position": [0.2, 0.0, 0.0] },
        "9832": { "active": true, "position": [0.0, 0.7, 0.0] }
    }
}"#;

/// Mapping for probes at or below the threshold.
pub const DEPRECATED_MAPPING: &str = r#"{
    "1": 16, "2": "17", "3": 18, "4": 99, "5": 20, "7": "spare", "9832": 40
}"#;

/// Mapping for probes above the threshold; channels disjoint from the deprecated file.
pub const CURRENT_MAPPING: &str = r#"{
    "1": 60, "9832": 32, "9833": null
}"#;

/// Calibrated current served for `channel`.
pub fn current_for(channel: u32) -> f64 {
    f64::from(channel) * 1e-3
}

/// In-memory reader counting its invocations.
#[derive(Default)]
pub struct CountingReader {
    reads: AtomicUsize,
}

impl CountingReader {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RawDataReader for CountingReader {
    fn read(
        &self,
        path: &Path,
        shot: u32,
        selection: &ChannelSelection,
    ) -> ddaq_reader::Result<Acquisition> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let channels = selection.channel_numbers()?;
        if shot == MISSING_SHOT {
            return Err(ReaderError::AcquisitionFileNotFound {
                path: path.join(format!("ddaq{shot}.csv")),
            });
        }
        if shot == CORRUPT_SHOT {
            return Err(ReaderError::Malformed {
                line: 2,
                column: "ch2".into(),
                value: "x".into(),
            });
        }

        let mut currents = BTreeMap::new();
        for channel in channels {
            if channel == ABSENT_CHANNEL {
                if let ChannelSelection::Single(_) = selection {
                    return Err(ReaderError::ChannelNotFound { shot, channel });
                }
                continue;
            }
            currents.insert(channel, Arc::from(vec![current_for(channel); SAMPLES]));
        }

        Ok(Acquisition {
            time: (0..SAMPLES).map(|i| i as f64 * 1e-6).collect(),
            bias_voltage: Some(Arc::from(vec![-10.0, -5.0, 0.0, 5.0, 10.0])),
            currents,
        })
    }
}

/// Temporary installation with position and mapping tables.
pub struct Fixture {
    pub dir: TempDir,
    pub tables: TableConfig,
    pub reader: Arc<CountingReader>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path
        };

        let tables = TableConfig {
            position_file: write("probe_positions.json", POSITIONS),
            mapping_file: write("probe_mappings.json", CURRENT_MAPPING),
            deprecated_mapping_file: write("probe_mappings__deprecated.json", DEPRECATED_MAPPING),
            deprecation_threshold: 9831,
            total_probes: 7,
        };

        Self {
            dir,
            tables,
            reader: Arc::new(CountingReader::default()),
        }
    }

    /// Factory with its own fresh cache.
    pub fn factory(&self, caching: CachingMode) -> ProbeFactory {
        ProbeFactory::new(
            self.tables.clone(),
            self.dir.path(),
            self.reader.clone(),
            ShotCache::shared(),
        )
        .with_caching(caching)
    }
}
