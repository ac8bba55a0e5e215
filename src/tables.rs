//! Probe position and channel-mapping tables.
//!
//! Both tables are JSON objects keyed by the probe number in string form:
//!
//! ```json
//! { "probes": { "1": { "active": true, "position": [0.12, -0.03, 0.0] } } }
//! ```
//!
//! ```json
//! { "1": 16, "2": "17", "3": null }
//! ```
//!
//! A probe missing from a table is not an error: it resolves to
//! [`PositionResolution::NotConfigured`] or to no channel.

use crate::config::TableConfig;
use crate::error::{DiagError, DiagResult};
use ddaq_reader::ChannelId;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

// =============================================================================
// Positions
// =============================================================================

/// Probe tip location in machine coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Horizontal coordinate, perpendicular to `x`
    pub y: f64,
    /// Vertical coordinate
    pub z: f64,
    /// Major radius, `sqrt(x² + y²)`
    pub r: f64,
}

impl Position {
    /// Build a position from Cartesian coordinates, deriving the radius.
    pub fn from_xyz([x, y, z]: [f64; 3]) -> Self {
        Self {
            x,
            y,
            z,
            r: x.hypot(y),
        }
    }
}

/// Outcome of looking a probe up in the position table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionResolution {
    /// The probe is listed; `active` says whether it was in use.
    Found {
        /// Probe location
        position: Position,
        /// Activity flag from the table
        active: bool,
    },
    /// The probe is not listed and is treated as inactive.
    NotConfigured,
}

impl PositionResolution {
    /// Whether the probe takes part in the shot.
    pub fn is_active(&self) -> bool {
        matches!(self, PositionResolution::Found { active: true, .. })
    }

    /// Probe location, if configured.
    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionResolution::Found { position, .. } => Some(position),
            PositionResolution::NotConfigured => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProbeEntry {
    active: bool,
    position: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct PositionFile {
    probes: HashMap<String, ProbeEntry>,
}

/// Position table of all installed probes.
#[derive(Debug, Clone)]
pub struct PositionTable {
    probes: HashMap<String, ProbeEntry>,
}

impl PositionTable {
    /// Load the table from a JSON file.
    pub fn load(path: &Path) -> DiagResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| DiagError::table(path, e))?;
        Self::from_json(&text).map_err(|e| DiagError::table(path, e))
    }

    /// Parse the table from JSON text.
    pub fn from_json(text: &str) -> DiagResult<Self> {
        let file: PositionFile = serde_json::from_str(text)?;
        Ok(Self { probes: file.probes })
    }

    /// Look up probe `number`.
    pub fn resolve(&self, number: u32) -> PositionResolution {
        match self.probes.get(&number.to_string()) {
            Some(entry) => PositionResolution::Found {
                position: Position::from_xyz(entry.position),
                active: entry.active,
            },
            None => PositionResolution::NotConfigured,
        }
    }

    /// Number of listed probes.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probe is listed.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

// =============================================================================
// Channel mappings
// =============================================================================

/// Which mapping file serves a probe.
///
/// Probes numbered above the deprecation threshold use the current mapping, all others
/// the deprecated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingVariant {
    /// `probe_mappings.json`
    Current,
    /// `probe_mappings__deprecated.json`
    Deprecated,
}

impl MappingVariant {
    /// Select the mapping for probe `number`.
    pub fn for_probe(number: u32, threshold: u32) -> Self {
        if number > threshold {
            MappingVariant::Current
        } else {
            MappingVariant::Deprecated
        }
    }

    /// Mapping file of this variant.
    pub fn path<'a>(&self, tables: &'a TableConfig) -> &'a Path {
        match self {
            MappingVariant::Current => &tables.mapping_file,
            MappingVariant::Deprecated => &tables.deprecated_mapping_file,
        }
    }
}

/// Probe number to acquisition channel mapping.
#[derive(Debug, Clone)]
pub struct ChannelMap {
    entries: HashMap<String, Value>,
}

impl ChannelMap {
    /// Load the mapping from a JSON file.
    pub fn load(path: &Path) -> DiagResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| DiagError::table(path, e))?;
        Self::from_json(&text).map_err(|e| DiagError::table(path, e))
    }

    /// Parse the mapping from JSON text.
    pub fn from_json(text: &str) -> DiagResult<Self> {
        let entries: HashMap<String, Value> = serde_json::from_str(text)?;
        Ok(Self { entries })
    }

    /// Channel of probe `number`, `None` when unmapped.
    pub fn channel(&self, number: u32) -> Option<ChannelId> {
        self.entries
            .get(&number.to_string())
            .and_then(channel_from_value)
    }

    /// Distinct numeric channels of the mapping; other entries are skipped.
    pub fn numeric_channels(&self) -> BTreeSet<u32> {
        self.entries
            .values()
            .filter_map(channel_from_value)
            .filter_map(|id| id.number().ok())
            .collect()
    }

    /// Number of entries, mapped or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn channel_from_value(value: &Value) -> Option<ChannelId> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(
            n.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .or_else(|| n.as_f64().and_then(integral_channel))
                .map(ChannelId::Number)
                .unwrap_or_else(|| ChannelId::Text(n.to_string())),
        ),
        Value::String(s) => Some(ChannelId::Text(s.clone())),
        other => Some(ChannelId::Text(other.to_string())),
    }
}

/// Channel number written as a float, such as `16.0`.
fn integral_channel(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value)).then_some(value as u32)
}
