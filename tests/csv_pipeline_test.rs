//! End-to-end tests: configuration, CSV acquisition files, probes and density table.

mod common;

use common::{DEPRECATED_MAPPING, POSITIONS};
use north_diagnostics::analysis::{ion_saturation_density, DensityParams, DensityTable};
use north_diagnostics::config::{DiagnosticsConfig, DEFAULT_CONFIG_PATH};
use north_diagnostics::reader::ChannelId;
use north_diagnostics::{CachingMode, Diagnostic, ProbeFactory};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SHOT: u32 = 9774;
const TOL: f64 = 1e-12;

/// Raw counts: ch2 (time reference), ch7 (bias), ch16-ch18 (probes 1-3).
const DDAQ: &str = "\
ch2,ch7,ch16,ch17,ch18
0,-1000,3276,100,0
0,0,6553,200,-100
0,1000,9830,300,-200
0,2000,13107,400,-300
";

fn installation() -> (TempDir, DiagnosticsConfig) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("positions.json"), POSITIONS).unwrap();
    fs::write(root.join("deprecated.json"), DEPRECATED_MAPPING).unwrap();
    fs::write(root.join("current.json"), "{}").unwrap();
    fs::create_dir(root.join("Data")).unwrap();
    fs::write(root.join("Data").join(format!("ddaq{SHOT}.csv")), DDAQ).unwrap();

    let mut config = DiagnosticsConfig::default();
    config.tables.position_file = root.join("positions.json");
    config.tables.deprecated_mapping_file = root.join("deprecated.json");
    config.tables.mapping_file = root.join("current.json");
    config.tables.total_probes = 6;
    config.acquisition.data_dir = root.join("Data");
    (dir, config)
}

#[test]
fn test_calibrated_samples_match_scale_factors() {
    let (_dir, config) = installation();
    let vpc = 20.0 / 65_535.0;

    for mode in [CachingMode::Shared, CachingMode::Disabled] {
        let factory = ProbeFactory::from_config(&config).with_caching(mode);
        let mut probe = factory.probe(SHOT, 1);

        let time = probe.time().unwrap().unwrap();
        assert_eq!(time.len(), 4);
        assert!((time[3] - 3e-6).abs() < TOL);

        let bias = probe.bias_voltage().unwrap().unwrap();
        for (v, raw) in bias.iter().zip([-1000.0, 0.0, 1000.0, 2000.0]) {
            assert!((v - raw * vpc * 11.75).abs() < TOL);
        }

        let current = probe.current().unwrap().unwrap();
        for (i, raw) in current.iter().zip([3276.0, 6553.0, 9830.0, 13107.0]) {
            assert!((i - raw * vpc / 213.0).abs() < TOL);
        }
    }
}

#[test]
fn test_textual_mapping_reads_same_channel_in_both_modes() {
    let (_dir, config) = installation();

    let shared = ProbeFactory::from_config(&config)
        .probe(SHOT, 2)
        .current()
        .unwrap()
        .unwrap();
    let direct = ProbeFactory::from_config(&config)
        .with_caching(CachingMode::Disabled)
        .probe(SHOT, 2)
        .current()
        .unwrap()
        .unwrap();

    assert_eq!(shared, direct);
}

#[test]
fn test_density_table_for_shot() {
    let (_dir, config) = installation();
    let factory = ProbeFactory::from_config(&config);
    let params = DensityParams::from(&config.plasma);

    let mut probes = factory.probes(SHOT);
    let table = DensityTable::build(&mut probes, &params).unwrap();

    assert_eq!(table.probe_count(), 6);
    assert_eq!(table.time().len(), 4);

    let expected_current = probes[0].current().unwrap().unwrap();
    let expected = ion_saturation_density(&expected_current, &params);
    assert_eq!(table.column(1).unwrap(), expected.as_slice());

    // Probe 4 maps to a channel missing from the file, 5 is inactive, 6 is not listed
    for number in [4, 5, 6] {
        let column = table.column(number).unwrap();
        assert_eq!(column.len(), 4);
        assert!(column.iter().all(|n| n.is_nan()));
    }

    let mut out = Vec::new();
    table.write_delimited(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 5);
    assert!(text.starts_with("# Time;"));

    // One bulk read served all six probes
    assert_eq!(factory.cache().lock().stats().bulk_loads, 1);
}

#[test]
fn test_corrupt_column_of_inactive_probe_is_dropped() {
    let (dir, config) = installation();
    // ch20 belongs to inactive probe 5 and holds a non-numeric sample
    fs::write(
        dir.path().join("Data").join(format!("ddaq{SHOT}.csv")),
        "ch2,ch7,ch16,ch17,ch18,ch20\n0,0,1,2,3,4\n0,0,5,6,7,x\n",
    )
    .unwrap();

    let shared = ProbeFactory::from_config(&config);
    let direct = ProbeFactory::from_config(&config).with_caching(CachingMode::Disabled);
    for number in [1, 2, 3] {
        let cached = shared.probe(SHOT, number).current().unwrap().unwrap();
        let uncached = direct.probe(SHOT, number).current().unwrap().unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached, uncached);
    }
    assert_eq!(shared.cache().lock().stats().bulk_loads, 1);
}

#[test]
fn test_missing_shot_produces_empty_table() {
    let (_dir, config) = installation();
    let factory = ProbeFactory::from_config(&config);
    let params = DensityParams::from(&config.plasma);

    let mut probes = factory.probes(1);
    let table = DensityTable::build(&mut probes, &params).unwrap();

    assert!(table.time().is_empty());
    assert_eq!(table.probe_count(), 6);
}

#[test]
fn test_shipped_tables_resolve_every_probe() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut config = DiagnosticsConfig::load_from(root.join(DEFAULT_CONFIG_PATH)).unwrap();
    for path in [
        &mut config.tables.position_file,
        &mut config.tables.mapping_file,
        &mut config.tables.deprecated_mapping_file,
    ] {
        *path = root.join(&*path);
    }

    let factory = ProbeFactory::from_config(&config);
    let mut probes = factory.probes(SHOT);
    assert_eq!(probes.len(), 50);
    for probe in &mut probes {
        assert!(probe.is_active().unwrap());
        let expected = ChannelId::Number(probe.number() + 14);
        assert_eq!(probe.channel().unwrap(), Some(expected));
    }

    let stats = factory.cache().lock().stats();
    assert_eq!(stats.position_loads, 1);
    assert_eq!(stats.mapping_loads, 1);
}
