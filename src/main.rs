//! CLI Entry Point for north-diag
//!
//! Provides command-line access to the probe data of a shot:
//! - `status`: activity, channel and radius of every probe
//! - `density`: ion-saturation density of every probe, written as a `;`-separated table
//! - `machine`: machine sensor series of the shot, in the same table format
//!
//! # Usage
//!
//! ```bash
//! north-diag status --shot 9774
//! north-diag --data-dir ./Data density --shot 9774 --output probe_data9774.txt
//! north-diag machine --shot 9774 --output machine_data9774.txt
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use north_diagnostics::analysis::{DensityParams, DensityTable};
use north_diagnostics::config::{DiagnosticsConfig, DEFAULT_CONFIG_PATH};
use north_diagnostics::machine::{load_machine_data, write_machine_table};
use north_diagnostics::{logging, CachingMode, Diagnostic, ProbeFactory};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "north-diag")]
#[command(about = "Langmuir-probe data extraction for NORTH shots", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory holding the acquisition files (overrides the configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load tables and data separately for every probe
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show activity, channel and radius of every probe
    Status {
        /// Shot number
        #[arg(long)]
        shot: u32,
    },

    /// Compute the ion-saturation density of every probe
    Density {
        /// Shot number
        #[arg(long)]
        shot: u32,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Export the machine sensor series of a shot
    Machine {
        /// Shot number
        #[arg(long)]
        shot: u32,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DiagnosticsConfig::load_from(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.acquisition.data_dir = dir;
    }
    logging::init_from_config(&config)?;

    let caching = if cli.no_cache {
        CachingMode::Disabled
    } else {
        CachingMode::Shared
    };
    let factory = ProbeFactory::from_config(&config).with_caching(caching);

    match cli.command {
        Commands::Status { shot } => print_status(&factory, shot),
        Commands::Density { shot, output } => write_density(&factory, &config, shot, output),
        Commands::Machine { shot, output } => write_machine(&config, shot, output),
    }
}

fn print_status(factory: &ProbeFactory, shot: u32) -> Result<()> {
    println!("Shot #{shot}");
    for mut probe in factory.probes(shot) {
        let status = probe.status()?;
        let channel = probe
            .channel()?
            .map_or_else(|| "-".to_string(), |ch| ch.to_string());
        let radius = probe
            .position()?
            .map_or_else(|| "-".to_string(), |pos| format!("{:.4}", pos.r));
        println!(
            "{:>4}  ch {:>4}  r {:>8}  {}",
            probe.number(),
            channel,
            radius,
            status
        );
    }

    let stats = factory.cache().lock().stats();
    info!(
        shot,
        position_loads = stats.position_loads,
        mapping_loads = stats.mapping_loads,
        "Status complete"
    );
    Ok(())
}

fn write_density(
    factory: &ProbeFactory,
    config: &DiagnosticsConfig,
    shot: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut probes = factory.probes(shot);
    let params = DensityParams::from(&config.plasma);
    let table = DensityTable::build(&mut probes, &params)?;

    match output {
        Some(path) => {
            let file = File::create(&path)?;
            table.write_delimited(BufWriter::new(file))?;
            info!(
                shot,
                rows = table.time().len(),
                probes = table.probe_count(),
                path = %path.display(),
                "Density table written"
            );
        }
        None => table.write_delimited(io::stdout().lock())?,
    }

    let stats = factory.cache().lock().stats();
    info!(shot, bulk_loads = stats.bulk_loads, "Density complete");
    Ok(())
}

fn write_machine(config: &DiagnosticsConfig, shot: u32, output: Option<PathBuf>) -> Result<()> {
    let Some(data) = load_machine_data(&config.acquisition, shot)? else {
        anyhow::bail!("No machine data for shot {shot}");
    };

    match output {
        Some(path) => {
            let file = File::create(&path)?;
            write_machine_table(&data, BufWriter::new(file))?;
            info!(shot, rows = data.len(), path = %path.display(), "Machine table written");
        }
        None => write_machine_table(&data, io::stdout().lock())?,
    }
    Ok(())
}
