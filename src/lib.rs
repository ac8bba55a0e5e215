//! # NORTH Diagnostics Library
//!
//! Resolves Langmuir-probe metadata for a shot of the NORTH tokamak and extracts the
//! calibrated time, bias-voltage and current series of every probe.
//!
//! ## Crate Structure
//!
//! - **`probe`**: the [`Probe`] entity and the [`ProbeFactory`] that creates the probes of a
//!   shot around a shared cache.
//! - **`cache`**: [`ShotCache`], loading position tables, mapping tables and bulk
//!   acquisition data once per shot.
//! - **`tables`**: the JSON position and channel-mapping tables.
//! - **`diagnostic`**: identity and time-window helpers common to all diagnostics.
//! - **`analysis`**: ion-saturation density estimates and the per-shot density table.
//! - **`machine`**: the machine sensor series logged next to the probe data.
//! - **`config`**: layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing-subscriber` setup for binaries.
//! - **`error`**: the [`DiagError`] type.
//!
//! Acquisition files are decoded by the `ddaq-reader` crate, re-exported as [`reader`].
//!
//! ## Example
//!
//! ```no_run
//! use north_diagnostics::{Diagnostic, DiagnosticsConfig, ProbeFactory};
//!
//! # fn main() -> Result<(), north_diagnostics::DiagError> {
//! let config = DiagnosticsConfig::load()?;
//! let factory = ProbeFactory::from_config(&config);
//!
//! for mut probe in factory.probes(9774) {
//!     println!("{}", probe.status()?);
//!     if let Some(current) = probe.current()? {
//!         println!("probe {}: {} samples", probe.number(), current.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logging;
pub mod machine;
pub mod probe;
pub mod tables;

pub use ddaq_reader as reader;

pub use cache::{CacheStats, SharedCache, ShotCache, ShotData};
pub use config::DiagnosticsConfig;
pub use diagnostic::{nearest_index, Diagnostic, DiagnosticInfo};
pub use error::{DiagError, DiagResult};
pub use probe::{CachingMode, Probe, ProbeFactory, ProbeSamples, PROBE_KIND, TOTAL_PROBES};
pub use tables::{MappingVariant, Position, PositionResolution};
