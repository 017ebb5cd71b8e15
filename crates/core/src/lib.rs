//! CLASS Mixed-Layer Model Core Library
//!
//! A slab model of the daytime convective atmospheric boundary layer. The
//! mixed layer is described by its height and by well-mixed potential
//! temperature and specific humidity, capped by jumps in both. Surface fluxes
//! warm and moisten the layer, entrainment of free-tropospheric air deepens it,
//! and large-scale subsidence pushes it down.
//!
//! ## Layout
//!
//! - [`model`]: the forward-Euler integrator and its derived quantities
//! - [`config`]: JSON configuration with defaults and validation
//! - [`runner`] and [`output`]: fixed-cadence sampling and CSV/JSON export
//! - [`bmi`]: Basic Model Interface style adapter
//! - [`sweep`]: parameter sweeps run as parallel ensembles
//! - [`profiles`] and [`thermodynamics`]: vertical column reconstruction

pub mod bmi;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod profiles;
pub mod runner;
pub mod sweep;
pub mod thermodynamics;
pub mod variables;

// Re-export the model and its configuration
pub use config::{merge_configurations, prune_config, Config, InitialState, MixedLayer, TimeControl};
pub use error::{ClassError, ClassResult, DomainError};
pub use model::{Diagnostics, MixedLayerModel, ModelState, Tendencies};
pub use variables::{DiagnosticVariable, OutputVariable};

// Re-export the drivers
pub use bmi::{BmiClass, BmiLight, OUTPUT_VAR_NAMES};
pub use output::ClassOutput;
pub use profiles::{generate_profiles, ProfileSettings, VerticalProfile};
pub use runner::{drive, run_class, RunOptions, DEFAULT_OUTPUT_FREQUENCY};
pub use sweep::{perform_sweep, run_ensemble, EnsembleMember, Sweep};
