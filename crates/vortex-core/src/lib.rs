//! Vorticity and temperature derivation on staggered simulation grids.
//!
//! Raw fields come in on their native staggered grids, get reconciled with
//! the mass grid, differentiated, combined, cleaned of outliers and finally
//! classified into turbulence zones and contour bands.

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod field;
pub mod pipeline;
pub mod profile;
pub mod regrid;
pub mod sanitize;
pub mod stats;
pub mod thermo;
pub mod vorticity;

pub use classify::{classify, contour_bands, Band, BandField, ContourLevels, ThresholdMode, TurbulenceMask};
pub use config::{PipelineConfig, PlanetConstants};
pub use diff::{differentiate, Spacing};
pub use error::{FieldError, Result};
pub use field::{GridAxis, GridField};
pub use pipeline::{
    derive_temperature, AtmosphereFields, TemperatureFields, TemperatureReport, VorticityPipeline,
    VorticityReport, VorticitySummary,
};
pub use regrid::{regrid, regrid_to_len, RegridPolicy};
pub use sanitize::{sanitize, SanitizeOptions, SanitizedField};
pub use thermo::{actual_temperature, geometric_height, potential_temperature, total_pressure};
pub use vorticity::compute_vorticity;
#[cfg(feature = "threading")]
pub use vorticity::compute_vorticity_parallel;
