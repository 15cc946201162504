//! End-to-end derivations over a bundle of raw simulation fields.
//!
//! Vorticity:   PH, PHB → height → ζ(U, W) → sanitize → classify → bands
//! Temperature: P, PB → pressure;  T, pressure → actual temperature;
//!              PH, PHB → height → mass-level height

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::classify::{classify, contour_bands, BandCounts, BandField, TurbulenceMask};
use crate::config::{PipelineConfig, PlanetConstants};
use crate::error::Result;
use crate::field::GridField;
use crate::profile::{value_range, ValueRange};
use crate::sanitize::{sanitize, ClipBounds, SanitizedField};
use crate::thermo::{
    actual_temperature, geometric_height, mass_level_height, potential_temperature,
    total_pressure,
};

// ── Vorticity ─────────────────────────────────────────────────────────────────

/// Raw inputs of the vorticity derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmosphereFields {
    /// Zonal wind, staggered along west-east.
    pub u: GridField,
    /// Vertical wind, staggered along level.
    pub w: GridField,
    /// Perturbation geopotential, staggered along level.
    pub ph: GridField,
    /// Base geopotential, staggered along level.
    pub phb: GridField,
    /// West-east grid spacing in metres.
    pub dx: f64,
}

/// Every intermediate of one vorticity run.
#[derive(Debug, Clone)]
pub struct VorticityReport {
    pub height: GridField,
    pub vorticity: GridField,
    pub sanitized: SanitizedField,
    pub mask: TurbulenceMask,
    pub threshold: f64,
    pub bands: BandField,
}

/// Serializable digest of a [`VorticityReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VorticitySummary {
    pub shape: Vec<usize>,
    pub raw_range: ValueRange,
    pub clip_bounds: Option<ClipBounds>,
    pub threshold: f64,
    pub turbulent_cells: usize,
    pub turbulent_fraction: f64,
    pub bands: BandCounts,
}

impl VorticityReport {
    pub fn summary(&self) -> VorticitySummary {
        VorticitySummary {
            shape: self.vorticity.shape().to_vec(),
            raw_range: value_range(&self.vorticity),
            clip_bounds: self.sanitized.bounds(),
            threshold: self.threshold,
            turbulent_cells: self.mask.count(),
            turbulent_fraction: self.mask.fraction(),
            bands: self.bands.counts(),
        }
    }
}

pub struct VorticityPipeline {
    config: PipelineConfig,
}

impl VorticityPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(shape = ?fields.w.shape()))]
    pub fn run(&self, fields: &AtmosphereFields) -> Result<VorticityReport> {
        self.config.validate()?;

        let height = geometric_height(&fields.ph, &fields.phb, self.config.constants.gravity)?;
        let vorticity = vorticity(&fields.u, &fields.w, fields.dx, &height)?;

        let sanitized = sanitize(&vorticity, &self.config.sanitize)?;
        let (mask, threshold) = classify(&sanitized, &self.config.threshold)?;
        let bands = contour_bands(sanitized.field(), &self.config.contour_levels);

        info!(
            threshold,
            turbulent = mask.count(),
            fraction = mask.fraction(),
            "vorticity pipeline complete"
        );

        Ok(VorticityReport {
            height,
            vorticity,
            sanitized,
            mask,
            threshold,
            bands,
        })
    }
}

#[cfg(feature = "threading")]
fn vorticity(u: &GridField, w: &GridField, dx: f64, height: &GridField) -> Result<GridField> {
    crate::vorticity::compute_vorticity_parallel(u, w, dx, height)
}

#[cfg(not(feature = "threading"))]
fn vorticity(u: &GridField, w: &GridField, dx: f64, height: &GridField) -> Result<GridField> {
    crate::vorticity::compute_vorticity(u, w, dx, height)
}

// ── Temperature ───────────────────────────────────────────────────────────────

/// Raw inputs of the temperature derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureFields {
    /// Potential-temperature perturbation.
    pub t: GridField,
    /// Perturbation pressure.
    pub p: GridField,
    /// Base pressure.
    pub pb: GridField,
    pub ph: GridField,
    pub phb: GridField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReport {
    pub temperature: GridField,
    pub potential_temperature: GridField,
    pub pressure: GridField,
    /// Geometric height of the mass levels.
    pub height: GridField,
}

#[instrument(skip_all, fields(shape = ?fields.t.shape()))]
pub fn derive_temperature(
    fields: &TemperatureFields,
    constants: &PlanetConstants,
) -> Result<TemperatureReport> {
    constants.validate()?;

    let pressure = total_pressure(&fields.p, &fields.pb)?;
    let temperature = actual_temperature(&fields.t, &pressure, constants)?;
    let staggered = geometric_height(&fields.ph, &fields.phb, constants.gravity)?;
    let height = mass_level_height(&staggered)?;
    fields.t.check_layout(&height, "temperature: mass-level height")?;

    let range = value_range(&temperature);
    info!(min = ?range.min, max = ?range.max, "temperature derived");

    Ok(TemperatureReport {
        potential_temperature: potential_temperature(&fields.t, constants.base_potential_temperature),
        temperature,
        pressure,
        height,
    })
}
