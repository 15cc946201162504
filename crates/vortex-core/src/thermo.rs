//! Height, pressure and temperature from raw simulation variables.
//!
//!   z = (PH + PHB) / g
//!   p = P + PB
//!   T = (θ' + T0) · (p / p0)^(Rd / cp)

use crate::config::{positive, PlanetConstants};
use crate::error::{FieldError, Result};
use crate::field::{GridAxis, GridField};
use crate::regrid::{regrid_to_len, RegridPolicy};

/// Geometric height from perturbation and base geopotential.
pub fn geometric_height(ph: &GridField, phb: &GridField, gravity: f64) -> Result<GridField> {
    positive("gravity", gravity)?;
    ph.zip_with(phb, "geometric height", |a, b| (a + b) / gravity)
}

pub fn total_pressure(p: &GridField, pb: &GridField) -> Result<GridField> {
    p.zip_with(pb, "total pressure", |a, b| a + b)
}

/// Full potential temperature from its perturbation.
pub fn potential_temperature(theta_perturbation: &GridField, base: f64) -> GridField {
    theta_perturbation.map(|t| t + base)
}

/// Actual temperature in kelvin. `pressure` is total pressure in Pa.
pub fn actual_temperature(
    theta_perturbation: &GridField,
    pressure: &GridField,
    constants: &PlanetConstants,
) -> Result<GridField> {
    constants.validate()?;
    let t0 = constants.reference_temperature;
    let p0 = constants.reference_pressure;
    let kappa = constants.kappa();
    theta_perturbation.zip_with(pressure, "actual temperature", |t, p| {
        (t + t0) * (p / p0).powf(kappa)
    })
}

/// Height of the mass levels: midpoints of the staggered level heights.
pub fn mass_level_height(height: &GridField) -> Result<GridField> {
    let n = height.len_of(GridAxis::Level)?;
    let target = n.checked_sub(1).ok_or_else(|| {
        FieldError::InvalidLayout("height field has no levels to de-stagger".into())
    })?;
    regrid_to_len(height, GridAxis::Level, target, RegridPolicy::Average)
}
