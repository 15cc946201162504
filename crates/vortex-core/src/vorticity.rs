//! Relative vorticity in the west-east / vertical plane.
//!
//!   ζ = ∂w/∂x − ∂u/∂z
//!
//! `w` lives on the vertically staggered grid, `u` on the horizontally
//! staggered grid, so `u` is first truncated onto `w`'s west-east points and
//! then clamped onto `w`'s levels. The vertical derivative uses geometric
//! height (same levels as `w`) as its coordinate, so uneven level spacing is
//! handled exactly.

use ndarray::{ArrayD, Axis, Slice};
use tracing::debug;

use crate::diff::{differentiate, Spacing};
use crate::error::Result;
use crate::field::{GridAxis, GridField};
use crate::regrid::{regrid_to_len, RegridPolicy};

/// Compute `∂w/∂x − ∂u/∂z` on `w`'s grid.
///
/// `u` may be one point longer than `w` along west-east and may differ from
/// `w` in level count; every other axis must agree. `height` must agree with
/// `w` on every axis except level. When `height` and `w` disagree in level
/// count, only the common levels get a vertical derivative and the rest are
/// zero.
pub fn compute_vorticity(
    u: &GridField,
    w: &GridField,
    dx: f64,
    height: &GridField,
) -> Result<GridField> {
    w.check_shape_except(u, &[GridAxis::Level, GridAxis::WestEast], "vorticity: u against w")?;
    w.check_shape_except(height, &[GridAxis::Level], "vorticity: height against w")?;

    let nx = w.len_of(GridAxis::WestEast)?;
    let nz = w.len_of(GridAxis::Level)?;

    let u_x = regrid_to_len(u, GridAxis::WestEast, nx, RegridPolicy::Truncate)?;
    let u_aligned = regrid_to_len(&u_x, GridAxis::Level, nz, RegridPolicy::Clamp)?;

    let dw_dx = differentiate(w, GridAxis::WestEast, Spacing::Uniform(dx))?;
    let du_dz = vertical_derivative(&u_aligned, height)?;

    dw_dx.zip_with(&du_dz, "vorticity", |a, b| a - b)
}

/// `∂u/∂z` over the levels `u` and `height` have in common.
fn vertical_derivative(u: &GridField, height: &GridField) -> Result<GridField> {
    let nz = u.len_of(GridAxis::Level)?;
    let nh = height.len_of(GridAxis::Level)?;
    if nz == nh {
        return differentiate(u, GridAxis::Level, Spacing::Coordinate(height));
    }

    let common = nz.min(nh);
    debug!(levels = nz, height_levels = nh, common, "vertical extents differ, clamping");

    let u_c = regrid_to_len(u, GridAxis::Level, common, RegridPolicy::Clamp)?;
    let h_c = regrid_to_len(height, GridAxis::Level, common, RegridPolicy::Clamp)?;
    let partial = differentiate(&u_c, GridAxis::Level, Spacing::Coordinate(&h_c))?;

    let ax = u.axis_index(GridAxis::Level)?;
    let mut out = ArrayD::<f64>::zeros(u.shape());
    out.slice_axis_mut(Axis(ax), Slice::from(0..common))
        .assign(partial.data());
    u.with_data(out)
}

/// [`compute_vorticity`] with one rayon task per time step.
///
/// Every step is independent, so the result is identical to the serial
/// computation. Fields without a time axis take the serial path.
#[cfg(feature = "threading")]
pub fn compute_vorticity_parallel(
    u: &GridField,
    w: &GridField,
    dx: f64,
    height: &GridField,
) -> Result<GridField> {
    use crate::error::FieldError;
    use rayon::prelude::*;

    w.check_shape_except(u, &[GridAxis::Level, GridAxis::WestEast], "vorticity: u against w")?;
    w.check_shape_except(height, &[GridAxis::Level], "vorticity: height against w")?;
    match w.len_of(GridAxis::Time) {
        Ok(0) | Err(FieldError::MissingAxis(_)) => return compute_vorticity(u, w, dx, height),
        Ok(_) => {}
        Err(e) => return Err(e),
    }

    let u_steps = u.split_along(GridAxis::Time)?;
    let w_steps = w.split_along(GridAxis::Time)?;
    let h_steps = height.split_along(GridAxis::Time)?;

    let steps = w_steps
        .par_iter()
        .zip(u_steps.par_iter())
        .zip(h_steps.par_iter())
        .map(|((w, u), h)| compute_vorticity(u, w, dx, h))
        .collect::<Result<Vec<_>>>()?;

    GridField::concatenate(GridAxis::Time, &steps)
}
