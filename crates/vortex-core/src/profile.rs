//! NaN-aware reductions for diagnostics.
//!
//! Means skip non-finite values; a slice without finite values reduces to
//! NaN rather than zero.

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};
use crate::field::{GridAxis, GridField};
use crate::stats::Distribution;

/// Finite fraction a time step must exceed to count as valid.
pub const VALID_STEP_FRACTION: f64 = 0.5;

/// Percentiles reported by [`percentile_summary`] when none are requested.
pub const DEFAULT_PERCENTILES: [f64; 9] = [1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

fn nan_mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Mean of every slab along `axis`.
fn mean_along(field: &GridField, axis: GridAxis) -> Result<Vec<f64>> {
    let ax = field.axis_index(axis)?;
    Ok(field
        .data()
        .axis_iter(Axis(ax))
        .map(|slab| nan_mean(slab.iter().copied()))
        .collect())
}

/// Mean per level over every other axis.
pub fn level_profile(field: &GridField) -> Result<Vec<f64>> {
    mean_along(field, GridAxis::Level)
}

/// Mean per time step over every other axis.
pub fn time_series(field: &GridField) -> Result<Vec<f64>> {
    mean_along(field, GridAxis::Time)
}

/// Level × west-east slice at time step `t`, averaged over south-north.
pub fn cross_section(field: &GridField, t: usize) -> Result<GridField> {
    let step = field.select_index(GridAxis::Time, t)?;
    let t_ax = step.axis_index(GridAxis::Time)?;
    let sn_ax = step.axis_index(GridAxis::SouthNorth)?;

    let slab = step.data().index_axis(Axis(t_ax), 0);
    // Index of south-north once time is gone.
    let sn = if sn_ax > t_ax { sn_ax - 1 } else { sn_ax };
    let data = slab.map_axis(Axis(sn), |lane| nan_mean(lane.iter().copied()));

    let keep = |i: &usize| *i != t_ax && *i != sn_ax;
    let axes = (0..step.axes().len())
        .filter(keep)
        .map(|i| step.axes()[i])
        .collect();
    let stagger = (0..step.stagger().len())
        .filter(keep)
        .map(|i| step.stagger()[i])
        .collect();
    GridField::new(data, axes, stagger)
}

/// Fraction of finite cells per time step. Empty steps count as 0.
pub fn valid_fraction(field: &GridField) -> Result<Vec<f64>> {
    let ax = field.axis_index(GridAxis::Time)?;
    Ok(field
        .data()
        .axis_iter(Axis(ax))
        .map(|slab| {
            if slab.is_empty() {
                0.0
            } else {
                slab.iter().filter(|v| v.is_finite()).count() as f64 / slab.len() as f64
            }
        })
        .collect())
}

/// Time steps whose finite fraction is strictly above `min_fraction`.
pub fn valid_time_steps(field: &GridField, min_fraction: f64) -> Result<Vec<usize>> {
    Ok(valid_fraction(field)?
        .into_iter()
        .enumerate()
        .filter(|&(_, f)| f > min_fraction)
        .map(|(t, _)| t)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentilePoint {
    pub percentile: f64,
    pub value: f64,
}

/// Selected percentiles of the finite values of `field`.
pub fn percentile_summary(field: &GridField, percentiles: &[f64]) -> Result<Vec<PercentilePoint>> {
    let dist = Distribution::from_values(field.values());
    percentiles
        .iter()
        .map(|&p| {
            Ok(PercentilePoint {
                percentile: p,
                value: dist.percentile(p)?,
            })
        })
        .collect()
}

/// Colour-scale range: 5th to 95th percentile of the finite values.
pub fn display_range(field: &GridField) -> Result<(f64, f64)> {
    let dist = Distribution::from_values(field.values());
    Ok((dist.percentile(5.0)?, dist.percentile(95.0)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// `None` when the field has no finite values.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub nan_count: usize,
}

pub fn value_range(field: &GridField) -> ValueRange {
    let mut range = ValueRange { min: None, max: None, nan_count: 0 };
    for v in field.values() {
        if v.is_nan() {
            range.nan_count += 1;
        } else if v.is_finite() {
            range.min = Some(range.min.map_or(v, |m| m.min(v)));
            range.max = Some(range.max.map_or(v, |m| m.max(v)));
        }
    }
    range
}

/// Mean of the finite values, or `EmptyDistribution`.
pub fn finite_mean(field: &GridField) -> Result<f64> {
    let mean = nan_mean(field.values());
    if mean.is_nan() {
        return Err(FieldError::EmptyDistribution);
    }
    Ok(mean)
}
