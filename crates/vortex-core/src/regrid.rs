//! Reconciling staggered fields with the mass grid.
//!
//! Each call reconciles a single axis. Fields staggered along two axes (the
//! zonal wind against the vertical wind, for example) go through two calls,
//! one per axis, using [`regrid_to_len`].

use ndarray::{Axis, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};
use crate::field::{GridAxis, GridField};

/// How a staggered axis is brought onto the reference length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridPolicy {
    /// Drop the trailing staggered point. Source must be exactly one longer.
    Truncate,
    /// Output index `i` reads source index `min(i, len - 1)`. Any length.
    Clamp,
    /// Midpoint of each adjacent pair. Source must be exactly one longer.
    Average,
    /// Append the mean of the last two points. Source must be exactly one shorter.
    ExtendMean,
}

/// Align `staggered` to `reference` along `axis`.
///
/// Every other axis must already agree. The output takes the reference's
/// stagger flag for `axis`. Already-aligned input comes back unchanged, so
/// applying the same regrid twice is a no-op the second time.
pub fn regrid(
    reference: &GridField,
    staggered: &GridField,
    axis: GridAxis,
    policy: RegridPolicy,
) -> Result<GridField> {
    reference.check_shape_except(staggered, &[axis], "regrid")?;
    let target = reference.len_of(axis)?;
    regrid_to_len(staggered, axis, target, policy)?.with_stagger(axis, reference.is_staggered(axis)?)
}

/// Bring `field` to length `target` along `axis` under `policy`.
///
/// Stagger flags: `Truncate` and `Average` land on the mass grid (flag
/// cleared), `ExtendMean` lands on the staggered grid (flag set), `Clamp`
/// keeps the input flag.
pub fn regrid_to_len(
    field: &GridField,
    axis: GridAxis,
    target: usize,
    policy: RegridPolicy,
) -> Result<GridField> {
    let ax = field.axis_index(axis)?;
    let len = field.len_of(axis)?;
    if len == target {
        return Ok(field.clone());
    }

    let data = field.data();
    match policy {
        RegridPolicy::Truncate => {
            if len != target + 1 {
                return Err(mismatch(field, ax, target));
            }
            let out = data.slice_axis(Axis(ax), Slice::from(0..target)).to_owned();
            field.with_data(out)?.with_stagger(axis, false)
        }
        RegridPolicy::Clamp => {
            if len == 0 {
                return Err(mismatch(field, ax, target));
            }
            let indices: Vec<usize> = (0..target).map(|i| i.min(len - 1)).collect();
            field.with_data(data.select(Axis(ax), &indices))
        }
        RegridPolicy::Average => {
            if len != target + 1 {
                return Err(mismatch(field, ax, target));
            }
            let lower = data.slice_axis(Axis(ax), Slice::from(0..target));
            let upper = data.slice_axis(Axis(ax), Slice::from(1..len));
            field.with_data((&lower + &upper) * 0.5)?.with_stagger(axis, false)
        }
        RegridPolicy::ExtendMean => {
            if len == 0 || target != len + 1 {
                return Err(mismatch(field, ax, target));
            }
            let last = data.index_axis(Axis(ax), len - 1);
            let prev = data.index_axis(Axis(ax), len.saturating_sub(2));
            let extra = ((&last + &prev) * 0.5).insert_axis(Axis(ax));
            let out = ndarray::concatenate(Axis(ax), &[data.view(), extra.view()])
                .map_err(|e| FieldError::InvalidLayout(e.to_string()))?;
            field.with_data(out)?.with_stagger(axis, true)
        }
    }
}

fn mismatch(field: &GridField, ax: usize, target: usize) -> FieldError {
    let mut expected = field.shape().to_vec();
    expected[ax] = target;
    FieldError::ShapeMismatch {
        context: "regrid",
        expected,
        found: field.shape().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (level, west_east) field whose value encodes its west-east index.
    fn columns(levels: usize, cols: usize, staggered_x: bool) -> GridField {
        GridField::from_shape_fn(
            vec![GridAxis::Level, GridAxis::WestEast],
            vec![false, staggered_x],
            &[levels, cols],
            |ix| (10 * ix[0] + ix[1]) as f64,
        )
        .unwrap()
    }

    #[test]
    fn truncate_drops_trailing_staggered_point() {
        let mass = columns(2, 4, false);
        let u = columns(2, 5, true);
        let out = regrid(&mass, &u, GridAxis::WestEast, RegridPolicy::Truncate).unwrap();
        assert_eq!(out.shape(), &[2, 4]);
        assert_eq!(out.data()[[1, 3]], 13.0);
        assert!(!out.is_staggered(GridAxis::WestEast).unwrap());
    }

    #[test]
    fn truncate_is_idempotent() {
        let mass = columns(2, 4, false);
        let u = columns(2, 5, true);
        let once = regrid(&mass, &u, GridAxis::WestEast, RegridPolicy::Truncate).unwrap();
        let twice = regrid(&mass, &once, GridAxis::WestEast, RegridPolicy::Truncate).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn aligned_input_is_unchanged_under_every_policy() {
        let mass = columns(3, 4, false);
        for policy in [
            RegridPolicy::Truncate,
            RegridPolicy::Clamp,
            RegridPolicy::Average,
            RegridPolicy::ExtendMean,
        ] {
            let out = regrid(&mass, &mass, GridAxis::WestEast, policy).unwrap();
            assert_eq!(out, mass, "{policy:?} changed aligned input");
            let out = regrid_to_len(&mass, GridAxis::Level, 3, policy).unwrap();
            assert_eq!(out, mass, "{policy:?} changed input already at target length");
        }
    }

    #[test]
    fn truncate_rejects_two_point_difference() {
        let mass = columns(2, 4, false);
        let wide = columns(2, 6, true);
        let err = regrid(&mass, &wide, GridAxis::WestEast, RegridPolicy::Truncate).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn regrid_rejects_second_differing_axis() {
        let mass = columns(2, 4, false);
        let u = columns(3, 5, true);
        let err = regrid(&mass, &u, GridAxis::WestEast, RegridPolicy::Truncate).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn regrid_rejects_different_axis_labels() {
        let mass = columns(2, 4, false);
        let other = GridField::filled(
            vec![GridAxis::SouthNorth, GridAxis::WestEast],
            vec![false, true],
            &[2, 5],
            0.0,
        )
        .unwrap();
        let err = regrid(&mass, &other, GridAxis::WestEast, RegridPolicy::Truncate).unwrap_err();
        assert!(matches!(err, FieldError::AxisMismatch { .. }));
    }

    #[test]
    fn clamp_repeats_last_level_when_growing() {
        let u = columns(3, 2, false);
        let out = regrid_to_len(&u, GridAxis::Level, 5, RegridPolicy::Clamp).unwrap();
        assert_eq!(out.shape(), &[5, 2]);
        assert_eq!(out.data()[[2, 1]], 21.0);
        assert_eq!(out.data()[[3, 1]], 21.0);
        assert_eq!(out.data()[[4, 0]], 20.0);
    }

    #[test]
    fn clamp_truncates_when_shrinking() {
        let u = columns(5, 2, false);
        let out = regrid_to_len(&u, GridAxis::Level, 2, RegridPolicy::Clamp).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data()[[1, 1]], 11.0);
    }

    #[test]
    fn average_destaggers_to_midpoints() {
        let height = GridField::from_shape_vec(
            vec![GridAxis::Level],
            vec![true],
            &[4],
            vec![0.0, 100.0, 300.0, 600.0],
        )
        .unwrap();
        let out = regrid_to_len(&height, GridAxis::Level, 3, RegridPolicy::Average).unwrap();
        assert_eq!(out.data().as_slice().unwrap(), &[50.0, 200.0, 450.0]);
        assert!(!out.is_staggered(GridAxis::Level).unwrap());
    }

    #[test]
    fn extend_mean_appends_mean_of_last_two() {
        let theta = GridField::from_shape_vec(
            vec![GridAxis::Level],
            vec![false],
            &[3],
            vec![90.0, 92.0, 96.0],
        )
        .unwrap();
        let out = regrid_to_len(&theta, GridAxis::Level, 4, RegridPolicy::ExtendMean).unwrap();
        assert_eq!(out.data().as_slice().unwrap(), &[90.0, 92.0, 96.0, 94.0]);
        assert!(out.is_staggered(GridAxis::Level).unwrap());
    }

    #[test]
    fn extend_mean_rejects_wrong_target() {
        let theta = columns(3, 2, false);
        let err = regrid_to_len(&theta, GridAxis::Level, 5, RegridPolicy::ExtendMean).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn average_then_extend_restores_length() {
        let staggered = columns(6, 3, false);
        let mass = regrid_to_len(&staggered, GridAxis::Level, 5, RegridPolicy::Average).unwrap();
        let back = regrid_to_len(&mass, GridAxis::Level, 6, RegridPolicy::ExtendMean).unwrap();
        assert_eq!(back.shape(), staggered.shape());
    }
}
