//! First derivatives along a named axis.
//!
//! Interior points use centered differences, the first and last point use
//! one-sided differences over their nearest neighbour:
//!
//!   d[0]   = (f[1]   − f[0])   / span(0, 1)
//!   d[i]   = (f[i+1] − f[i−1]) / span(i−1, i+1)
//!   d[n−1] = (f[n−1] − f[n−2]) / span(n−2, n−1)
//!
//! `span(lo, hi)` is the physical distance between the two stencil points:
//! `(hi − lo)·dx` for uniform spacing, `z[hi] − z[lo]` for a coordinate
//! field, or the summed layer thicknesses between them.
//!
//! Where the per-step spacing `span / (hi − lo)` has magnitude below
//! [`SPACING_EPSILON`], the derivative is exactly `0.0`.

use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use tracing::warn;

use crate::error::{FieldError, Result};
use crate::field::{GridAxis, GridField};

/// Spacings with smaller magnitude are treated as degenerate.
pub const SPACING_EPSILON: f64 = 1e-10;

/// Grid spacing along the differentiated axis.
#[derive(Debug, Clone, Copy)]
pub enum Spacing<'a> {
    /// Constant distance between neighbouring points.
    Uniform(f64),
    /// Physical coordinate of every point, same shape as the source field.
    Coordinate(&'a GridField),
    /// Distance between consecutive points; one fewer point than the source
    /// along the differentiated axis.
    Thickness(&'a GridField),
}

/// Stencil denominator for one slab of the output.
enum Span<'a> {
    Scalar(f64),
    Slab(ArrayD<f64>),
    View(ArrayViewD<'a, f64>),
}

/// Differentiate `field` along `axis`.
///
/// The output has the source's shape, axes and stagger flags. Axes of
/// length 1 produce zeros. No unit conversion happens here: `spacing` must
/// already be in the units the caller wants the derivative in.
pub fn differentiate(field: &GridField, axis: GridAxis, spacing: Spacing<'_>) -> Result<GridField> {
    let ax = field.axis_index(axis)?;
    let n = field.shape()[ax];
    validate_spacing(field, axis, ax, n, &spacing)?;

    let mut out = ArrayD::<f64>::zeros(field.shape());
    if n < 2 {
        return field.with_data(out);
    }

    let src = field.data();
    let mut degenerate = 0usize;

    for i in 0..n {
        let (lo, hi) = stencil(i, n);
        let steps = (hi - lo) as f64;
        let span = match spacing {
            Spacing::Uniform(dx) => Span::Scalar(dx * steps),
            Spacing::Coordinate(z) => {
                let z = z.data();
                Span::Slab(&z.index_axis(Axis(ax), hi) - &z.index_axis(Axis(ax), lo))
            }
            Spacing::Thickness(d) => {
                let d = d.data();
                if hi - lo == 1 {
                    Span::View(d.index_axis(Axis(ax), lo))
                } else {
                    Span::Slab(&d.index_axis(Axis(ax), lo) + &d.index_axis(Axis(ax), lo + 1))
                }
            }
        };

        let upper = src.index_axis(Axis(ax), hi);
        let lower = src.index_axis(Axis(ax), lo);
        let target = out.index_axis_mut(Axis(ax), i);

        match span {
            Span::Scalar(s) => {
                if (s / steps).abs() < SPACING_EPSILON {
                    // Every cell of the slab is degenerate; target stays zero.
                    degenerate += target.len();
                } else {
                    Zip::from(target)
                        .and(&upper)
                        .and(&lower)
                        .for_each(|o, &a, &b| *o = (a - b) / s);
                }
            }
            Span::Slab(s) => {
                degenerate += difference_slab(target, &upper, &lower, s.view(), steps);
            }
            Span::View(s) => {
                degenerate += difference_slab(target, &upper, &lower, s, steps);
            }
        }
    }

    if degenerate > 0 {
        warn!(
            axis = ?axis,
            cells = degenerate,
            "degenerate grid spacing, derivative forced to zero"
        );
    }

    field.with_data(out)
}

/// Centered stencil in the interior, one-sided at either end.
fn stencil(i: usize, n: usize) -> (usize, usize) {
    if i == 0 {
        (0, 1)
    } else if i == n - 1 {
        (n - 2, n - 1)
    } else {
        (i - 1, i + 1)
    }
}

/// Fill one output slab, returning how many cells had degenerate spacing.
fn difference_slab(
    target: ndarray::ArrayViewMutD<'_, f64>,
    upper: &ArrayViewD<'_, f64>,
    lower: &ArrayViewD<'_, f64>,
    span: ArrayViewD<'_, f64>,
    steps: f64,
) -> usize {
    let mut degenerate = 0usize;
    Zip::from(target)
        .and(upper)
        .and(lower)
        .and(&span)
        .for_each(|o, &a, &b, &s| {
            if (s / steps).abs() < SPACING_EPSILON {
                *o = 0.0;
                degenerate += 1;
            } else {
                *o = (a - b) / s;
            }
        });
    degenerate
}

fn validate_spacing(
    field: &GridField,
    axis: GridAxis,
    ax: usize,
    n: usize,
    spacing: &Spacing<'_>,
) -> Result<()> {
    match *spacing {
        Spacing::Uniform(dx) => {
            if !dx.is_finite() || dx < 0.0 {
                return Err(FieldError::InvalidSpacing(dx));
            }
        }
        Spacing::Coordinate(z) => {
            field.check_layout(z, "coordinate spacing")?;
        }
        Spacing::Thickness(d) => {
            field.check_shape_except(d, &[axis], "thickness spacing")?;
            let expected = n.saturating_sub(1);
            if d.shape()[ax] != expected {
                let mut shape = field.shape().to_vec();
                shape[ax] = expected;
                return Err(FieldError::ShapeMismatch {
                    context: "thickness spacing",
                    expected: shape,
                    found: d.shape().to_vec(),
                });
            }
        }
    }
    Ok(())
}
