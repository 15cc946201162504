//! Labeled n-dimensional grid fields.
//!
//! A `GridField` is an `f64` array whose axes carry a physical name and a
//! stagger flag. Staggered axes sit half a cell off the mass grid and have
//! one more point than the mass-grid axis of the same name.

use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Slice, Zip};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FieldError, Result};

/// Physical axis of a simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAxis {
    Time,
    Level,
    SouthNorth,
    WestEast,
}

impl GridAxis {
    /// Axis order of raw simulation output: time, level, south-north, west-east.
    pub const STANDARD: [GridAxis; 4] = [
        GridAxis::Time,
        GridAxis::Level,
        GridAxis::SouthNorth,
        GridAxis::WestEast,
    ];

    /// Map a simulation dimension name to an axis and its stagger flag.
    ///
    /// `bottom_top_stag` → `(Level, true)`, `west_east` → `(WestEast, false)`.
    pub fn from_dim_name(name: &str) -> Option<(GridAxis, bool)> {
        let parsed = match name {
            "Time" | "time" => (GridAxis::Time, false),
            "bottom_top" => (GridAxis::Level, false),
            "bottom_top_stag" => (GridAxis::Level, true),
            "south_north" => (GridAxis::SouthNorth, false),
            "south_north_stag" => (GridAxis::SouthNorth, true),
            "west_east" => (GridAxis::WestEast, false),
            "west_east_stag" => (GridAxis::WestEast, true),
            _ => return None,
        };
        Some(parsed)
    }
}

/// Immutable labeled array of `f64` values.
///
/// Invariants, checked on construction:
///   - one axis label and one stagger flag per array dimension
///   - axis labels are distinct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldRepr", into = "FieldRepr")]
pub struct GridField {
    data: ArrayD<f64>,
    axes: Vec<GridAxis>,
    stagger: Vec<bool>,
}

impl GridField {
    pub fn new(data: ArrayD<f64>, axes: Vec<GridAxis>, stagger: Vec<bool>) -> Result<Self> {
        validate_labels(data.ndim(), &axes, &stagger)?;
        Ok(Self { data, axes, stagger })
    }

    /// Build a field from row-major values.
    pub fn from_shape_vec(
        axes: Vec<GridAxis>,
        stagger: Vec<bool>,
        shape: &[usize],
        values: Vec<f64>,
    ) -> Result<Self> {
        let cells: usize = shape.iter().product();
        if values.len() != cells {
            return Err(FieldError::InvalidLayout(format!(
                "{} values for shape {:?} ({} cells)",
                values.len(),
                shape,
                cells
            )));
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| FieldError::InvalidLayout(e.to_string()))?;
        Self::new(data, axes, stagger)
    }

    /// Build a field by evaluating `f` at every multi-index.
    pub fn from_shape_fn<F>(
        axes: Vec<GridAxis>,
        stagger: Vec<bool>,
        shape: &[usize],
        mut f: F,
    ) -> Result<Self>
    where
        F: FnMut(&[usize]) -> f64,
    {
        let data = ArrayD::from_shape_fn(IxDyn(shape), |ix: IxDyn| f(ix.slice()));
        Self::new(data, axes, stagger)
    }

    pub fn filled(
        axes: Vec<GridAxis>,
        stagger: Vec<bool>,
        shape: &[usize],
        value: f64,
    ) -> Result<Self> {
        Self::new(ArrayD::from_elem(IxDyn(shape), value), axes, stagger)
    }

    /// Field laid out in [`GridAxis::STANDARD`] order.
    pub fn standard(shape: [usize; 4], stagger: [bool; 4], values: Vec<f64>) -> Result<Self> {
        Self::from_shape_vec(GridAxis::STANDARD.to_vec(), stagger.to_vec(), &shape, values)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn view(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn stagger(&self) -> &[bool] {
        &self.stagger
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Array dimension index of `axis`.
    pub fn axis_index(&self, axis: GridAxis) -> Result<usize> {
        self.axes
            .iter()
            .position(|&a| a == axis)
            .ok_or(FieldError::MissingAxis(axis))
    }

    pub fn len_of(&self, axis: GridAxis) -> Result<usize> {
        Ok(self.data.len_of(Axis(self.axis_index(axis)?)))
    }

    pub fn is_staggered(&self, axis: GridAxis) -> Result<bool> {
        Ok(self.stagger[self.axis_index(axis)?])
    }

    // ── Layout checks ────────────────────────────────────────────────────────

    /// Fail unless `other` carries the same axis labels in the same order.
    pub fn check_axes(&self, other: &GridField) -> Result<()> {
        if self.axes != other.axes {
            return Err(FieldError::AxisMismatch {
                expected: self.axes.clone(),
                found: other.axes.clone(),
            });
        }
        Ok(())
    }

    /// Fail unless `other` has the same axes and shape.
    pub fn check_layout(&self, other: &GridField, context: &'static str) -> Result<()> {
        self.check_axes(other)?;
        if self.shape() != other.shape() {
            return Err(FieldError::ShapeMismatch {
                context,
                expected: self.shape().to_vec(),
                found: other.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Fail unless `other` matches on every axis except those in `skip`.
    pub fn check_shape_except(
        &self,
        other: &GridField,
        skip: &[GridAxis],
        context: &'static str,
    ) -> Result<()> {
        self.check_axes(other)?;
        let differs = self
            .axes
            .iter()
            .zip(self.shape().iter().zip(other.shape()))
            .any(|(axis, (a, b))| !skip.contains(axis) && a != b);
        if differs {
            return Err(FieldError::ShapeMismatch {
                context,
                expected: self.shape().to_vec(),
                found: other.shape().to_vec(),
            });
        }
        Ok(())
    }

    // ── Transforms ───────────────────────────────────────────────────────────

    /// Same labels, new values. `data` must have the same dimensionality.
    pub fn with_data(&self, data: ArrayD<f64>) -> Result<Self> {
        Self::new(data, self.axes.clone(), self.stagger.clone())
    }

    /// Same values, stagger flag of `axis` replaced.
    pub fn with_stagger(mut self, axis: GridAxis, staggered: bool) -> Result<Self> {
        let ax = self.axis_index(axis)?;
        self.stagger[ax] = staggered;
        Ok(self)
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.mapv(f),
            axes: self.axes.clone(),
            stagger: self.stagger.clone(),
        }
    }

    /// Elementwise combination of two fields with identical layout.
    pub fn zip_with<F>(&self, other: &GridField, context: &'static str, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.check_layout(other, context)?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));
        Ok(Self {
            data,
            axes: self.axes.clone(),
            stagger: self.stagger.clone(),
        })
    }

    /// Keep only index `index` along `axis`; the axis stays with length 1.
    pub fn select_index(&self, axis: GridAxis, index: usize) -> Result<Self> {
        let ax = self.axis_index(axis)?;
        let len = self.data.len_of(Axis(ax));
        if index >= len {
            return Err(FieldError::IndexOutOfRange { axis, index, len });
        }
        let data = self
            .data
            .slice_axis(Axis(ax), Slice::from(index..index + 1))
            .to_owned();
        self.with_data(data)
    }

    /// Split into unit-length pieces along `axis`.
    pub fn split_along(&self, axis: GridAxis) -> Result<Vec<Self>> {
        let len = self.len_of(axis)?;
        (0..len).map(|i| self.select_index(axis, i)).collect()
    }

    /// Join pieces along `axis`. All pieces must share labels and agree on
    /// every other axis.
    pub fn concatenate(axis: GridAxis, parts: &[GridField]) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| FieldError::InvalidLayout("nothing to concatenate".into()))?;
        let ax = first.axis_index(axis)?;
        for part in &parts[1..] {
            first.check_shape_except(part, &[axis], "concatenate")?;
            if part.stagger != first.stagger {
                return Err(FieldError::InvalidLayout(
                    "stagger flags differ between pieces".into(),
                ));
            }
        }
        let views: Vec<ArrayViewD<'_, f64>> = parts.iter().map(|p| p.data.view()).collect();
        let data = ndarray::concatenate(Axis(ax), &views)
            .map_err(|e| FieldError::InvalidLayout(e.to_string()))?;
        first.with_data(data)
    }
}

fn validate_labels(ndim: usize, axes: &[GridAxis], stagger: &[bool]) -> Result<()> {
    if axes.len() != ndim || stagger.len() != ndim {
        return Err(FieldError::InvalidLayout(format!(
            "{} axis labels and {} stagger flags for a {}-dimensional array",
            axes.len(),
            stagger.len(),
            ndim
        )));
    }
    for (i, axis) in axes.iter().enumerate() {
        if axes[..i].contains(axis) {
            return Err(FieldError::InvalidLayout(format!("duplicate axis {axis:?}")));
        }
    }
    Ok(())
}

// ── Serde representation ──────────────────────────────────────────────────────

/// Flat interchange form. Non-finite values travel as JSON `null`.
#[derive(Serialize, Deserialize)]
struct FieldRepr {
    axes: Vec<GridAxis>,
    stagger: Vec<bool>,
    shape: Vec<usize>,
    #[serde(deserialize_with = "null_as_nan")]
    data: Vec<f64>,
}

fn null_as_nan<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f64>, D::Error> {
    let v: Vec<Option<f64>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}

impl TryFrom<FieldRepr> for GridField {
    type Error = FieldError;

    fn try_from(repr: FieldRepr) -> Result<Self> {
        Self::from_shape_vec(repr.axes, repr.stagger, &repr.shape, repr.data)
    }
}

impl From<GridField> for FieldRepr {
    fn from(field: GridField) -> Self {
        let shape = field.shape().to_vec();
        let data = field.data.iter().copied().collect();
        Self {
            axes: field.axes,
            stagger: field.stagger,
            shape,
            data,
        }
    }
}
