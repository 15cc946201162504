use thiserror::Error;

use crate::field::GridAxis;

/// Errors raised by field construction and the derivation pipeline.
///
/// Structural problems (shapes, axes) are fatal for the call that hit them.
/// Numeric degeneracies such as near-zero spacing are absorbed where they
/// occur and never show up here.
#[derive(Error, Debug)]
pub enum FieldError {
    /// Two fields disagree in shape beyond what the operation tolerates.
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Two fields are labeled with different axes.
    #[error("axis mismatch: expected {expected:?}, found {found:?}")]
    AxisMismatch {
        expected: Vec<GridAxis>,
        found: Vec<GridAxis>,
    },

    /// The operation needs an axis the field does not carry.
    #[error("field has no {0:?} axis")]
    MissingAxis(GridAxis),

    /// Axis labels, stagger flags and data do not describe a valid array.
    #[error("invalid field layout: {0}")]
    InvalidLayout(String),

    #[error("invalid grid spacing {0}")]
    InvalidSpacing(f64),

    #[error("invalid percentile {0}, expected a value in [0, 100]")]
    InvalidPercentile(f64),

    #[error("invalid threshold {0}")]
    InvalidThreshold(f64),

    #[error("invalid contour levels: {0}")]
    InvalidLevels(String),

    #[error("invalid physical constant {name} = {value}")]
    InvalidConstant { name: &'static str, value: f64 },

    /// Percentile or threshold requested from a field without finite values.
    #[error("distribution has no finite values")]
    EmptyDistribution,

    #[error("index {index} out of range for {axis:?} axis of length {len}")]
    IndexOutOfRange {
        axis: GridAxis,
        index: usize,
        len: usize,
    },

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FieldError>;
