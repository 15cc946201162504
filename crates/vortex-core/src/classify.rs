//! Turbulence masks and symmetric contour bands.
//!
//! The mask flags cells strictly above a threshold, either a fixed value or
//! a percentile of the field's own distribution. The band partition labels
//! every cell against a set of positive levels and their negatives, the way
//! the vorticity cross-sections are contoured.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::field::{GridAxis, GridField};
use crate::sanitize::SanitizedField;
use crate::stats::{check_percentile, Distribution};

/// How the turbulence threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    Fixed { value: f64 },
    /// Percentile (0–100) of the field's finite values, recomputed per call.
    Adaptive { percentile: f64 },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Adaptive { percentile: 75.0 }
    }
}

/// Boolean field, true where the value exceeds the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct TurbulenceMask {
    mask: ArrayD<bool>,
    axes: Vec<GridAxis>,
}

impl TurbulenceMask {
    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn shape(&self) -> &[usize] {
        self.mask.shape()
    }

    /// Number of flagged cells.
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Flagged fraction, 0 for an empty mask.
    pub fn fraction(&self) -> f64 {
        if self.mask.is_empty() {
            0.0
        } else {
            self.count() as f64 / self.mask.len() as f64
        }
    }
}

/// Flag cells of `field` above the threshold chosen by `mode`.
///
/// Returns the mask and the threshold used. Adaptive mode on a field without
/// finite values fails with [`FieldError::EmptyDistribution`].
pub fn classify(field: &SanitizedField, mode: &ThresholdMode) -> Result<(TurbulenceMask, f64)> {
    let values = field.field();
    let threshold = match *mode {
        ThresholdMode::Fixed { value } => {
            if value.is_nan() {
                return Err(FieldError::InvalidThreshold(value));
            }
            value
        }
        ThresholdMode::Adaptive { percentile } => {
            check_percentile(percentile)?;
            Distribution::from_values(values.values()).percentile(percentile)?
        }
    };

    let mask = values.data().mapv(|v| v > threshold);
    let mask = TurbulenceMask {
        mask,
        axes: values.axes().to_vec(),
    };
    debug!(threshold, flagged = mask.count(), "turbulence mask");
    Ok((mask, threshold))
}

// ── Contour bands ─────────────────────────────────────────────────────────────

/// Positive contour levels; the negated levels are implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ContourLevels {
    levels: Vec<f64>,
}

impl ContourLevels {
    /// Levels must be finite, positive and distinct; order does not matter.
    pub fn new(mut levels: Vec<f64>) -> Result<Self> {
        if levels.is_empty() {
            return Err(FieldError::InvalidLevels("no levels given".into()));
        }
        if let Some(bad) = levels.iter().find(|l| !l.is_finite() || **l <= 0.0) {
            return Err(FieldError::InvalidLevels(format!(
                "level {bad} is not a positive finite value"
            )));
        }
        levels.sort_by(f64::total_cmp);
        if levels.windows(2).any(|w| w[0] == w[1]) {
            return Err(FieldError::InvalidLevels("duplicate level".into()));
        }
        Ok(Self { levels })
    }

    /// Positive levels, ascending.
    pub fn positive(&self) -> &[f64] {
        &self.levels
    }

    /// Negated levels, ascending (most negative first).
    pub fn negative(&self) -> Vec<f64> {
        self.levels.iter().rev().map(|l| -l).collect()
    }

    /// Band label of a single value.
    pub fn band_of(&self, v: f64) -> Band {
        if v.is_nan() {
            Band::Undefined
        } else if v == 0.0 {
            Band::Zero
        } else {
            let crossed = self.levels.iter().filter(|&&l| v.abs() >= l).count();
            if v > 0.0 {
                Band::Positive(crossed)
            } else {
                Band::Negative(crossed)
            }
        }
    }
}

impl Default for ContourLevels {
    fn default() -> Self {
        Self {
            levels: vec![0.0006, 0.0012, 0.0018],
        }
    }
}

impl TryFrom<Vec<f64>> for ContourLevels {
    type Error = FieldError;

    fn try_from(levels: Vec<f64>) -> Result<Self> {
        Self::new(levels)
    }
}

impl From<ContourLevels> for Vec<f64> {
    fn from(levels: ContourLevels) -> Self {
        levels.levels
    }
}

/// Contour band of one cell.
///
/// `Positive(k)` / `Negative(k)`: `k` levels have magnitude `≤ |v|`, so
/// `Positive(0)` lies between zero and the first level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Zero,
    Positive(usize),
    Negative(usize),
    Undefined,
}

/// Per-cell band labels plus tallies.
#[derive(Debug, Clone)]
pub struct BandField {
    bands: ArrayD<Band>,
    axes: Vec<GridAxis>,
    n_levels: usize,
}

/// Cell counts per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCounts {
    pub zero: usize,
    /// Index `k` counts `Positive(k)`.
    pub positive: Vec<usize>,
    /// Index `k` counts `Negative(k)`.
    pub negative: Vec<usize>,
    pub undefined: usize,
}

impl BandField {
    pub fn bands(&self) -> &ArrayD<Band> {
        &self.bands
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn counts(&self) -> BandCounts {
        let mut counts = BandCounts {
            zero: 0,
            positive: vec![0; self.n_levels + 1],
            negative: vec![0; self.n_levels + 1],
            undefined: 0,
        };
        for band in self.bands.iter() {
            match *band {
                Band::Zero => counts.zero += 1,
                Band::Positive(k) => counts.positive[k] += 1,
                Band::Negative(k) => counts.negative[k] += 1,
                Band::Undefined => counts.undefined += 1,
            }
        }
        counts
    }
}

/// Label every cell of `field` with its contour band.
pub fn contour_bands(field: &GridField, levels: &ContourLevels) -> BandField {
    BandField {
        bands: field.data().mapv(|v| levels.band_of(v)),
        axes: field.axes().to_vec(),
        n_levels: levels.positive().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::{sanitize, SanitizeOptions};

    fn series(values: Vec<f64>) -> GridField {
        let n = values.len();
        GridField::from_shape_vec(vec![GridAxis::WestEast], vec![false], &[n], values).unwrap()
    }

    fn sanitized(values: Vec<f64>) -> SanitizedField {
        let opts = SanitizeOptions { low_pct: 0.0, high_pct: 100.0, fill_value: 0.0 };
        sanitize(&series(values), &opts).unwrap()
    }

    #[test]
    fn fixed_threshold_is_strict() {
        let s = sanitized(vec![0.2, 0.5, 0.7, 1.0]);
        let (mask, t) = classify(&s, &ThresholdMode::Fixed { value: 0.5 }).unwrap();
        assert_eq!(t, 0.5);
        assert_eq!(mask.mask().as_slice().unwrap(), &[false, false, true, true]);
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.fraction(), 0.5);
    }

    #[test]
    fn adaptive_threshold_is_percentile_of_sanitized_field() {
        let s = sanitized((1..=9).map(|i| i as f64).collect());
        let expected = Distribution::from_values(s.field().values()).percentile(75.0).unwrap();
        let (mask, t) = classify(&s, &ThresholdMode::Adaptive { percentile: 75.0 }).unwrap();
        assert_eq!(t, expected);
        assert_eq!(t, 7.0);
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn adaptive_threshold_is_recomputed_per_call() {
        let mode = ThresholdMode::Adaptive { percentile: 50.0 };
        let (_, t1) = classify(&sanitized(vec![1.0, 2.0, 3.0]), &mode).unwrap();
        let (_, t2) = classify(&sanitized(vec![10.0, 20.0, 30.0]), &mode).unwrap();
        assert_eq!(t1, 2.0);
        assert_eq!(t2, 20.0);
    }

    #[test]
    fn adaptive_threshold_on_empty_distribution_fails() {
        let f = series(vec![f64::NAN, f64::NAN]);
        let opts = SanitizeOptions { fill_value: f64::NAN, ..SanitizeOptions::default() };
        let s = sanitize(&f, &opts).unwrap();
        assert!(matches!(
            classify(&s, &ThresholdMode::Adaptive { percentile: 75.0 }),
            Err(FieldError::EmptyDistribution)
        ));
    }

    #[test]
    fn nan_fixed_threshold_is_rejected() {
        let s = sanitized(vec![1.0]);
        assert!(matches!(
            classify(&s, &ThresholdMode::Fixed { value: f64::NAN }),
            Err(FieldError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn levels_are_order_independent() {
        let a = ContourLevels::new(vec![0.0018, 0.0006, 0.0012]).unwrap();
        assert_eq!(a, ContourLevels::default());
        assert_eq!(a.negative(), vec![-0.0018, -0.0012, -0.0006]);
    }

    #[test]
    fn invalid_levels_are_rejected() {
        assert!(ContourLevels::new(vec![]).is_err());
        assert!(ContourLevels::new(vec![0.1, -0.2]).is_err());
        assert!(ContourLevels::new(vec![0.1, 0.1]).is_err());
        assert!(ContourLevels::new(vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn values_map_to_symmetric_bands() {
        let levels = ContourLevels::default();
        assert_eq!(levels.band_of(0.0), Band::Zero);
        assert_eq!(levels.band_of(0.0003), Band::Positive(0));
        assert_eq!(levels.band_of(0.0006), Band::Positive(1));
        assert_eq!(levels.band_of(0.0015), Band::Positive(2));
        assert_eq!(levels.band_of(0.5), Band::Positive(3));
        assert_eq!(levels.band_of(-0.0013), Band::Negative(2));
        assert_eq!(levels.band_of(-1e-9), Band::Negative(0));
        assert_eq!(levels.band_of(f64::NAN), Band::Undefined);
    }

    #[test]
    fn band_counts_cover_every_cell() {
        let f = series(vec![0.0, 0.001, -0.002, 0.0, f64::NAN, 0.0001]);
        let bands = contour_bands(&f, &ContourLevels::default());
        let counts = bands.counts();
        assert_eq!(counts.zero, 2);
        assert_eq!(counts.positive, vec![1, 1, 0, 0]);
        assert_eq!(counts.negative, vec![0, 0, 0, 1]);
        assert_eq!(counts.undefined, 1);
    }

    #[test]
    fn threshold_mode_from_json() {
        let mode: ThresholdMode =
            serde_json::from_str(r#"{"mode":"fixed","value":0.5}"#).unwrap();
        assert_eq!(mode, ThresholdMode::Fixed { value: 0.5 });
        let levels: ContourLevels = serde_json::from_str("[0.2, 0.1]").unwrap();
        assert_eq!(levels.positive(), &[0.1, 0.2]);
    }
}
