//! Robust clean-up of derived fields.
//!
//! Pipeline:
//!   ±inf → NaN → percentile bounds over finite values → clip → NaN → fill.
//!
//! A field with no finite values passes through unclipped; only the fill
//! step applies.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FieldError, Result};
use crate::field::GridField;
use crate::stats::{check_percentile, Distribution};

/// Clip percentiles and the value substituted for unresolved NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    pub low_pct: f64,
    pub high_pct: f64,
    pub fill_value: f64,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            low_pct: 1.0,
            high_pct: 99.0,
            fill_value: 0.0,
        }
    }
}

/// Bounds actually applied by the clip step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipBounds {
    pub low: f64,
    pub high: f64,
}

/// A field with every non-finite value resolved.
#[derive(Debug, Clone)]
pub struct SanitizedField {
    field: GridField,
    low_pct: f64,
    high_pct: f64,
    bounds: Option<ClipBounds>,
}

impl SanitizedField {
    pub fn field(&self) -> &GridField {
        &self.field
    }

    pub fn into_field(self) -> GridField {
        self.field
    }

    /// Requested percentile range `[low, high]`.
    pub fn percentile_range(&self) -> (f64, f64) {
        (self.low_pct, self.high_pct)
    }

    /// `None` when the input had no finite values and clipping was skipped.
    pub fn bounds(&self) -> Option<ClipBounds> {
        self.bounds
    }
}

/// Clip outliers and resolve non-finite values.
///
/// The output contains no NaN or infinity whenever `fill_value` is finite.
pub fn sanitize(field: &GridField, options: &SanitizeOptions) -> Result<SanitizedField> {
    check_percentile(options.low_pct)?;
    check_percentile(options.high_pct)?;
    if options.low_pct > options.high_pct {
        return Err(FieldError::InvalidPercentile(options.low_pct));
    }

    let cleaned = field.map(|v| if v.is_infinite() { f64::NAN } else { v });
    let dist = Distribution::from_values(cleaned.values());

    let bounds = if dist.is_empty() {
        warn!(cells = field.len(), "no finite values, clipping skipped");
        None
    } else {
        let low = dist.percentile(options.low_pct)?;
        let high = dist.percentile(options.high_pct)?;
        debug!(low, high, finite = dist.len(), "clip bounds");
        Some(ClipBounds { low, high })
    };

    let fill = options.fill_value;
    let resolved = cleaned.map(|v| {
        if v.is_nan() {
            fill
        } else if let Some(b) = bounds {
            v.max(b.low).min(b.high)
        } else {
            v
        }
    });

    Ok(SanitizedField {
        field: resolved,
        low_pct: options.low_pct,
        high_pct: options.high_pct,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::GridAxis;

    fn series(values: Vec<f64>) -> GridField {
        let n = values.len();
        GridField::from_shape_vec(vec![GridAxis::WestEast], vec![false], &[n], values).unwrap()
    }

    #[test]
    fn output_is_finite_for_finite_fill() {
        let f = series(vec![1.0, f64::NAN, f64::INFINITY, -3.0, f64::NEG_INFINITY, 0.5]);
        let s = sanitize(&f, &SanitizeOptions::default()).unwrap();
        assert!(s.field().values().all(f64::is_finite));
        assert_eq!(s.field().shape(), f.shape());
    }

    #[test]
    fn nan_is_replaced_by_fill_value() {
        let f = series(vec![1.0, f64::NAN, 2.0]);
        let opts = SanitizeOptions { low_pct: 0.0, high_pct: 100.0, fill_value: -9.0 };
        let s = sanitize(&f, &opts).unwrap();
        assert_eq!(s.field().data().as_slice().unwrap(), &[1.0, -9.0, 2.0]);
    }

    #[test]
    fn extreme_outlier_is_clipped_to_unit_scale() {
        // 999 unit-scale values plus one 1e12 spike.
        let mut values: Vec<f64> = (0..999).map(|i| (i % 100) as f64 / 100.0).collect();
        let rest_max = values.iter().cloned().fold(f64::MIN, f64::max);
        values.push(1e12);

        let s = sanitize(&series(values), &SanitizeOptions::default()).unwrap();
        let clipped = s.field().data()[[999]];
        assert!(
            clipped <= rest_max,
            "outlier clipped to {clipped}, expected at most {rest_max}"
        );
        assert!(s.bounds().unwrap().high <= rest_max);
    }

    #[test]
    fn sample_wider_than_f64_range_stays_finite() {
        let f = series(vec![-1.7e308, 1.7e308]);
        let s = sanitize(&f, &SanitizeOptions::default()).unwrap();
        let b = s.bounds().unwrap();
        assert!(b.low.is_finite() && b.high.is_finite());
        assert!(b.low < b.high);
        assert!(s.field().values().all(f64::is_finite));

        let full = SanitizeOptions { low_pct: 0.0, high_pct: 100.0, fill_value: 0.0 };
        let s = sanitize(&f, &full).unwrap();
        assert_eq!(s.field().data().as_slice().unwrap(), &[-1.7e308, 1.7e308]);
    }

    #[test]
    fn outlier_among_constant_values_matches_their_percentile() {
        let mut values = vec![1.0; 500];
        values.push(1e12);
        let s = sanitize(&series(values), &SanitizeOptions::default()).unwrap();
        assert_eq!(s.field().data()[[500]], 1.0);
    }

    #[test]
    fn percentiles_ignore_nan_entries() {
        // If NaN counted as zero the low bound would be 0.
        let mut values = vec![f64::NAN; 50];
        values.extend((1..=50).map(|i| i as f64));
        let s = sanitize(&series(values), &SanitizeOptions::default()).unwrap();
        assert!(s.bounds().unwrap().low >= 1.0);
    }

    #[test]
    fn all_nan_field_skips_clipping() {
        let f = series(vec![f64::NAN, f64::INFINITY, f64::NAN]);
        let s = sanitize(&f, &SanitizeOptions::default()).unwrap();
        assert!(s.bounds().is_none());
        assert!(s.field().values().all(|v| v == 0.0));
    }

    #[test]
    fn inverted_percentiles_are_rejected() {
        let f = series(vec![1.0, 2.0]);
        let opts = SanitizeOptions { low_pct: 90.0, high_pct: 10.0, fill_value: 0.0 };
        assert!(matches!(sanitize(&f, &opts), Err(FieldError::InvalidPercentile(_))));
    }

    #[test]
    fn records_requested_range() {
        let f = series(vec![1.0, 2.0, 3.0]);
        let opts = SanitizeOptions { low_pct: 5.0, high_pct: 95.0, fill_value: 0.0 };
        let s = sanitize(&f, &opts).unwrap();
        assert_eq!(s.percentile_range(), (5.0, 95.0));
    }
}
