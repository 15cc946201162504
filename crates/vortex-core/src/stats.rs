//! NaN-aware order statistics.
use crate::error::{FieldError, Result};

/// Sorted finite values of a sample. Non-finite inputs are dropped, never
/// counted as zero.
#[derive(Debug, Clone)]
pub struct Distribution {
    sorted: Vec<f64>,
}

impl Distribution {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    /// Number of finite values.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.sorted.iter().sum::<f64>() / self.sorted.len() as f64)
    }

    /// `p`-th percentile (0–100), linear interpolation between closest ranks:
    ///
    ///   rank = p/100 · (n − 1)
    ///   f    = rank − ⌊rank⌋
    ///   P    = (1 − f) · x[⌊rank⌋] + f · x[⌊rank⌋+1]
    ///
    /// Weighting the endpoints keeps the result finite even when the sample
    /// spans more than `f64::MAX`.
    pub fn percentile(&self, p: f64) -> Result<f64> {
        check_percentile(p)?;
        let n = self.sorted.len();
        if n == 0 {
            return Err(FieldError::EmptyDistribution);
        }
        let rank = p / 100.0 * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = rank - lo as f64;
        let (a, b) = (self.sorted[lo], self.sorted[hi]);
        if frac == 0.0 || lo == hi {
            return Ok(a);
        }
        Ok(a * (1.0 - frac) + b * frac)
    }
}

pub(crate) fn check_percentile(p: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&p) {
        return Err(FieldError::InvalidPercentile(p));
    }
    Ok(())
}
