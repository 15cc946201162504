//! Planetary constants and pipeline options.
//!
//! Defaults are calibrated to the Titan simulation. Every struct accepts a
//! partial JSON object; missing keys fall back to the default.

use serde::{Deserialize, Serialize};

use crate::classify::{ContourLevels, ThresholdMode};
use crate::error::{FieldError, Result};
use crate::sanitize::SanitizeOptions;
use crate::stats::check_percentile;

/// Physical constants of the simulated atmosphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConstants {
    /// Surface gravity, m/s².
    pub gravity: f64,
    /// Offset added to the potential-temperature perturbation, K.
    pub reference_temperature: f64,
    /// Base state of the potential-temperature perturbation, K.
    pub base_potential_temperature: f64,
    /// Specific gas constant of dry air, J/(kg·K).
    pub gas_constant: f64,
    /// Specific heat at constant pressure, J/(kg·K).
    pub specific_heat: f64,
    /// Reference pressure of the potential temperature, Pa.
    pub reference_pressure: f64,
}

impl PlanetConstants {
    pub fn titan() -> Self {
        Self {
            gravity: 1.352,
            reference_temperature: 94.0,
            base_potential_temperature: 100.0,
            gas_constant: 290.0,
            specific_heat: 1044.0,
            reference_pressure: 1e5,
        }
    }

    /// Poisson exponent `Rd / cp`.
    pub fn kappa(&self) -> f64 {
        self.gas_constant / self.specific_heat
    }

    pub fn validate(&self) -> Result<()> {
        positive("gravity", self.gravity)?;
        positive("gas_constant", self.gas_constant)?;
        positive("specific_heat", self.specific_heat)?;
        positive("reference_pressure", self.reference_pressure)?;
        finite("reference_temperature", self.reference_temperature)?;
        finite("base_potential_temperature", self.base_potential_temperature)?;
        Ok(())
    }
}

impl Default for PlanetConstants {
    fn default() -> Self {
        Self::titan()
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FieldError::InvalidConstant { name, value });
    }
    Ok(())
}

fn finite(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(FieldError::InvalidConstant { name, value });
    }
    Ok(())
}

/// Options for a full vorticity run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub constants: PlanetConstants,
    pub sanitize: SanitizeOptions,
    pub threshold: ThresholdMode,
    pub contour_levels: ContourLevels,
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.constants.validate()?;
        check_percentile(self.sanitize.low_pct)?;
        check_percentile(self.sanitize.high_pct)?;
        if self.sanitize.low_pct > self.sanitize.high_pct {
            return Err(FieldError::InvalidPercentile(self.sanitize.low_pct));
        }
        // The sanitized field must come out fully finite.
        finite("fill_value", self.sanitize.fill_value)?;
        match self.threshold {
            ThresholdMode::Fixed { value } if value.is_nan() => {
                Err(FieldError::InvalidThreshold(value))
            }
            ThresholdMode::Adaptive { percentile } => check_percentile(percentile),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titan_defaults() {
        let c = PlanetConstants::default();
        assert_eq!(c.gravity, 1.352);
        assert_eq!(c.reference_temperature, 94.0);
        assert_eq!(c.reference_pressure, 1e5);
        assert!((c.kappa() - 290.0 / 1044.0).abs() < 1e-15);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_json_gives_defaults() {
        let cfg = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.threshold, ThresholdMode::Adaptive { percentile: 75.0 });
    }

    #[test]
    fn partial_json_overrides_only_given_keys() {
        let json = r#"{
            "constants": { "gravity": 9.81 },
            "threshold": { "mode": "fixed", "value": 0.5 },
            "contour_levels": [0.001, 0.002]
        }"#;
        let cfg = PipelineConfig::from_json(json).unwrap();
        assert_eq!(cfg.constants.gravity, 9.81);
        assert_eq!(cfg.constants.specific_heat, 1044.0);
        assert_eq!(cfg.threshold, ThresholdMode::Fixed { value: 0.5 });
        assert_eq!(cfg.contour_levels.positive(), &[0.001, 0.002]);
        assert_eq!(cfg.sanitize, SanitizeOptions::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"constants":{"gravity":0.0}}"#),
            Err(FieldError::InvalidConstant { name: "gravity", .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"sanitize":{"low_pct":80.0,"high_pct":20.0}}"#),
            Err(FieldError::InvalidPercentile(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"threshold":{"mode":"adaptive","percentile":120.0}}"#),
            Err(FieldError::InvalidPercentile(_))
        ));
        let nan_fill = PipelineConfig {
            sanitize: SanitizeOptions { fill_value: f64::NAN, ..SanitizeOptions::default() },
            ..PipelineConfig::default()
        };
        assert!(matches!(
            nan_fill.validate(),
            Err(FieldError::InvalidConstant { name: "fill_value", .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"contour_levels":[]}"#),
            Err(FieldError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json("not json"),
            Err(FieldError::Config(_))
        ));
    }
}
