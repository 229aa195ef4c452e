//! Scene-unit to real-world scale.

use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, MeasureResult};

/// Mapping from scene units to feet.
///
/// `model_scale` is the uniform factor applied when the loaded model was
/// normalized; dividing by it brings scene lengths back to source units.
/// `scale_factor` then maps source units to feet. Both stay strictly
/// positive.
///
/// A new calibration only applies to measurements finalized afterwards;
/// stored measurement values are never rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    scale_factor: f64,
    model_scale: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            model_scale: 1.0,
        }
    }
}

fn positive(value: f64, what: &str) -> MeasureResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MeasureError::invalid_input(format!(
            "{what} must be a positive number, got {value}"
        )))
    }
}

impl Calibration {
    /// Build a calibration from explicit factors.
    pub fn new(scale_factor: f64, model_scale: f64) -> MeasureResult<Self> {
        Ok(Self {
            scale_factor: positive(scale_factor, "scale factor")?,
            model_scale: positive(model_scale, "model scale")?,
        })
    }

    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    #[must_use]
    pub const fn model_scale(&self) -> f64 {
        self.model_scale
    }

    /// Feet per scene unit.
    #[must_use]
    pub fn feet_per_unit(&self) -> f64 {
        self.scale_factor / self.model_scale
    }

    /// Convert a scene length to feet.
    #[must_use]
    pub fn linear_feet(&self, raw: f64) -> f64 {
        raw * self.feet_per_unit()
    }

    /// Convert a scene area to square feet.
    #[must_use]
    pub fn square_feet(&self, raw: f64) -> f64 {
        raw * self.feet_per_unit().powi(2)
    }

    /// Calibration that maps `raw_scene_distance` onto `known_feet`.
    ///
    /// Fails without producing anything when either value is zero, negative
    /// or not finite.
    pub fn calibrated(&self, raw_scene_distance: f64, known_feet: f64) -> MeasureResult<Self> {
        let known = positive(known_feet, "known distance")?;
        let raw = positive(raw_scene_distance, "reference points distance")?;
        Self::new(known / raw * self.model_scale, self.model_scale)
    }

    /// Same scale factor with a new model normalization.
    pub fn with_model_scale(&self, model_scale: f64) -> MeasureResult<Self> {
        Self::new(self.scale_factor, model_scale)
    }

    /// Drop any calibration: one source-model unit is one foot again.
    #[must_use]
    pub const fn reset(&self) -> Self {
        Self {
            scale_factor: 1.0,
            model_scale: self.model_scale,
        }
    }

    /// Whether both factors satisfy the positivity invariant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        positive(self.scale_factor, "").is_ok() && positive(self.model_scale, "").is_ok()
    }
}
