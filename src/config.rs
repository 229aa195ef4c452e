//! Viewer settings, persisted next to the measurements.

use serde::{Deserialize, Serialize};

use crate::error::MeasureResult;
use crate::geometry::AREA_CLOSE_TOLERANCE;
use crate::i18n::Lang;
use crate::storage::{KeyValueStore, load_json, save_json};

/// Storage key of the settings document.
pub const CONFIG_KEY: &str = "patagon.config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Language tag for UI text.
    pub language: String,
    /// Project name written into exported reports.
    pub project_label: String,
    /// Area closing distance in scene units.
    pub close_tolerance: f64,
    /// Largest extent of a loaded model after normalization, scene units.
    pub model_extent: f64,
    /// Prefix of the measurement and calibration storage keys.
    pub key_prefix: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            language: Lang::En.tag().to_owned(),
            project_label: "Room scan".to_owned(),
            close_tolerance: AREA_CLOSE_TOLERANCE,
            model_extent: 10.0,
            key_prefix: "patagon".to_owned(),
        }
    }
}

impl ViewerConfig {
    /// Stored settings, or defaults when missing or unreadable.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        match load_json::<Self, _>(store, CONFIG_KEY) {
            Ok(Some(config)) => config.sanitized(),
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> MeasureResult<()> {
        save_json(store, CONFIG_KEY, self)
    }

    #[must_use]
    pub fn lang(&self) -> Lang {
        Lang::from_tag(&self.language)
    }

    #[must_use]
    pub fn measurements_key(&self) -> String {
        format!("{}.measurements", self.key_prefix)
    }

    #[must_use]
    pub fn calibration_key(&self) -> String {
        format!("{}.calibration", self.key_prefix)
    }

    /// Replace out-of-range numbers and empty strings with defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.close_tolerance.is_finite() && self.close_tolerance > 0.0) {
            self.close_tolerance = defaults.close_tolerance;
        }
        if !(self.model_extent.is_finite() && self.model_extent > 0.0) {
            self.model_extent = defaults.model_extent;
        }
        if self.key_prefix.trim().is_empty() {
            self.key_prefix = defaults.key_prefix;
        }
        self
    }
}
