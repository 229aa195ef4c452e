//! Recorded measurements and the probe points they are built from.

use chrono::{DateTime, Utc};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::Calibration;
use crate::error::{MeasureError, MeasureResult};
use crate::geometry;

/// Unique identifier for measurements
pub type MeasurementId = Uuid;

/// What a measurement measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    /// Straight line between two points, in feet.
    Distance,
    /// Vertical separation of two points, in feet.
    Height,
    /// Floor area of a closed polygon, in square feet.
    Area,
}

impl MeasurementKind {
    pub const ALL: [Self; 3] = [Self::Distance, Self::Height, Self::Area];

    /// Stable lowercase name, as serialized.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Height => "height",
            Self::Area => "area",
        }
    }

    /// Title-case name used for default labels.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Distance => "Distance",
            Self::Height => "Height",
            Self::Area => "Area",
        }
    }

    /// Whether `count` points form a valid measurement of this kind.
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Distance | Self::Height => count == 2,
            Self::Area => count >= 3,
        }
    }

    /// Magnitude in scene units (or scene units squared).
    #[must_use]
    pub fn raw_value(self, points: &[Point3<f64>]) -> f64 {
        match (self, points) {
            (Self::Distance, [a, b]) => geometry::distance(a, b),
            (Self::Height, [a, b]) => geometry::height(a, b),
            (Self::Area, _) => geometry::floor_area(points),
            _ => 0.0,
        }
    }
}

/// Surface a probe point was picked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRef {
    /// Index of the hit polygon in the loaded model.
    ModelPolygon(usize),
    /// Not picked from the model (programmatic input).
    Unknown,
}

/// A clicked point while a measurement is being built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPoint {
    pub position: Point3<f64>,
    pub surface: SurfaceRef,
}

impl MeasurementPoint {
    #[must_use]
    pub const fn new(position: Point3<f64>, surface: SurfaceRef) -> Self {
        Self { position, surface }
    }

    /// A point with no surface attached.
    #[must_use]
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z), SurfaceRef::Unknown)
    }
}

/// A finalized measurement, persisted as part of the measurement list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: MeasurementId,
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub points: Vec<Point3<f64>>,
    /// Feet for linear kinds, square feet for areas.
    pub value: f64,
    pub display_value: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    /// Finalize `points` into a measurement using the current calibration.
    pub fn new(
        kind: MeasurementKind,
        points: Vec<Point3<f64>>,
        calibration: &Calibration,
        label: impl Into<String>,
    ) -> MeasureResult<Self> {
        if !kind.accepts(points.len()) {
            return Err(MeasureError::invalid_input(format!(
                "{} needs {} points, got {}",
                kind.name(),
                if kind == MeasurementKind::Area { "at least 3" } else { "2" },
                points.len()
            )));
        }
        let raw = kind.raw_value(&points);
        let (value, display_value) = match kind {
            MeasurementKind::Distance | MeasurementKind::Height => {
                let feet = calibration.linear_feet(raw);
                (feet, geometry::format_feet_inches(feet))
            }
            MeasurementKind::Area => {
                let sq_ft = calibration.square_feet(raw);
                (sq_ft, geometry::format_square_feet(sq_ft))
            }
        };
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            points,
            value,
            display_value,
            label: label.into(),
            timestamp: Utc::now(),
        })
    }

    /// Whether a stored record still satisfies the list invariants.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.kind.accepts(self.points.len()) && self.value.is_finite() && self.value >= 0.0
    }
}
