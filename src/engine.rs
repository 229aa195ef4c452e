//! The measurement engine: turns picked points into recorded measurements.
//!
//! The engine owns the in-progress point buffer, the measurement list and the
//! calibration. It draws through an [`Overlay`] and persists through a
//! [`KeyValueStore`], both injected at construction. The whole list is
//! rewritten to the store after every change.
//!
//! Modes:
//!
//! - `Idle`: clicks are ignored
//! - `Distance` / `Height`: the second click finalizes
//! - `Area`: a click near the first corner closes the polygon
//! - `Calibrate`: collects a reference pair for [`MeasureEngine::calibrate`]
//!
//! Measuring modes stay active across measurements until toggled off.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::calibration::Calibration;
use crate::config::ViewerConfig;
use crate::error::{MeasureError, MeasureResult};
use crate::geometry;
use crate::measurement::{Measurement, MeasurementId, MeasurementKind, MeasurementPoint};
use crate::overlay::{
    AREA_COLOR, DISTANCE_COLOR, HEIGHT_COLOR, Overlay, PREVIEW_COLOR, PROBE_COLOR, VisualId,
};
use crate::report::Report;
use crate::storage::{KeyValueStore, load_json, save_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Distance,
    Height,
    Area,
    Calibrate,
}

impl Mode {
    pub const TOOLS: [Self; 4] = [Self::Distance, Self::Height, Self::Area, Self::Calibrate];

    /// Kind of measurement this mode records, if any.
    #[must_use]
    pub const fn kind(self) -> Option<MeasurementKind> {
        match self {
            Self::Distance => Some(MeasurementKind::Distance),
            Self::Height => Some(MeasurementKind::Height),
            Self::Area => Some(MeasurementKind::Area),
            Self::Idle | Self::Calibrate => None,
        }
    }

    /// Suffix of the `mode.*` and `hint.*` text keys.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Distance => "distance",
            Self::Height => "height",
            Self::Area => "area",
            Self::Calibrate => "calibrate",
        }
    }
}

/// A user action.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Toolbar press: enters, switches or (if already active) leaves a mode.
    SelectMode(Mode),
    AddPoint(MeasurementPoint),
    Calibrate { known_feet: f64 },
    ResetCalibration,
    SetModelScale(f64),
    Rename { id: MeasurementId, label: String },
    Delete(MeasurementId),
    ClearAll,
    Export { project: String },
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    ModeChanged(Mode),
    PointAdded { buffered: usize },
    Finalized(MeasurementId),
    Calibrated(Calibration),
    Renamed(MeasurementId),
    Deleted(MeasurementId),
    Cleared,
    Exported(Report),
    /// Nothing happened (ignored click, unknown id).
    Unchanged,
}

pub struct MeasureEngine<O, S> {
    mode: Mode,
    buffer: Vec<MeasurementPoint>,
    /// Probe markers and the area preview outline.
    buffer_visuals: Vec<VisualId>,
    preview: Vec<VisualId>,
    measurements: Vec<Measurement>,
    visuals: HashMap<MeasurementId, Vec<VisualId>>,
    calibration: Calibration,
    close_tolerance: f64,
    measurements_key: String,
    calibration_key: String,
    overlay: O,
    store: S,
}

impl<O: Overlay, S: KeyValueStore> MeasureEngine<O, S> {
    /// Load persisted state from `store` and draw it on `overlay`.
    ///
    /// Unreadable stored data is logged and replaced by an empty list or the
    /// default calibration.
    pub fn new(overlay: O, store: S, config: &ViewerConfig) -> Self {
        let measurements_key = config.measurements_key();
        let calibration_key = config.calibration_key();

        let measurements: Vec<Measurement> = match load_json(&store, &measurements_key) {
            Ok(Some(list)) => list,
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("{e}; starting with no measurements");
                Vec::new()
            }
        };
        let before = measurements.len();
        let measurements: Vec<Measurement> =
            measurements.into_iter().filter(Measurement::is_well_formed).collect();
        if measurements.len() != before {
            log::warn!(
                "dropped {} malformed stored measurements",
                before - measurements.len()
            );
        }

        let calibration = match load_json::<Calibration, _>(&store, &calibration_key) {
            Ok(Some(cal)) if cal.is_valid() => cal,
            Ok(Some(_)) => {
                log::warn!("stored calibration is out of range; using defaults");
                Calibration::default()
            }
            Ok(None) => Calibration::default(),
            Err(e) => {
                log::warn!("{e}; using default calibration");
                Calibration::default()
            }
        };

        let mut engine = Self {
            mode: Mode::Idle,
            buffer: Vec::new(),
            buffer_visuals: Vec::new(),
            preview: Vec::new(),
            measurements: Vec::new(),
            visuals: HashMap::new(),
            calibration,
            close_tolerance: config.close_tolerance,
            measurements_key,
            calibration_key,
            overlay,
            store,
        };
        for m in measurements {
            let handles = engine.draw_measurement(&m);
            engine.visuals.insert(m.id, handles);
            engine.measurements.push(m);
        }
        log::info!(
            "measurement engine ready: {} measurements, {:.4} ft per unit",
            engine.measurements.len(),
            engine.calibration.feet_per_unit()
        );
        engine
    }

    /// Run one user action.
    pub fn apply(&mut self, command: Command) -> MeasureResult<Outcome> {
        match command {
            Command::SelectMode(mode) => Ok(Outcome::ModeChanged(self.select_mode(mode))),
            Command::AddPoint(point) => self.add_point(point),
            Command::Calibrate { known_feet } => self.calibrate(known_feet).map(Outcome::Calibrated),
            Command::ResetCalibration => Ok(Outcome::Calibrated(self.reset_calibration())),
            Command::SetModelScale(scale) => self.set_model_scale(scale).map(Outcome::Calibrated),
            Command::Rename { id, label } => Ok(if self.rename(id, label) {
                Outcome::Renamed(id)
            } else {
                Outcome::Unchanged
            }),
            Command::Delete(id) => Ok(if self.delete(id) {
                Outcome::Deleted(id)
            } else {
                Outcome::Unchanged
            }),
            Command::ClearAll => self.clear_all().map(|()| Outcome::Cleared),
            Command::Export { project } => self.export_report(&project).map(Outcome::Exported),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    #[must_use]
    pub fn measurement(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[must_use]
    pub const fn overlay(&self) -> &O {
        &self.overlay
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Toolbar semantics: pressing the active mode turns it off, any other
    /// press switches. The point buffer is discarded either way.
    pub fn select_mode(&mut self, mode: Mode) -> Mode {
        self.discard_buffer();
        self.mode = if mode == self.mode { Mode::Idle } else { mode };
        log::debug!("measure mode: {:?}", self.mode);
        self.mode
    }

    /// Feed one picked point to the current mode.
    pub fn add_point(&mut self, point: MeasurementPoint) -> MeasureResult<Outcome> {
        match self.mode {
            Mode::Idle => Ok(Outcome::Unchanged),
            Mode::Calibrate => {
                if self.buffer.len() >= 2 {
                    self.discard_buffer();
                }
                self.push_point(point);
                if self.buffer.len() == 2 {
                    let id = self.overlay.add_line(
                        self.buffer[0].position,
                        self.buffer[1].position,
                        PROBE_COLOR,
                    );
                    self.buffer_visuals.push(id);
                }
                Ok(Outcome::PointAdded {
                    buffered: self.buffer.len(),
                })
            }
            Mode::Distance | Mode::Height => {
                self.push_point(point);
                if self.buffer.len() == 2 {
                    let kind = self.mode.kind().unwrap_or(MeasurementKind::Distance);
                    self.finalize(kind).map(Outcome::Finalized)
                } else {
                    Ok(Outcome::PointAdded {
                        buffered: self.buffer.len(),
                    })
                }
            }
            Mode::Area => {
                if self.closes_polygon(&point.position) {
                    return self.finalize(MeasurementKind::Area).map(Outcome::Finalized);
                }
                self.push_point(point);
                self.redraw_preview();
                Ok(Outcome::PointAdded {
                    buffered: self.buffer.len(),
                })
            }
        }
    }

    /// Map the two buffered probe points onto `known_feet`.
    ///
    /// Only measurements finalized afterwards use the new scale. On error
    /// nothing changes.
    pub fn calibrate(&mut self, known_feet: f64) -> MeasureResult<Calibration> {
        if !(known_feet.is_finite() && known_feet > 0.0) {
            return Err(MeasureError::invalid_input(format!(
                "known distance must be a positive number, got {known_feet}"
            )));
        }
        let [a, b] = self.buffer.as_slice() else {
            return Err(MeasureError::invalid_input(format!(
                "calibration needs exactly two reference points, {} picked",
                self.buffer.len()
            )));
        };
        let raw = geometry::distance(&a.position, &b.position);
        let calibration = self.calibration.calibrated(raw, known_feet)?;

        self.calibration = calibration;
        self.persist_calibration();
        self.discard_buffer();
        if self.mode == Mode::Calibrate {
            self.mode = Mode::Idle;
        }
        log::info!(
            "calibrated: {raw:.4} units = {known_feet} ft, scale factor {:.6}",
            calibration.scale_factor()
        );
        Ok(calibration)
    }

    /// Back to one source-model unit per foot.
    pub fn reset_calibration(&mut self) -> Calibration {
        self.calibration = self.calibration.reset();
        self.persist_calibration();
        self.calibration
    }

    /// Record the normalization applied to a freshly loaded model.
    pub fn set_model_scale(&mut self, model_scale: f64) -> MeasureResult<Calibration> {
        self.calibration = self.calibration.with_model_scale(model_scale)?;
        self.persist_calibration();
        Ok(self.calibration)
    }

    /// Change a label. Unknown ids are ignored; returns whether anything changed.
    pub fn rename(&mut self, id: MeasurementId, label: impl Into<String>) -> bool {
        let Some(m) = self.measurements.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        m.label = label.into();
        self.persist_measurements();
        true
    }

    /// Remove a measurement and its visuals. Unknown ids are ignored.
    pub fn delete(&mut self, id: MeasurementId) -> bool {
        let Some(index) = self.measurements.iter().position(|m| m.id == id) else {
            return false;
        };
        self.measurements.remove(index);
        for visual in self.visuals.remove(&id).unwrap_or_default() {
            self.overlay.remove(visual);
        }
        self.persist_measurements();
        true
    }

    /// Drop every measurement, the point buffer and all visuals.
    pub fn clear_all(&mut self) -> MeasureResult<()> {
        if self.measurements.is_empty() && self.buffer.is_empty() {
            return Err(MeasureError::empty_state("no measurements to clear"));
        }
        self.measurements.clear();
        self.visuals.clear();
        self.buffer.clear();
        self.buffer_visuals.clear();
        self.preview.clear();
        self.overlay.clear();
        self.persist_measurements();
        Ok(())
    }

    pub fn export_report(&self, project: &str) -> MeasureResult<Report> {
        Report::new(project, &self.measurements)
    }

    fn push_point(&mut self, point: MeasurementPoint) {
        let marker = self.overlay.add_marker(point.position);
        self.buffer_visuals.push(marker);
        self.buffer.push(point);
    }

    fn closes_polygon(&self, position: &Point3<f64>) -> bool {
        self.buffer.len() > 2
            && geometry::distance(position, &self.buffer[0].position) < self.close_tolerance
    }

    fn redraw_preview(&mut self) {
        for id in self.preview.drain(..) {
            self.overlay.remove(id);
        }
        for pair in self.buffer.windows(2) {
            let id = self
                .overlay
                .add_line(pair[0].position, pair[1].position, PREVIEW_COLOR);
            self.preview.push(id);
        }
    }

    fn discard_buffer(&mut self) {
        self.buffer.clear();
        for id in self.buffer_visuals.drain(..).chain(self.preview.drain(..)) {
            self.overlay.remove(id);
        }
    }

    fn finalize(&mut self, kind: MeasurementKind) -> MeasureResult<MeasurementId> {
        let points: Vec<Point3<f64>> = self.buffer.iter().map(|p| p.position).collect();
        let label = self.next_label(kind);
        let result = Measurement::new(kind, points, &self.calibration, label);
        self.discard_buffer();
        let measurement = result?;

        let handles = self.draw_measurement(&measurement);
        let id = measurement.id;
        log::info!(
            "{} recorded: {}",
            kind.name(),
            measurement.display_value
        );
        self.visuals.insert(id, handles);
        self.measurements.push(measurement);
        self.persist_measurements();
        Ok(id)
    }

    fn next_label(&self, kind: MeasurementKind) -> String {
        let n = self.measurements.iter().filter(|m| m.kind == kind).count() + 1;
        format!("{} {n}", kind.title())
    }

    fn draw_measurement(&mut self, m: &Measurement) -> Vec<VisualId> {
        let mut handles = Vec::new();
        match (m.kind, m.points.as_slice()) {
            (MeasurementKind::Distance, [a, b]) => {
                handles.push(self.overlay.add_line(*a, *b, DISTANCE_COLOR));
                let mid = Point3::from((a.coords + b.coords) / 2.0);
                handles.push(self.overlay.add_label(&m.display_value, mid));
            }
            (MeasurementKind::Height, [a, b]) => {
                let (low, high) = if a.y <= b.y { (a, b) } else { (b, a) };
                let top = Point3::new(low.x, high.y, low.z);
                handles.push(self.overlay.add_line(*low, top, HEIGHT_COLOR));
                let mid = Point3::new(low.x, (low.y + high.y) / 2.0, low.z);
                handles.push(self.overlay.add_label(&m.display_value, mid));
            }
            (MeasurementKind::Area, points) => {
                handles.push(self.overlay.add_polygon(points, AREA_COLOR));
                if let Some(center) = geometry::centroid(points) {
                    handles.push(self.overlay.add_label(&m.display_value, center));
                }
            }
            _ => log::warn!("measurement {} has no drawable shape", m.id),
        }
        handles
    }

    fn persist_measurements(&mut self) {
        if let Err(e) = save_json(&mut self.store, &self.measurements_key, &self.measurements) {
            log::error!("could not save measurements: {e}");
        }
    }

    fn persist_calibration(&mut self) {
        if let Err(e) = save_json(&mut self.store, &self.calibration_key, &self.calibration) {
            log::error!("could not save calibration: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{SceneOverlay, Visual};
    use crate::storage::MemoryStore;

    type Engine = MeasureEngine<SceneOverlay, MemoryStore>;

    fn engine() -> Engine {
        MeasureEngine::new(SceneOverlay::new(), MemoryStore::new(), &ViewerConfig::default())
    }

    fn reload(engine: Engine) -> Engine {
        MeasureEngine::new(SceneOverlay::new(), engine.store, &ViewerConfig::default())
    }

    fn click(engine: &mut Engine, x: f64, y: f64, z: f64) -> Outcome {
        engine.add_point(MeasurementPoint::at(x, y, z)).unwrap()
    }

    fn finalized(outcome: Outcome) -> MeasurementId {
        match outcome {
            Outcome::Finalized(id) => id,
            other => panic!("expected a finalized measurement, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_toggling() {
        let mut e = engine();
        assert_eq!(e.select_mode(Mode::Distance), Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        assert_eq!(e.buffered(), 1);

        // switching discards the half-built measurement
        assert_eq!(e.select_mode(Mode::Area), Mode::Area);
        assert_eq!(e.buffered(), 0);
        assert!(e.measurements().is_empty());

        // pressing the active tool again turns it off
        click(&mut e, 1.0, 0.0, 0.0);
        assert_eq!(e.select_mode(Mode::Area), Mode::Idle);
        assert_eq!(e.buffered(), 0);
        assert!(e.overlay().is_empty());
    }

    #[test]
    fn test_idle_ignores_clicks() {
        let mut e = engine();
        assert_eq!(click(&mut e, 1.0, 2.0, 3.0), Outcome::Unchanged);
        assert_eq!(e.buffered(), 0);
        assert!(e.overlay().is_empty());
    }

    #[test]
    fn test_distance_measurement_stays_in_mode() {
        let mut e = engine();
        e.set_model_scale(0.5).unwrap();
        e.select_mode(Mode::Distance);
        assert_eq!(click(&mut e, 0.0, 0.0, 0.0), Outcome::PointAdded { buffered: 1 });
        let id = finalized(click(&mut e, 3.0, 4.0, 0.0));

        let m = e.measurement(id).unwrap();
        assert_eq!(m.kind, MeasurementKind::Distance);
        // raw 5 * scale factor 1 / model scale 0.5
        assert!((m.value - 10.0).abs() < 1e-9);
        assert_eq!(m.label, "Distance 1");
        assert_eq!(e.mode(), Mode::Distance);
        assert_eq!(e.buffered(), 0);

        click(&mut e, 3.0, 4.0, 0.0);
        let id2 = finalized(click(&mut e, 0.0, 0.0, 0.0));
        let m2 = e.measurement(id2).unwrap();
        assert!((m2.value - 10.0).abs() < 1e-9);
        assert_eq!(m2.label, "Distance 2");
    }

    #[test]
    fn test_height_uses_vertical_only() {
        let mut e = engine();
        e.select_mode(Mode::Height);
        click(&mut e, 0.0, 0.0, 0.0);
        let id = finalized(click(&mut e, 5.0, 3.0, 5.0));
        assert!((e.measurement(id).unwrap().value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_area_closes_on_first_point() {
        let mut e = engine();
        e.select_mode(Mode::Area);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 4.0, 0.0, 0.0);
        assert_eq!(click(&mut e, 4.0, 0.0, 3.0), Outcome::PointAdded { buffered: 3 });
        let id = finalized(click(&mut e, 0.1, 0.0, 0.1));

        let m = e.measurement(id).unwrap();
        assert_eq!(m.points.len(), 3);
        assert!((m.value - 6.0).abs() < 1e-9);
        assert_eq!(m.display_value, "6.00 sq ft");
        assert_eq!(e.mode(), Mode::Area);
        assert_eq!(e.buffered(), 0);
    }

    #[test]
    fn test_area_needs_three_points_before_closing() {
        let mut e = engine();
        e.select_mode(Mode::Area);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 4.0, 0.0, 0.0);
        // near the first point, but only two corners so far
        assert_eq!(click(&mut e, 0.1, 0.0, 0.0), Outcome::PointAdded { buffered: 3 });
        // outside the tolerance keeps collecting
        assert_eq!(click(&mut e, 0.5, 0.0, 0.0), Outcome::PointAdded { buffered: 4 });
        assert!(e.measurements().is_empty());
    }

    #[test]
    fn test_area_preview_is_replaced() {
        let mut e = engine();
        e.select_mode(Mode::Area);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 1.0, 0.0, 0.0);
        click(&mut e, 1.0, 0.0, 1.0);
        // 3 markers + 2 preview segments
        assert_eq!(e.overlay().len(), 5);
        finalized(click(&mut e, 0.0, 0.0, 0.05));
        // polygon + label
        assert_eq!(e.overlay().len(), 2);
    }

    #[test]
    fn test_calibration() {
        let mut e = engine();
        e.set_model_scale(0.5).unwrap();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 2.0, 0.0, 0.0);
        let cal = e.calibrate(8.0).unwrap();
        assert!((cal.scale_factor() - 2.0).abs() < 1e-9);
        assert_eq!(e.mode(), Mode::Idle);
        assert_eq!(e.buffered(), 0);

        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        let id = finalized(click(&mut e, 2.0, 0.0, 0.0));
        assert!((e.measurement(id).unwrap().value - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_with_raw_distance_gives_model_scale() {
        let mut e = engine();
        e.set_model_scale(0.8).unwrap();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 1.0, 1.0, 1.0);
        click(&mut e, 4.0, 5.0, 1.0);
        let cal = e.calibrate(5.0).unwrap();
        assert!((cal.scale_factor() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_rejects_bad_input() {
        let mut e = engine();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 0.0, 0.0, 0.0);
        assert!(matches!(e.calibrate(3.0), Err(MeasureError::InvalidInput(_))));
        click(&mut e, 1.0, 0.0, 0.0);
        assert!(matches!(e.calibrate(0.0), Err(MeasureError::InvalidInput(_))));
        assert!(matches!(e.calibrate(-2.0), Err(MeasureError::InvalidInput(_))));
        assert!(matches!(e.calibrate(f64::NAN), Err(MeasureError::InvalidInput(_))));
        assert_eq!(*e.calibration(), Calibration::default());
        assert_eq!(e.buffered(), 2);
        assert_eq!(e.mode(), Mode::Calibrate);
    }

    #[test]
    fn test_calibrate_rejects_coincident_points() {
        let mut e = engine();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 1.0, 0.0, 0.0);
        click(&mut e, 1.0, 0.0, 0.0);
        assert!(e.calibrate(3.0).is_err());
        assert_eq!(*e.calibration(), Calibration::default());
    }

    #[test]
    fn test_calibrate_third_click_restarts_probe() {
        let mut e = engine();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 9.0, 0.0, 0.0);
        assert_eq!(click(&mut e, 0.0, 0.0, 0.0), Outcome::PointAdded { buffered: 1 });
        click(&mut e, 2.0, 0.0, 0.0);
        let cal = e.calibrate(4.0).unwrap();
        assert!((cal.scale_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_recalibration_is_not_retroactive() {
        let mut e = engine();
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        let id = finalized(click(&mut e, 1.0, 0.0, 0.0));

        e.select_mode(Mode::Calibrate);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 1.0, 0.0, 0.0);
        e.calibrate(3.0).unwrap();

        let m = e.measurement(id).unwrap();
        assert!((m.value - 1.0).abs() < 1e-9);
        assert_eq!(m.display_value, "1' 0\"");
    }

    #[test]
    fn test_rename() {
        let mut e = engine();
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        let id = finalized(click(&mut e, 1.0, 0.0, 0.0));

        let outcome = e
            .apply(Command::Rename {
                id,
                label: "North wall".into(),
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Renamed(id));
        assert_eq!(e.measurement(id).unwrap().label, "North wall");

        let e = reload(e);
        assert_eq!(e.measurement(id).unwrap().label, "North wall");
    }

    #[test]
    fn test_rename_unknown_is_noop() {
        let mut e = engine();
        assert!(!e.rename(MeasurementId::new_v4(), "ghost"));
        assert!(e.store().get("patagon.measurements").unwrap().is_none());
    }

    #[test]
    fn test_delete_removes_only_its_visuals() {
        let mut e = engine();
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        let first = finalized(click(&mut e, 1.0, 0.0, 0.0));
        click(&mut e, 0.0, 0.0, 0.0);
        let second = finalized(click(&mut e, 0.0, 0.0, 2.0));
        // line + label each
        assert_eq!(e.overlay().len(), 4);

        assert_eq!(e.apply(Command::Delete(first)).unwrap(), Outcome::Deleted(first));
        assert_eq!(e.measurements().len(), 1);
        assert_eq!(e.measurements()[0].id, second);
        assert_eq!(e.overlay().len(), 2);
        assert_eq!(e.overlay().labels().next().map(|(t, _)| t), Some("2' 0\""));
    }

    #[test]
    fn test_delete_unknown_leaves_list() {
        let mut e = engine();
        e.select_mode(Mode::Height);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 0.0, 1.0, 0.0));
        let before = e.measurements().to_vec();

        let outcome = e.apply(Command::Delete(MeasurementId::new_v4())).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(e.measurements(), before.as_slice());
    }

    #[test]
    fn test_clear_all_then_reload_is_empty() {
        let mut e = engine();
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 1.0, 0.0, 0.0));
        click(&mut e, 5.0, 0.0, 0.0);

        e.clear_all().unwrap();
        assert!(e.measurements().is_empty());
        assert_eq!(e.buffered(), 0);
        assert!(e.overlay().is_empty());

        let e = reload(e);
        assert!(e.measurements().is_empty());
    }

    #[test]
    fn test_clear_all_empty_is_empty_state() {
        let mut e = engine();
        assert!(matches!(e.clear_all(), Err(MeasureError::EmptyState(_))));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let mut e = engine();
        e.select_mode(Mode::Area);
        for (x, z) in [(0.0, 0.0), (3.0, 0.0), (3.0, 2.0), (0.0, 2.0), (0.0, 0.0)] {
            click(&mut e, x, 0.0, z);
        }
        assert_eq!(e.measurements().len(), 1);
        let before = e.measurements().to_vec();

        let e = reload(e);
        assert_eq!(e.measurements(), before.as_slice());
        // visuals are redrawn for restored measurements
        assert_eq!(e.overlay().len(), 2);
        assert!(matches!(
            e.overlay().get(0),
            Some(Visual::Polygon(points, _)) if points.len() == 4
        ));
    }

    #[test]
    fn test_calibration_survives_reload() {
        let mut e = engine();
        e.select_mode(Mode::Calibrate);
        click(&mut e, 0.0, 0.0, 0.0);
        click(&mut e, 1.0, 0.0, 0.0);
        e.calibrate(2.5).unwrap();

        let e = reload(e);
        assert!((e.calibration().scale_factor() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let mut store = MemoryStore::new();
        store.set("patagon.measurements", "{ definitely not").unwrap();
        store
            .set("patagon.calibration", r#"{"scaleFactor":0,"modelScale":1}"#)
            .unwrap();
        let mut e = MeasureEngine::new(SceneOverlay::new(), store, &ViewerConfig::default());
        assert!(e.measurements().is_empty());
        assert_eq!(*e.calibration(), Calibration::default());

        // still usable
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 1.0, 0.0, 0.0));
        assert_eq!(e.measurements().len(), 1);
    }

    #[test]
    fn test_export() {
        let mut e = engine();
        assert!(matches!(
            e.apply(Command::Export {
                project: "Kitchen".into()
            }),
            Err(MeasureError::EmptyState(_))
        ));

        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 4.0, 0.0, 0.0));
        e.select_mode(Mode::Height);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 0.0, 8.0, 0.0));

        let Outcome::Exported(report) = e
            .apply(Command::Export {
                project: "Kitchen".into(),
            })
            .unwrap()
        else {
            panic!("expected a report");
        };
        assert_eq!(report.project, "Kitchen");
        assert_eq!(report.measurements.len(), 2);
        assert!((report.summary.total_linear_ft - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_key_prefix() {
        let config = ViewerConfig {
            key_prefix: "casa".into(),
            ..ViewerConfig::default()
        };
        let mut e = MeasureEngine::new(SceneOverlay::new(), MemoryStore::new(), &config);
        e.select_mode(Mode::Distance);
        click(&mut e, 0.0, 0.0, 0.0);
        finalized(click(&mut e, 1.0, 0.0, 0.0));
        assert!(e.store().get("casa.measurements").unwrap().is_some());
        assert!(e.store().get("patagon.measurements").unwrap().is_none());
    }

    #[test]
    fn test_set_model_scale_validates() {
        let mut e = engine();
        assert!(e.apply(Command::SetModelScale(0.0)).is_err());
        assert!((e.calibration().model_scale() - 1.0).abs() < 1e-12);
        assert!(matches!(
            e.apply(Command::SetModelScale(0.25)),
            Ok(Outcome::Calibrated(cal)) if (cal.model_scale() - 0.25).abs() < 1e-12
        ));
    }

    /// Store that accepts no writes.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> MeasureResult<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> MeasureResult<()> {
            Err(MeasureError::storage("quota exceeded"))
        }
    }

    #[test]
    fn test_write_failures_do_not_stop_measuring() {
        let mut e = MeasureEngine::new(SceneOverlay::new(), ReadOnlyStore, &ViewerConfig::default());
        e.select_mode(Mode::Distance);
        e.add_point(MeasurementPoint::at(0.0, 0.0, 0.0)).unwrap();
        let outcome = e.add_point(MeasurementPoint::at(3.0, 0.0, 4.0)).unwrap();
        assert!(matches!(outcome, Outcome::Finalized(_)));
        assert_eq!(e.measurements().len(), 1);
        assert!((e.measurements()[0].value - 5.0).abs() < 1e-9);
        assert_eq!(e.mode(), Mode::Distance);
    }
}
