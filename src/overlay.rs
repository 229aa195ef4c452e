//! Visual feedback drawn over the model: probe markers, measurement lines,
//! area outlines and text labels.
//!
//! The engine only talks to the [`Overlay`] trait and keeps the returned
//! handles so a single measurement can be taken off screen again.
//! [`SceneOverlay`] is the viewer's implementation; it turns everything into
//! colored line segments for the GL renderer and keeps labels for egui.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

/// Handle of one drawn item.
pub type VisualId = u64;

/// Linear RGB, 0..=1.
pub type Rgb = [f32; 3];

pub const MARKER_COLOR: Rgb = [1.0, 0.27, 0.27];
pub const DISTANCE_COLOR: Rgb = [0.2, 0.85, 0.4];
pub const HEIGHT_COLOR: Rgb = [0.3, 0.6, 1.0];
pub const AREA_COLOR: Rgb = [1.0, 0.6, 0.1];
pub const PREVIEW_COLOR: Rgb = [1.0, 0.9, 0.3];
pub const PROBE_COLOR: Rgb = [0.9, 0.3, 0.9];

/// Half-size of a marker cross, in scene units.
const MARKER_SIZE: f64 = 0.08;

/// Scene-side drawing operations the measurement engine needs.
pub trait Overlay {
    fn add_marker(&mut self, pos: Point3<f64>) -> VisualId;
    fn add_line(&mut self, a: Point3<f64>, b: Point3<f64>, color: Rgb) -> VisualId;
    fn add_polygon(&mut self, points: &[Point3<f64>], color: Rgb) -> VisualId;
    fn add_label(&mut self, text: &str, pos: Point3<f64>) -> VisualId;
    fn remove(&mut self, id: VisualId);
    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Marker(Point3<f64>),
    Line(Point3<f64>, Point3<f64>, Rgb),
    Polygon(Vec<Point3<f64>>, Rgb),
    Label(String, Point3<f64>),
}

/// Retained overlay for the egui/glow viewer.
#[derive(Debug, Default)]
pub struct SceneOverlay {
    visuals: BTreeMap<VisualId, Visual>,
    next_id: VisualId,
    revision: u64,
}

impl SceneOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, visual: Visual) -> VisualId {
        let id = self.next_id;
        self.next_id += 1;
        self.visuals.insert(id, visual);
        self.revision += 1;
        id
    }

    /// Bumped on every change; lets the renderer skip unchanged frames.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: VisualId) -> Option<&Visual> {
        self.visuals.get(&id)
    }

    /// Text labels with their anchor positions.
    pub fn labels(&self) -> impl Iterator<Item = (&str, Point3<f64>)> {
        self.visuals.values().filter_map(|v| match v {
            Visual::Label(text, pos) => Some((text.as_str(), *pos)),
            _ => None,
        })
    }

    /// Append every non-label visual as `xyz rgb` line vertices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_line_vertices(&self, out: &mut Vec<f32>) {
        let mut seg = |a: Point3<f64>, b: Point3<f64>, c: Rgb| {
            out.extend_from_slice(&[
                a.x as f32, a.y as f32, a.z as f32, c[0], c[1], c[2],
                b.x as f32, b.y as f32, b.z as f32, c[0], c[1], c[2],
            ]);
        };
        for visual in self.visuals.values() {
            match visual {
                Visual::Marker(p) => {
                    for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
                        let d = axis * MARKER_SIZE;
                        seg(p - d, p + d, MARKER_COLOR);
                    }
                }
                Visual::Line(a, b, c) => seg(*a, *b, *c),
                Visual::Polygon(points, c) => {
                    for (i, a) in points.iter().enumerate() {
                        let b = points[(i + 1) % points.len()];
                        seg(*a, b, *c);
                    }
                }
                Visual::Label(..) => {}
            }
        }
    }
}

impl Overlay for SceneOverlay {
    fn add_marker(&mut self, pos: Point3<f64>) -> VisualId {
        self.insert(Visual::Marker(pos))
    }

    fn add_line(&mut self, a: Point3<f64>, b: Point3<f64>, color: Rgb) -> VisualId {
        self.insert(Visual::Line(a, b, color))
    }

    fn add_polygon(&mut self, points: &[Point3<f64>], color: Rgb) -> VisualId {
        self.insert(Visual::Polygon(points.to_vec(), color))
    }

    fn add_label(&mut self, text: &str, pos: Point3<f64>) -> VisualId {
        self.insert(Visual::Label(text.to_owned(), pos))
    }

    fn remove(&mut self, id: VisualId) {
        if self.visuals.remove(&id).is_some() {
            self.revision += 1;
        }
    }

    fn clear(&mut self) {
        if !self.visuals.is_empty() {
            self.visuals.clear();
            self.revision += 1;
        }
    }
}
