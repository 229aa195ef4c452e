//! Orbit camera: model rotation, dolly zoom, and the screen <-> scene mapping
//! used for picking and label placement.

use eframe::egui;
use nalgebra::{Matrix4, Point3, Translation3, UnitQuaternion, Vector3, Vector4};

use crate::picking::Ray;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub rotation: UnitQuaternion<f32>,
    /// Dolly factor: 1 = default distance, 2 = half the distance.
    pub zoom: f32,
    /// Largest model extent, scene units.
    pub extent: f32,
}

impl OrbitCamera {
    pub const ZOOM_RANGE: std::ops::RangeInclusive<f32> = 0.2..=20.0;

    #[must_use]
    pub fn new(extent: f32) -> Self {
        Self {
            rotation: Self::default_rotation(),
            zoom: 1.0,
            extent,
        }
    }

    /// Slightly from above so the floor is visible.
    #[must_use]
    pub fn default_rotation() -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(0.45, -0.6, 0.0)
    }

    /// Left-drag orbit.
    pub fn orbit(&mut self, delta: egui::Vec2) {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), delta.x * 0.01);
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), delta.y * 0.01);
        self.rotation = yaw * pitch * self.rotation;
    }

    /// Scroll-wheel dolly.
    pub fn dolly(&mut self, scroll: f32) {
        let (lo, hi) = (*Self::ZOOM_RANGE.start(), *Self::ZOOM_RANGE.end());
        self.zoom = (self.zoom * (1.0 + scroll * 0.001)).clamp(lo, hi);
    }

    /// Model-view-projection that keeps the whole model in front of the
    /// camera for the given viewport.
    #[must_use]
    pub fn mvp(&self, rect: egui::Rect) -> Matrix4<f32> {
        let radius = self.extent * 0.75;
        let eye = Point3::new(0.0, 0.0, radius * 3.0 / self.zoom);

        let aspect = rect.width() / rect.height().max(1.0);
        let proj = Matrix4::new_perspective(aspect, 60_f32.to_radians(), 0.1, 10_000.0);
        let view = Matrix4::look_at_rh(&eye, &Point3::origin(), &Vector3::y());
        // lift the room so its middle, not its floor, sits at the orbit center
        let lift = Translation3::new(0.0, -self.extent * 0.25, 0.0).to_homogeneous();
        let model = self.rotation.to_homogeneous() * lift;

        proj * view * model
    }

    /// Ray through a screen position, in model space.
    #[must_use]
    pub fn pointer_ray(&self, rect: egui::Rect, pos: egui::Pos2) -> Option<Ray> {
        let ndc_x = (pos.x - rect.left()) / rect.width() * 2.0 - 1.0;
        let ndc_y = 1.0 - (pos.y - rect.top()) / rect.height() * 2.0;
        Ray::from_ndc(&self.mvp(rect), ndc_x, ndc_y)
    }

    /// Screen position of a model-space point; `None` behind the camera.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn project(&self, rect: egui::Rect, p: &Point3<f64>) -> Option<egui::Pos2> {
        let clip = self.mvp(rect) * Vector4::new(p.x as f32, p.y as f32, p.z as f32, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some(egui::pos2(
            rect.left() + (ndc.x + 1.0) * 0.5 * rect.width(),
            rect.top() + (1.0 - ndc.y) * 0.5 * rect.height(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(200.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn test_pointer_ray_passes_through_projected_point() {
        let camera = OrbitCamera::new(10.0);
        let target = Point3::new(1.5, 0.0, -2.0);
        let screen = camera.project(viewport(), &target).unwrap();
        let ray = camera.pointer_ray(viewport(), screen).unwrap();

        // distance from target to the ray line
        let to_target = target - ray.origin;
        let along = to_target.dot(&ray.direction);
        let miss = (to_target - ray.direction * along).norm();
        assert!(miss < 1e-2, "ray misses target by {miss}");
        assert!(along > 0.0);
    }

    #[test]
    fn test_dolly_is_clamped() {
        let mut camera = OrbitCamera::new(10.0);
        camera.dolly(1.0e6);
        assert!((camera.zoom - 20.0).abs() < 1e-6);
        camera.dolly(-1.0e6);
        assert!((camera.zoom - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_orbit_changes_rotation() {
        let mut camera = OrbitCamera::new(10.0);
        let before = camera.rotation;
        camera.orbit(egui::vec2(40.0, 0.0));
        assert!(camera.rotation.angle_to(&before) > 0.1);
    }
}
