//! Pointer ray casting against the loaded model.

use csgrs::mesh::Mesh;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// A ray in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    /// Unit length.
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Normalizes `direction`; `None` for a zero direction.
    #[must_use]
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        let direction = direction.try_normalize(f64::EPSILON)?;
        Some(Self { origin, direction })
    }

    /// Unproject a pointer position given in normalized device coordinates
    /// (`-1..=1`, y up) through the inverse of the model-view-projection.
    #[must_use]
    pub fn from_ndc(mvp: &Matrix4<f32>, ndc_x: f32, ndc_y: f32) -> Option<Self> {
        let inv = mvp.try_inverse()?;
        let unproject = |z: f32| -> Option<Point3<f64>> {
            let p = inv * Vector4::new(ndc_x, ndc_y, z, 1.0);
            if p.w.abs() < f32::EPSILON {
                return None;
            }
            Some(Point3::new(
                f64::from(p.x / p.w),
                f64::from(p.y / p.w),
                f64::from(p.z / p.w),
            ))
        };
        let near = unproject(-1.0)?;
        let far = unproject(1.0)?;
        Self::new(near, far - near)
    }

    #[must_use]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// Nearest surface hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick {
    pub position: Point3<f64>,
    /// Index of the hit polygon in the source mesh.
    pub polygon: usize,
    /// Distance along the ray.
    pub distance: f64,
}

/// Something a pointer ray can hit.
pub trait Picker {
    fn cast_ray(&self, ray: &Ray) -> Option<Pick>;
}

/// Brute-force ray/triangle picker over a mesh snapshot.
#[derive(Debug, Clone, Default)]
pub struct ModelPicker {
    triangles: Vec<(usize, [Point3<f64>; 3])>,
}

impl ModelPicker {
    /// Fan-triangulate every polygon of `mesh`.
    #[must_use]
    pub fn from_mesh<S: Clone + Send + Sync + std::fmt::Debug>(mesh: &Mesh<S>) -> Self {
        let mut triangles = Vec::new();
        for (index, poly) in mesh.polygons.iter().enumerate() {
            let verts: Vec<Point3<f64>> = poly
                .vertices
                .iter()
                .map(|v| Point3::new(f64::from(v.pos.x), f64::from(v.pos.y), f64::from(v.pos.z)))
                .collect();
            if let Some((first, rest)) = verts.split_first() {
                for pair in rest.windows(2) {
                    triangles.push((index, [*first, pair[0], pair[1]]));
                }
            }
        }
        Self { triangles }
    }

    /// Picker over explicit triangles, tagged with their polygon index.
    #[must_use]
    pub fn from_triangles(triangles: Vec<(usize, [Point3<f64>; 3])>) -> Self {
        Self { triangles }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Picker for ModelPicker {
    fn cast_ray(&self, ray: &Ray) -> Option<Pick> {
        self.triangles
            .iter()
            .filter_map(|(polygon, tri)| {
                intersect_triangle(ray, tri).map(|distance| Pick {
                    position: ray.at(distance),
                    polygon: *polygon,
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Möller–Trumbore; two-sided. Returns the hit distance along the ray.
fn intersect_triangle(ray: &Ray, [a, b, c]: &[Point3<f64>; 3]) -> Option<f64> {
    const EPS: f64 = 1e-9;
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv_det;
    (t > EPS).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_picker() -> ModelPicker {
        // 2x2 floor quad at y = 0 as two triangles of polygon 7
        let a = Point3::new(-1.0, 0.0, -1.0);
        let b = Point3::new(1.0, 0.0, -1.0);
        let c = Point3::new(1.0, 0.0, 1.0);
        let d = Point3::new(-1.0, 0.0, 1.0);
        ModelPicker::from_triangles(vec![(7, [a, b, c]), (7, [a, c, d])])
    }

    #[test]
    fn test_hits_floor_from_above() {
        let ray = Ray::new(Point3::new(0.5, 3.0, 0.25), -Vector3::y()).unwrap();
        let hit = floor_picker().cast_ray(&ray).unwrap();
        assert_eq!(hit.polygon, 7);
        assert!((hit.distance - 3.0).abs() < 1e-9);
        assert!((hit.position - Point3::new(0.5, 0.0, 0.25)).norm() < 1e-9);
    }

    #[test]
    fn test_misses() {
        let picker = floor_picker();
        let outside = Ray::new(Point3::new(5.0, 3.0, 0.0), -Vector3::y()).unwrap();
        assert!(picker.cast_ray(&outside).is_none());
        let away = Ray::new(Point3::new(0.0, 3.0, 0.0), Vector3::y()).unwrap();
        assert!(picker.cast_ray(&away).is_none());
        let parallel = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()).unwrap();
        assert!(picker.cast_ray(&parallel).is_none());
    }

    #[test]
    fn test_nearest_hit_wins() {
        let tri = |y: f64, polygon: usize| {
            (
                polygon,
                [
                    Point3::new(-1.0, y, -1.0),
                    Point3::new(1.0, y, -1.0),
                    Point3::new(0.0, y, 1.0),
                ],
            )
        };
        let picker = ModelPicker::from_triangles(vec![tri(0.0, 0), tri(2.0, 1)]);
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), -Vector3::y()).unwrap();
        assert_eq!(picker.cast_ray(&ray).unwrap().polygon, 1);
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_none());
    }

    #[test]
    fn test_from_ndc_identity() {
        let ray = Ray::from_ndc(&Matrix4::identity(), 0.25, -0.5).unwrap();
        assert!((ray.origin - Point3::new(0.25, -0.5, -1.0)).norm() < 1e-6);
        assert!((ray.direction - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_from_mesh_fans_polygons() {
        let cube = Mesh::<()>::cuboid(1.0, 1.0, 1.0, None);
        let picker = ModelPicker::from_mesh(&cube);
        assert_eq!(picker.triangle_count(), 12);

        let ray = Ray::new(Point3::new(0.5, 0.5, 5.0), -Vector3::z()).unwrap();
        let hit = picker.cast_ray(&ray).unwrap();
        assert!((hit.position.z - 1.0).abs() < 1e-9);
    }
}
