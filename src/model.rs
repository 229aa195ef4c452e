//! Room model import and normalization.
//!
//! Imported meshes are z-up (as STL/DXF exports and `csgrs` are); the viewer
//! and the measurement math are y-up, so models are turned upright here.

use csgrs::mesh::Mesh;
use csgrs::traits::CSG;
use nalgebra::Vector3;

/// A model ready for display and picking.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub mesh: Mesh<()>,
    /// Uniform factor applied to the source geometry.
    pub scale: f64,
}

/// Parse STL, then DXF.
pub fn parse_mesh(bytes: &[u8]) -> anyhow::Result<Mesh<()>> {
    if let Ok(mesh) = Mesh::<()>::from_stl(bytes, None) {
        return Ok(mesh);
    }
    match Mesh::<()>::from_dxf(bytes, None) {
        Ok(mesh) => Ok(mesh),
        Err(e) => anyhow::bail!("not a readable STL or DXF file ({e})"),
    }
}

/// Size of the mesh's bounding box, `None` for an empty mesh.
#[must_use]
pub fn extents(mesh: &Mesh<()>) -> Option<Vector3<f64>> {
    let mut points = mesh
        .polygons
        .iter()
        .flat_map(|p| p.vertices.iter())
        .map(|v| Vector3::new(f64::from(v.pos.x), f64::from(v.pos.y), f64::from(v.pos.z)));
    let first = points.next()?;
    let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
    Some(max - min)
}

/// Center on the origin, rest on the floor, turn y-up, and scale uniformly
/// so the largest extent equals `target_extent`.
pub fn normalize(mesh: Mesh<()>, target_extent: f64) -> anyhow::Result<LoadedModel> {
    let size = extents(&mesh).ok_or_else(|| anyhow::anyhow!("model has no geometry"))?;
    let largest = size.max();
    if !(largest.is_finite() && largest > 0.0) {
        anyhow::bail!("model is flat or degenerate");
    }
    let scale = target_extent / largest;
    let mesh = mesh
        .center()
        .float()
        .rotate(-90.0, 0.0, 0.0)
        .scale(scale, scale, scale);
    log::debug!("model normalized: extent {largest:.3} -> {target_extent}, scale {scale:.5}");
    Ok(LoadedModel { mesh, scale })
}

/// Parse and normalize in one go.
pub fn load(bytes: &[u8], target_extent: f64) -> anyhow::Result<LoadedModel> {
    normalize(parse_mesh(bytes)?, target_extent)
}

/// A 12 x 10 ft kitchen shell: floor, two walls and a counter, in feet.
#[must_use]
pub fn demo_room() -> Mesh<()> {
    let floor = Mesh::cuboid(12.0, 10.0, 0.1, None);
    let back_wall = Mesh::cuboid(12.0, 0.3, 8.0, None).translate(0.0, 10.0, 0.0);
    let side_wall = Mesh::cuboid(0.3, 10.0, 8.0, None).translate(-0.3, 0.0, 0.0);
    let counter = Mesh::cuboid(8.0, 2.0, 3.0, None).translate(2.0, 8.0, 0.1);
    floor.union(&back_wall).union(&side_wall).union(&counter)
}
