//! Triangle meshes in object space.

use super::acceleration::*;
use super::error::SceneError;
use super::fp::*;
use super::hittable::*;
use super::types::*;

/// Handle to a mesh owned by a `Scene`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) u32);

impl MeshId {
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

/// Indexed triangle list with one normal and one texture coordinate per
/// position.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
  pub positions: Vec<Vec3f>,
  pub normals: Vec<Vec3f>,
  pub uvs: Vec<Vec2f>,
  pub indices: Vec<u32>,
}

impl MeshData {
  /// A unit square in the XY plane facing +Z, centered on the origin.
  pub fn quad() -> MeshData {
    MeshData {
      positions: vec![
        Vec3f::new(-0.5, -0.5, 0.),
        Vec3f::new(0.5, -0.5, 0.),
        Vec3f::new(0.5, 0.5, 0.),
        Vec3f::new(-0.5, 0.5, 0.),
      ],
      normals: vec![Vec3f::unit_z(); 4],
      uvs: vec![
        Vec2f::new(0., 1.),
        Vec2f::new(1., 1.),
        Vec2f::new(1., 0.),
        Vec2f::new(0., 0.),
      ],
      indices: vec![0, 1, 2, 0, 2, 3],
    }
  }

  /// A unit cube centered on the origin with flat faces, each face mapped
  /// to the whole texture.
  pub fn cube() -> MeshData {
    let mut data = MeshData::default();
    let axes = [
      (Vec3f::unit_x(), Vec3f::unit_y()),
      (-Vec3f::unit_x(), Vec3f::unit_y()),
      (Vec3f::unit_y(), Vec3f::unit_z()),
      (-Vec3f::unit_y(), Vec3f::unit_z()),
      (Vec3f::unit_z(), Vec3f::unit_y()),
      (-Vec3f::unit_z(), Vec3f::unit_y()),
    ];
    for (normal, up) in axes {
      let right = up.cross(normal);
      let base = data.positions.len() as u32;
      let center = normal * 0.5;
      for (s, t) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
        data.positions.push(center + right * s + up * t);
        data.normals.push(normal);
        data.uvs.push(Vec2f::new(s + 0.5, 0.5 - t));
      }
      data.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    data
  }

  pub fn validate(&self) -> Result<(), SceneError> {
    if self.normals.len() != self.positions.len() {
      return Err(SceneError::MissingAttribute("normal"));
    }
    if self.uvs.len() != self.positions.len() {
      return Err(SceneError::MissingAttribute("texcoord"));
    }
    if self.indices.len() % 3 != 0 {
      return Err(SceneError::InvalidIndexCount(self.indices.len()));
    }
    if let Some(&index) = self
      .indices
      .iter()
      .find(|&&i| i as usize >= self.positions.len())
    {
      return Err(SceneError::IndexOutOfRange {
        index,
        count: self.positions.len(),
      });
    }
    Ok(())
  }
}

/// A validated mesh with its own bounding volume hierarchy. Instances share
/// the mesh and intersect it in object space.
pub struct Mesh {
  data: MeshData,
  bvh: Bvh,
}

impl Mesh {
  pub fn new(data: MeshData) -> Result<Mesh, SceneError> {
    data.validate()?;
    let bounds: Vec<Aabb> = data
      .indices
      .chunks_exact(3)
      .map(|tri| {
        Aabb::from_points(&[
          data.positions[tri[0] as usize],
          data.positions[tri[1] as usize],
          data.positions[tri[2] as usize],
        ])
      })
      .collect();
    let bvh = Bvh::build(&bounds);
    Ok(Mesh { data, bvh })
  }

  pub fn triangle_count(&self) -> usize {
    self.data.indices.len() / 3
  }

  pub fn data(&self) -> &MeshData {
    &self.data
  }

  #[inline]
  pub fn triangle(&self, primitive: u32) -> [usize; 3] {
    let i = primitive as usize * 3;
    let idx = &self.data.indices;
    [idx[i] as usize, idx[i + 1] as usize, idx[i + 2] as usize]
  }

  /// Interpolated, normalized object-space normal at a hit.
  #[inline]
  pub fn normal_at(&self, hit: &Hit) -> Vec3f {
    let [a, b, c] = self.triangle(hit.primitive_id);
    let n = &self.data.normals;
    hit.interpolate(n[a], n[b], n[c]).normalized()
  }

  #[inline]
  pub fn uv_at(&self, hit: &Hit) -> Vec2f {
    let [a, b, c] = self.triangle(hit.primitive_id);
    let uv = &self.data.uvs;
    hit.interpolate(uv[a], uv[b], uv[c])
  }
}

impl Hittable for Mesh {
  fn intersect(&self, ray: &Ray) -> Option<Hit> {
    self.bvh.intersect(ray, |primitive, ray| {
      let [a, b, c] = self.triangle(primitive);
      let p = &self.data.positions;
      let (t, u, v) = intersect_triangle(ray, p[a], p[b], p[c])?;
      Some(Hit {
        instance_id: 0,
        primitive_id: primitive,
        u,
        v,
        t,
      })
    })
  }

  fn bounds(&self) -> Aabb {
    self.bvh.bounds()
  }
}

/// Möller-Trumbore ray/triangle test. Both sides of the triangle are hit.
/// Returns `(t, u, v)` for hits with `t` in `(tnear, tfar)`.
#[inline]
pub fn intersect_triangle(ray: &Ray, v0: Vec3f, v1: Vec3f, v2: Vec3f) -> Option<(f32, f32, f32)> {
  let e1 = v1 - v0;
  let e2 = v2 - v0;
  let p = ray.direction.cross(e2);
  let det = e1.dot(p);
  if det.abs() < PARALLEL_EPSILON {
    return None;
  }
  let inv_det = 1. / det;
  let s = ray.origin - v0;
  let u = s.dot(p) * inv_det;
  if !(0. ..=1.).contains(&u) {
    return None;
  }
  let q = s.cross(e1);
  let v = ray.direction.dot(q) * inv_det;
  if v < 0. || u + v > 1. {
    return None;
  }
  let t = e2.dot(q) * inv_det;
  if t > ray.tnear && t < ray.tfar {
    Some((t, u, v))
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn triangle_hit_reports_barycentrics() {
    let ray = Ray::new(Vec3f::new(0.25, 0.25, 1.), Vec3f::new(0., 0., -1.));
    let (t, u, v) = intersect_triangle(
      &ray,
      Vec3f::zero(),
      Vec3f::unit_x(),
      Vec3f::unit_y(),
    )
    .unwrap();
    assert!((t - 1.).abs() < 1e-6);
    assert!((u - 0.25).abs() < 1e-6);
    assert!((v - 0.25).abs() < 1e-6);
  }

  #[test]
  fn triangles_are_two_sided() {
    let ray = Ray::new(Vec3f::new(0.25, 0.25, -1.), Vec3f::new(0., 0., 1.));
    assert!(intersect_triangle(&ray, Vec3f::zero(), Vec3f::unit_x(), Vec3f::unit_y()).is_some());
  }

  #[test]
  fn triangle_respects_ray_interval() {
    let mut ray = Ray::new(Vec3f::new(0.25, 0.25, 1.), Vec3f::new(0., 0., -1.));
    ray.tfar = 0.5;
    assert!(intersect_triangle(&ray, Vec3f::zero(), Vec3f::unit_x(), Vec3f::unit_y()).is_none());
    let ray = Ray::continued(Vec3f::new(0.25, 0.25, 0.), Vec3f::new(0., 0., -1.));
    assert!(intersect_triangle(&ray, Vec3f::zero(), Vec3f::unit_x(), Vec3f::unit_y()).is_none());
  }

  #[test]
  fn validation_rejects_broken_meshes() {
    let mut data = MeshData::quad();
    data.indices.push(0);
    assert!(matches!(data.validate(), Err(SceneError::InvalidIndexCount(7))));

    let mut data = MeshData::quad();
    data.indices[5] = 9;
    assert!(matches!(
      data.validate(),
      Err(SceneError::IndexOutOfRange { index: 9, count: 4 })
    ));

    let mut data = MeshData::quad();
    data.normals.clear();
    assert!(matches!(data.validate(), Err(SceneError::MissingAttribute("normal"))));

    let mut data = MeshData::quad();
    data.uvs.pop();
    assert!(matches!(data.validate(), Err(SceneError::MissingAttribute("texcoord"))));
  }

  #[test]
  fn cube_faces_point_outward() {
    let data = MeshData::cube();
    data.validate().unwrap();
    assert_eq!(data.indices.len(), 36);
    for (p, n) in data.positions.iter().zip(&data.normals) {
      assert!((p.dot(*n) - 0.5).abs() < 1e-6);
    }
  }

  #[test]
  fn mesh_hit_interpolates_attributes() {
    let mesh = Mesh::new(MeshData::cube()).unwrap();
    let ray = Ray::new(Vec3f::new(0.1, 0.2, 5.), Vec3f::new(0., 0., -1.));
    let hit = mesh.intersect(&ray).unwrap();
    assert!((hit.t - 4.5).abs() < 1e-5);
    assert!((mesh.normal_at(&hit) - Vec3f::unit_z()).mag() < 1e-5);
    let uv = mesh.uv_at(&hit);
    assert!((uv - Vec2f::new(0.6, 0.3)).mag() < 1e-5);
  }
}
