use super::acceleration::*;
use super::types::*;

/// Nearest intersection along a ray. `u` and `v` are the barycentric weights
/// of the second and third triangle vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
  pub instance_id: u32,
  pub primitive_id: u32,
  pub u: f32,
  pub v: f32,
  pub t: f32,
}

impl Hit {
  /// Interpolates per-vertex attributes of the hit triangle.
  #[inline]
  pub fn interpolate<T>(&self, a: T, b: T, c: T) -> T
  where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
  {
    a * (1. - self.u - self.v) + b * self.u + c * self.v
  }
}

pub trait Hittable {
  /// Finds the nearest hit with `t` in `(ray.tnear, ray.tfar)`.
  fn intersect(&self, ray: &Ray) -> Option<Hit>;
  fn bounds(&self) -> Aabb;
}
