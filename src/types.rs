// Provides basic types.

use super::fp::*;
use ultraviolet;

pub type Vec2f = ultraviolet::Vec2;
pub type Vec3f = ultraviolet::Vec3;
pub type Vec4f = ultraviolet::Vec4;
pub type Mat3f = ultraviolet::Mat3;
pub type Mat4f = ultraviolet::Mat4;

/// A ray segment. Only the part of the ray in `(tnear, tfar)` can hit
/// anything.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
  pub origin: Vec3f,
  pub direction: Vec3f,
  pub tnear: f32,
  pub tfar: f32,
}

impl Ray {
  pub fn new(origin: Vec3f, direction: Vec3f) -> Ray {
    Ray {
      origin,
      direction,
      tnear: 0.,
      tfar: f32::INFINITY,
    }
  }

  /// Makes a ray leaving a surface. The `RAY_EPSILON` near distance keeps
  /// it from hitting the surface it starts on.
  pub fn continued(origin: Vec3f, direction: Vec3f) -> Ray {
    Ray {
      origin,
      direction,
      tnear: RAY_EPSILON,
      tfar: f32::INFINITY,
    }
  }

  pub fn point_at(&self, t: f32) -> Vec3f {
    self.origin + (t * self.direction)
  }

  pub fn inv_direction(&self) -> Vec3f {
    Vec3f::one() / self.direction
  }
}

/// A ray in flight together with the state of the path it belongs to.
///
/// `id` correlates the ray with its pixel and sample slot, `attenuation` is
/// the product of all albedos along the path and `radiance` the emission
/// gathered so far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayState {
  pub id: u32,
  pub ray: Ray,
  pub attenuation: Vec3f,
  pub radiance: Vec3f,
}

impl Default for RayState {
  fn default() -> RayState {
    RayState {
      id: 0,
      ray: Ray::new(Vec3f::zero(), Vec3f::zero()),
      attenuation: Vec3f::one(),
      radiance: Vec3f::zero(),
    }
  }
}

pub trait VectorExt {
  /// True if the vector is close to zero in all dimensions.
  fn near_zero(&self) -> bool;

  /// Mirrors the vector about `normal`.
  fn reflected(&self, normal: Self) -> Self;

  /// Refracts a unit vector through a surface with unit `normal`.
  /// `eta` is the ratio of the refractive indices.
  fn refracted(&self, normal: Self, eta: f32) -> Self;

  fn clamped01(&self) -> Self;
}

impl VectorExt for Vec3f {
  #[inline]
  fn near_zero(&self) -> bool {
    self.x.abs() < NEAR_ZERO && self.y.abs() < NEAR_ZERO && self.z.abs() < NEAR_ZERO
  }

  #[inline]
  fn reflected(&self, normal: Vec3f) -> Vec3f {
    *self - 2. * self.dot(normal) * normal
  }

  #[inline]
  fn refracted(&self, normal: Vec3f, eta: f32) -> Vec3f {
    let cos_theta = (-*self).dot(normal).min(1.);
    let r_out_perp = eta * (*self + cos_theta * normal);
    let r_out_parallel = -(1. - r_out_perp.mag_sq()).abs().sqrt() * normal;
    r_out_perp + r_out_parallel
  }

  #[inline]
  fn clamped01(&self) -> Vec3f {
    Vec3f::new(
      self.x.clamp(0., 1.),
      self.y.clamp(0., 1.),
      self.z.clamp(0., 1.),
    )
  }
}

/// Transforms a point by an affine matrix.
#[inline]
pub fn transform_point(m: &Mat4f, p: Vec3f) -> Vec3f {
  let r = *m * Vec4f::new(p.x, p.y, p.z, 1.);
  Vec3f::new(r.x, r.y, r.z) / r.w
}

/// Transforms a direction by an affine matrix, ignoring translation.
#[inline]
pub fn transform_vector(m: &Mat4f, v: Vec3f) -> Vec3f {
  let r = *m * Vec4f::new(v.x, v.y, v.z, 0.);
  Vec3f::new(r.x, r.y, r.z)
}

/// Upper-left 3x3 block of `m`.
pub fn linear_part(m: &Mat4f) -> Mat3f {
  let c = &m.cols;
  Mat3f::new(
    Vec3f::new(c[0].x, c[0].y, c[0].z),
    Vec3f::new(c[1].x, c[1].y, c[1].z),
    Vec3f::new(c[2].x, c[2].y, c[2].z),
  )
}

/// The matrix that carries object-space normals to world space.
pub fn normal_matrix(obj_to_world: &Mat4f) -> Mat3f {
  linear_part(obj_to_world).inversed().transposed()
}

pub fn translation(offset: Vec3f) -> Mat4f {
  Mat4f::new(
    Vec4f::new(1., 0., 0., 0.),
    Vec4f::new(0., 1., 0., 0.),
    Vec4f::new(0., 0., 1., 0.),
    Vec4f::new(offset.x, offset.y, offset.z, 1.),
  )
}

pub fn scaling(factors: Vec3f) -> Mat4f {
  Mat4f::new(
    Vec4f::new(factors.x, 0., 0., 0.),
    Vec4f::new(0., factors.y, 0., 0.),
    Vec4f::new(0., 0., factors.z, 0.),
    Vec4f::new(0., 0., 0., 1.),
  )
}

/// Rotation around the X axis by `angle` radians.
pub fn rotation_x(angle: f32) -> Mat4f {
  let (s, c) = angle.sin_cos();
  Mat4f::new(
    Vec4f::new(1., 0., 0., 0.),
    Vec4f::new(0., c, s, 0.),
    Vec4f::new(0., -s, c, 0.),
    Vec4f::new(0., 0., 0., 1.),
  )
}

/// Rotation around the Y axis by `angle` radians.
pub fn rotation_y(angle: f32) -> Mat4f {
  let (s, c) = angle.sin_cos();
  Mat4f::new(
    Vec4f::new(c, 0., -s, 0.),
    Vec4f::new(0., 1., 0., 0.),
    Vec4f::new(s, 0., c, 0.),
    Vec4f::new(0., 0., 0., 1.),
  )
}

// The book uses a simple gamma 2.0 function, not the sRGB OETF.
#[inline]
pub fn linear_to_gamma(c: Vec3f) -> Vec3f {
  Vec3f::new(
    c.x.max(0.).sqrt(),
    c.y.max(0.).sqrt(),
    c.z.max(0.).sqrt(),
  )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
  X = 0,
  Y,
  Z,
}

impl Axis {
  pub fn of(v: Vec3f, axis: Axis) -> f32 {
    match axis {
      Axis::X => v.x,
      Axis::Y => v.y,
      Axis::Z => v.z,
    }
  }
}
