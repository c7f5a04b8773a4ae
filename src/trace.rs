//! The single bounce transition shared by both renderers.

use super::hittable::*;
use super::rng::*;
use super::scene::*;
use super::types::*;

/// Read-only state every lane needs to trace.
#[derive(Clone, Copy)]
pub struct RenderContext<'scene> {
  pub scene: &'scene Scene,
  pub sky_color: Vec3f,
}

impl<'scene> RenderContext<'scene> {
  pub fn new(scene: &'scene Scene) -> RenderContext<'scene> {
    RenderContext {
      scene,
      sky_color: scene.sky_color(),
    }
  }
}

/// Advances a path by one bounce.
///
/// Returns `None` when the path continues; `ray` and `attenuation` then
/// describe the next segment. Returns the final contribution of the path when
/// it escapes to the sky or is absorbed. Emission of surfaces along the way is
/// gathered into `radiance` and only paid out when the path ends.
#[inline]
pub fn trace_ray(
  ctx: &RenderContext,
  rng: &mut XorShift32,
  ray: &mut Ray,
  attenuation: &mut Vec3f,
  radiance: &mut Vec3f,
) -> Option<Vec3f> {
  let hit = match ctx.scene.intersect(ray) {
    Some(hit) => hit,
    None => return Some(*attenuation * (ctx.sky_color + *radiance)),
  };

  let geometry = ctx.scene.geometry(hit.instance_id);
  let mesh = ctx.scene.mesh(geometry.mesh);
  let uv = mesh.uv_at(&hit);
  let normal = (geometry.normal_matrix * mesh.normal_at(&hit)).normalized();
  let dir = ray.direction.normalized();

  *radiance += geometry.material.emitted();

  match geometry
    .material
    .scatter(ctx.scene.images(), rng, dir, normal, uv)
  {
    Some(scattered) => {
      *ray = Ray::continued(ray.point_at(hit.t), scattered.dir);
      *attenuation = *attenuation * scattered.attenuation;
      None
    }
    None => Some(*attenuation * *radiance),
  }
}
