//! The scene rendered when no scene file is given.

use super::camera::*;
use super::error::SceneError;
use super::loader::DEFAULT_SKY_COLOR;
use super::materials::*;
use super::mesh::*;
use super::rng::*;
use super::scene::*;
use super::texture::*;
use super::types::*;
use image::{DynamicImage, Rgba, RgbaImage};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

const RING_SIZE: usize = 12;
const RING_RADIUS: f32 = 4.;

fn checker_image(tiles: u32) -> DynamicImage {
  let tile = IMAGE_SIZE / tiles;
  DynamicImage::ImageRgba8(RgbaImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
    if (x / tile + y / tile) % 2 == 0 {
      Rgba([230, 230, 230, 255])
    } else {
      Rgba([40, 60, 120, 255])
    }
  }))
}

/// Builds a small showcase: a ground plane, one cube of each material (the
/// same cube mesh instanced three times), an area light and a ring of small
/// random cubes placed with `seed`.
pub fn build(seed: u64) -> Result<Scene, SceneError> {
  let mut rng = SceneRng::seed_from_u64(seed);
  let mut b = SceneBuilder::new();

  let checker = b.images_mut().upload_image(&checker_image(8))?;
  let quad = b.add_mesh(MeshData::quad())?;
  let cube = b.add_mesh(MeshData::cube())?;
  let root = b.add_node(None, Mat4f::identity())?;

  let ground = b.add_node(
    Some(root),
    rotation_x(-FRAC_PI_2) * scaling(Vec3f::new(40., 40., 1.)),
  )?;
  b.add_instance(ground, quad, Material::diffuse(Vec3f::broadcast(0.5)))?;

  let textured = b.add_node(Some(root), translation(Vec3f::new(-2., 0.5, 0.)))?;
  b.add_instance(
    textured,
    cube,
    Material::diffuse(Texture::Image(checker)),
  )?;

  let glass = b.add_node(
    Some(root),
    translation(Vec3f::new(0., 0.5, 0.)) * rotation_y(FRAC_PI_4),
  )?;
  b.add_instance(glass, cube, Material::dielectric(1.5))?;

  let metal = b.add_node(Some(root), translation(Vec3f::new(2., 0.5, 0.)))?;
  b.add_instance(
    metal,
    cube,
    Material::metallic(Vec3f::new(0.7, 0.6, 0.5), 0.05),
  )?;

  // Faces down toward the cubes.
  let light = b.add_node(
    Some(root),
    translation(Vec3f::new(0., 3., 0.)) * rotation_x(FRAC_PI_2) * scaling(Vec3f::new(3., 1., 1.)),
  )?;
  b.add_instance(
    light,
    quad,
    Material::emissive(Vec3f::one(), Vec3f::new(1., 0.9, 0.8), 4.),
  )?;

  for i in 0..RING_SIZE {
    let angle = 2. * PI * (i as f32 + rng.gen_range(-0.2..0.2)) / RING_SIZE as f32;
    let size = rng.gen_range(0.2..0.45);
    let position = Vec3f::new(
      RING_RADIUS * angle.cos(),
      size / 2.,
      RING_RADIUS * angle.sin(),
    );
    let node = b.add_node(
      Some(root),
      translation(position) * rotation_y(rng.gen_range(0. ..PI)) * scaling(Vec3f::broadcast(size)),
    )?;
    let choose_mat = rng.gen::<f32>();
    let material = if choose_mat < 0.8 {
      Material::diffuse(Vec3f::new(
        rng.gen::<f32>() * rng.gen::<f32>(),
        rng.gen::<f32>() * rng.gen::<f32>(),
        rng.gen::<f32>() * rng.gen::<f32>(),
      ))
    } else if choose_mat < 0.95 {
      Material::metallic(
        Vec3f::new(
          0.5 * (1. + rng.gen::<f32>()),
          0.5 * (1. + rng.gen::<f32>()),
          0.5 * (1. + rng.gen::<f32>()),
        ),
        0.5 * rng.gen::<f32>(),
      )
    } else {
      Material::dielectric(1.5)
    };
    b.add_instance(node, cube, material)?;
  }

  b.sky_color(DEFAULT_SKY_COLOR, 1.);
  b.camera(CameraPose::look_at(
    Vec3f::new(0., 2.5, 9.),
    Vec3f::new(0., 0.5, 0.),
    1. / (20f32.to_radians()).tan(),
  ));
  Ok(b.build())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hittable::*;
  use crate::trace::*;

  #[test]
  fn default_scene_is_reproducible() {
    let a = build(1).unwrap();
    let b = build(1).unwrap();
    assert_eq!(a.instance_count(), 5 + RING_SIZE);
    assert_eq!(a.bounds(), b.bounds());
    for i in 0..a.instance_count() as u32 {
      assert_eq!(a.geometry(i).material, b.geometry(i).material);
    }
  }

  #[test]
  fn camera_looks_at_the_glass_cube() {
    let scene = build(0).unwrap();
    let pose = scene.camera_pose().unwrap();
    let hit = scene
      .intersect(&Ray::new(pose.position, pose.direction))
      .unwrap();
    assert_eq!(scene.geometry(hit.instance_id).material, Material::dielectric(1.5));
  }

  #[test]
  fn light_faces_the_ground() {
    let scene = build(0).unwrap();
    let hit = scene
      .intersect(&Ray::new(Vec3f::new(0., 2., 0.), Vec3f::unit_y()))
      .unwrap();
    let g = scene.geometry(hit.instance_id);
    assert!(g.material.emitted().mag() > 0.);
    let n = g.normal_matrix * scene.mesh(g.mesh).normal_at(&hit);
    assert!(n.y < 0.);
  }

  #[test]
  fn paths_through_the_light_carry_its_emission() {
    let scene = build(0).unwrap();
    let ctx = RenderContext::new(&scene);
    let paths = 200;
    let mut lit = 0;
    for lane in 0..paths {
      let mut rng = XorShift32::for_lane(lane, 0, paths);
      let mut ray = Ray::new(Vec3f::new(0., 2., 0.), Vec3f::unit_y());
      let mut attenuation = Vec3f::one();
      let mut radiance = Vec3f::zero();
      for _ in 0..=10 {
        if let Some(color) = trace_ray(&ctx, &mut rng, &mut ray, &mut attenuation, &mut radiance) {
          // Anything that ends after touching the panel sees more than the sky.
          if color.x > DEFAULT_SKY_COLOR.x {
            lit += 1;
          }
          break;
        }
      }
      assert!(radiance.mag() > 0.);
    }
    assert!(lit > paths / 2, "only {} of {} paths were lit", lit, paths);
  }
}
