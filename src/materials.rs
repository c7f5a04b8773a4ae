use super::rng::*;
use super::texture::*;
use super::types::*;

pub struct ScatterResult {
  pub dir: Vec3f,
  pub attenuation: Vec3f,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
  Diffuse { albedo: Texture, emissive: Vec3f },
  Metallic { albedo: Texture, roughness: f32 },
  Dielectric { ior: f32 },
}

impl Material {
  pub fn diffuse(albedo: impl Into<Texture>) -> Material {
    Material::Diffuse {
      albedo: albedo.into(),
      emissive: Vec3f::zero(),
    }
  }

  pub fn emissive(albedo: impl Into<Texture>, color: Vec3f, strength: f32) -> Material {
    Material::Diffuse {
      albedo: albedo.into(),
      emissive: color * strength,
    }
  }

  pub fn metallic(albedo: impl Into<Texture>, roughness: f32) -> Material {
    Material::Metallic {
      albedo: albedo.into(),
      roughness,
    }
  }

  pub fn dielectric(ior: f32) -> Material {
    Material::Dielectric { ior }
  }

  /// Radiance leaving the surface on its own. Only diffuse surfaces emit.
  #[inline]
  pub fn emitted(&self) -> Vec3f {
    match self {
      Material::Diffuse { emissive, .. } => *emissive,
      _ => Vec3f::zero(),
    }
  }

  /// Scatters a ray arriving along the unit direction `dir` at a surface
  /// with unit world normal `normal`. Returns `None` when the ray is
  /// absorbed.
  #[inline]
  pub fn scatter(
    &self,
    images: &ImageArray,
    rng: &mut XorShift32,
    dir: Vec3f,
    normal: Vec3f,
    uv: Vec2f,
  ) -> Option<ScatterResult> {
    match self {
      Material::Diffuse { albedo, .. } => {
        let new_dir = normal + Vec3f::gen_random_unit(rng);
        Some(ScatterResult {
          dir: if new_dir.near_zero() { normal } else { new_dir },
          attenuation: albedo.sample(images, uv),
        })
      }
      Material::Metallic { albedo, roughness } => {
        let new_dir = dir.normalized().reflected(normal)
          + *roughness * Vec3f::gen_random_unit(rng);
        if new_dir.dot(normal) > 0. {
          Some(ScatterResult {
            dir: new_dir,
            attenuation: albedo.sample(images, uv),
          })
        } else {
          None
        }
      }
      Material::Dielectric { ior } => {
        let front_face = dir.dot(normal) < 0.;
        let (normal, refraction_ratio) = if front_face {
          (normal, 1. / ior)
        } else {
          (-normal, *ior)
        };

        let unit_direction = dir.normalized();
        let cos_theta = (-unit_direction).dot(normal).min(1.);
        let sin_theta = (1. - (cos_theta * cos_theta)).max(0.).sqrt();

        let cannot_refract = refraction_ratio * sin_theta > 1.;
        let new_dir = if cannot_refract
          || reflectance(cos_theta, refraction_ratio) > rng.next_f32()
        {
          unit_direction.reflected(normal)
        } else {
          unit_direction.refracted(normal, refraction_ratio)
        };

        Some(ScatterResult {
          dir: new_dir,
          attenuation: Vec3f::one(),
        })
      }
    }
  }
}

fn reflectance(cosine: f32, ref_idx: f32) -> f32 {
  // Use Schlick's approximation for reflectance.
  let r0 = ((1. - ref_idx) / (1. + ref_idx)).powf(2.);
  r0 + (1. - r0) * (1. - cosine).powf(5.)
}
