//! Traces every path of every pixel to completion in one dispatch.

use super::camera::Camera;
use super::device::Device;
use super::error::RenderError;
use super::output::Framebuffer;
use super::render::*;
use super::rng::*;
use super::scene::Scene;
use super::trace::*;
use super::types::*;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub struct MegakernelRenderer {
  device: Arc<Device>,
  settings: RenderSettings,
  progress: Option<Arc<AtomicUsize>>,
}

impl MegakernelRenderer {
  pub fn new(device: Arc<Device>, settings: RenderSettings) -> Result<MegakernelRenderer, RenderError> {
    settings.validate()?;
    Ok(MegakernelRenderer {
      device,
      settings,
      progress: None,
    })
  }

  pub fn with_progress(mut self, progress: Arc<AtomicUsize>) -> MegakernelRenderer {
    self.set_progress(progress);
    self
  }

  pub fn settings(&self) -> &RenderSettings {
    &self.settings
  }
}

impl Renderer for MegakernelRenderer {
  fn name(&self) -> &'static str {
    "megakernel"
  }

  fn set_progress(&mut self, progress: Arc<AtomicUsize>) {
    self.progress = Some(progress);
  }

  fn render_frame(&mut self, camera: &Camera, scene: &Scene) -> Result<RenderOutput, RenderError> {
    let s = self.settings;
    s.check_camera(camera)?;
    log::debug!(
      "Megakernel: {}x{}, {} samples, depth {}",
      s.width,
      s.height,
      s.sample_count,
      s.max_depth
    );

    let start = Instant::now();
    let ctx = RenderContext::new(scene);
    let ray_count = AtomicU64::new(0);
    let progress = self.progress.as_deref();
    let mut pixels = vec![Vec3f::zero(); s.pixel_count()];

    self.device.install(|| {
      pixels.par_iter_mut().enumerate().for_each(|(pixel, out)| {
        let pixel = pixel as u32;
        let (x, y) = (pixel % s.width, pixel / s.width);
        // One stream per sample slot, seeded like the wavefront lanes
        // tracing the same slots.
        let mut rngs: Vec<XorShift32> = (0..s.samples_per_run)
          .map(|slot| XorShift32::for_lane(pixel, slot, s.width * s.height))
          .collect();
        let mut rays = 0;
        let mut sum = Vec3f::zero();
        for sample in 0..s.sample_count {
          let rng = &mut rngs[(sample % s.samples_per_run) as usize];
          let RayState {
            mut ray,
            mut attenuation,
            mut radiance,
            ..
          } = camera.get_ray(x, y, rng);
          let mut color = Vec3f::zero();
          for _ in 0..=s.max_depth {
            rays += 1;
            if let Some(c) = trace_ray(&ctx, rng, &mut ray, &mut attenuation, &mut radiance) {
              color = c;
              break;
            }
          }
          sum += color;
        }
        *out = linear_to_gamma(sum / s.sample_count as f32);
        ray_count.fetch_add(rays, Ordering::Relaxed);
        if let Some(p) = progress {
          p.fetch_add(s.sample_count as usize, Ordering::Relaxed);
        }
      });
    });

    let stats = RenderStats {
      ray_count: ray_count.into_inner(),
      elapsed: start.elapsed(),
    };
    stats.log_report();
    Ok(RenderOutput {
      framebuffer: Framebuffer::new(s.width, s.height, pixels),
      stats,
    })
  }
}
