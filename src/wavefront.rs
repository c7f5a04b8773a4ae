//! Traces paths one bounce at a time over a compacted stream of live rays.
//!
//! Every depth is a separate dispatch that consumes the rays left by the
//! previous depth. Rays that end write their color and drop out; survivors
//! are packed densely into the other stream. Packing is done in two levels:
//! a work-group gathers its survivors in local memory, then reserves room for
//! all of them with a single atomic add on the stream length.

use super::buffers::*;
use super::camera::Camera;
use super::device::*;
use super::error::RenderError;
use super::output::Framebuffer;
use super::render::*;
use super::scene::Scene;
use super::trace::*;
use super::types::*;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lanes per work-group.
pub const LOCAL_SIZE: usize = 32;

/// What one depth step did with its input rays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShootStats {
  pub consumed: usize,
  pub terminated: usize,
  pub survived: usize,
}

/// Per-group scratch, the counterpart of GPU shared memory.
struct LocalMemory {
  count: AtomicU32,
  rays: [RayState; LOCAL_SIZE],
  first_index: usize,
}

impl LocalMemory {
  fn new() -> LocalMemory {
    LocalMemory {
      count: AtomicU32::new(0),
      rays: [RayState::default(); LOCAL_SIZE],
      first_index: 0,
    }
  }
}

pub struct WavefrontRenderer {
  device: Arc<Device>,
  settings: RenderSettings,
  buffers: Buffers,
  colors: ColorBuffer,
  rngs: RngBuffer,
  accumulator: DeviceBuffer<Vec3f>,
  progress: Option<Arc<AtomicUsize>>,
}

impl WavefrontRenderer {
  pub fn new(device: Arc<Device>, settings: RenderSettings) -> Result<WavefrontRenderer, RenderError> {
    settings.validate_runs()?;
    let pixel_count = settings.pixel_count();
    let capacity = pixel_count * settings.samples_per_run as usize;
    log::debug!(
      "Wavefront: {} ray slots ({} pixels x {} samples per run)",
      capacity,
      pixel_count,
      settings.samples_per_run
    );
    Ok(WavefrontRenderer {
      device,
      settings,
      buffers: Buffers::new(capacity),
      colors: ColorBuffer::new(capacity),
      rngs: RngBuffer::new(pixel_count as u32, settings.samples_per_run),
      accumulator: DeviceBuffer::new(pixel_count),
      progress: None,
    })
  }

  pub fn with_progress(mut self, progress: Arc<AtomicUsize>) -> WavefrontRenderer {
    self.set_progress(progress);
    self
  }

  pub fn settings(&self) -> &RenderSettings {
    &self.settings
  }

  pub fn buffers(&self) -> &Buffers {
    &self.buffers
  }

  pub fn buffers_mut(&mut self) -> &mut Buffers {
    &mut self.buffers
  }

  /// Color written by the path with ray id `id` in the current run.
  pub fn sample_color(&mut self, id: u32) -> Vec3f {
    self.colors.as_mut_slice()[id as usize]
  }

  /// Fills the current stream with one camera ray per pixel and run slot
  /// and clears the run's colors.
  pub fn generate_camera_rays(&mut self, camera: &Camera) {
    let pixel_count = self.settings.pixel_count() as u32;
    let width = self.settings.width;
    let output = self.buffers.current();
    let capacity = output.capacity();
    let colors = &self.colors;
    let rngs = &self.rngs;

    self.device.dispatch(capacity, LOCAL_SIZE, |group| {
      for lane in group.lanes() {
        let id = lane as u32;
        let pixel = id % pixel_count;
        // SAFETY: every lane owns the slots of its own ray id.
        unsafe {
          let mut rng = ScopedRng::acquire(rngs, lane);
          let mut state = camera.get_ray(pixel % width, pixel / width, &mut rng);
          state.id = id;
          output.store(lane, &state);
          colors.write(lane, Vec3f::zero());
        }
      }
    });
    output.set_len(capacity);
  }

  /// Traces every ray of the previous stream by one bounce. Rays that end
  /// write their color, the others are appended to the current stream.
  pub fn shoot_rays(&mut self, ctx: &RenderContext, depth: u32) -> ShootStats {
    let start = Instant::now();
    let max_depth = self.settings.max_depth;
    let input = self.buffers.previous();
    let output = self.buffers.current();
    let colors = &self.colors;
    let rngs = &self.rngs;
    let consumed = input.take_len();
    let terminated = AtomicUsize::new(0);

    self.device.dispatch(consumed, LOCAL_SIZE, |group| {
      let mut local = LocalMemory::new();
      let mut ended = 0;
      for lane in group.lanes() {
        // SAFETY: lane `lane` is the only reader of input slot `lane`
        // and the only user of the color and generator slots of the
        // ray id it holds, since ids are unique in a stream.
        unsafe {
          let mut state = input.load(lane);
          let id = state.id as usize;
          let result = {
            let mut rng = ScopedRng::acquire(rngs, id);
            trace_ray(
              ctx,
              &mut rng,
              &mut state.ray,
              &mut state.attenuation,
              &mut state.radiance,
            )
          };
          match result {
            Some(color) => {
              colors.write(id, color.clamped01());
              ended += 1;
            }
            None if depth >= max_depth => {
              colors.write(id, Vec3f::zero());
              ended += 1;
            }
            None => {
              let slot = local.count.fetch_add(1, Ordering::Relaxed) as usize;
              local.rays[slot] = state;
            }
          }
        }
      }

      // Barrier. Lane 0 reserves room for the whole group.
      let count = local.count.load(Ordering::Relaxed) as usize;
      if count > 0 {
        local.first_index = output.reserve(count);
      }

      // Barrier. The group copies its survivors out.
      for (i, state) in local.rays[..count].iter().enumerate() {
        // SAFETY: the block was reserved by this group alone.
        unsafe { output.store(local.first_index + i, state) };
      }
      if ended > 0 {
        terminated.fetch_add(ended, Ordering::Relaxed);
      }
    });

    let terminated = terminated.into_inner();
    if let Some(p) = &self.progress {
      p.fetch_add(terminated, Ordering::Relaxed);
    }
    let survived = self.buffers.current().len();
    log::trace!(
      "Depth {}: {} rays in, {} ended, {} live ({:?})",
      depth,
      consumed,
      terminated,
      survived,
      start.elapsed()
    );
    ShootStats {
      consumed,
      terminated,
      survived,
    }
  }

  /// Adds the colors of every run slot to the pixel accumulator.
  pub fn merge_samples(&mut self) {
    let pixel_count = self.settings.pixel_count();
    let runs = self.settings.samples_per_run as usize;
    let colors = &self.colors;
    let accumulator = &self.accumulator;
    self.device.dispatch(pixel_count, LOCAL_SIZE, |group| {
      for pixel in group.lanes() {
        // SAFETY: one lane per pixel; colors are only read.
        unsafe {
          let mut sum = accumulator.read(pixel);
          for slot in 0..runs {
            sum += colors.read(pixel + slot * pixel_count);
          }
          accumulator.write(pixel, sum);
        }
      }
    });
  }

  /// Averages the accumulated samples and gamma encodes them.
  pub fn convert_image_to_srgb(&mut self) -> Framebuffer {
    let scale = 1. / self.settings.sample_count as f32;
    let accumulator = self.accumulator.as_mut_slice();
    let pixels: Vec<Vec3f> = self.device.install(|| {
      accumulator
        .par_iter()
        .map(|c| linear_to_gamma(*c * scale))
        .collect()
    });
    Framebuffer::new(self.settings.width, self.settings.height, pixels)
  }
}

impl Renderer for WavefrontRenderer {
  fn name(&self) -> &'static str {
    "wavefront"
  }

  fn set_progress(&mut self, progress: Arc<AtomicUsize>) {
    self.progress = Some(progress);
  }

  fn render_frame(&mut self, camera: &Camera, scene: &Scene) -> Result<RenderOutput, RenderError> {
    let s = self.settings;
    s.check_camera(camera)?;
    let start = Instant::now();
    let ctx = RenderContext::new(scene);
    self.rngs.reset();
    self.accumulator.fill(Vec3f::zero());

    let mut ray_count = 0u64;
    for run in 0..s.sample_count / s.samples_per_run {
      log::debug!(
        "Run {} of {}",
        run + 1,
        s.sample_count / s.samples_per_run
      );
      self.generate_camera_rays(camera);
      for depth in 0..=s.max_depth {
        let live = self.buffers.current().len();
        if live == 0 {
          break;
        }
        ray_count += live as u64;
        self.buffers.swap();
        self.shoot_rays(&ctx, depth);
      }
      self.merge_samples();
    }
    let framebuffer = self.convert_image_to_srgb();

    let stats = RenderStats {
      ray_count,
      elapsed: start.elapsed(),
    };
    stats.log_report();
    Ok(RenderOutput { framebuffer, stats })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::camera::CameraPose;
  use crate::materials::Material;
  use crate::mesh::MeshData;
  use crate::scene::SceneBuilder;
  use std::collections::HashSet;

  fn settings(width: u32, height: u32) -> RenderSettings {
    RenderSettings {
      width,
      height,
      max_depth: 4,
      sample_count: 4,
      samples_per_run: 2,
      threads: 3,
    }
  }

  // A ground plane and a floating cube, so paths end at many depths.
  fn scene() -> Scene {
    let mut b = SceneBuilder::new();
    let root = b.add_node(None, Mat4f::identity()).unwrap();
    let ground = b
      .add_node(Some(root), rotation_x(-std::f32::consts::FRAC_PI_2) * scaling(Vec3f::broadcast(20.)))
      .unwrap();
    let boxed = b.add_node(Some(root), translation(Vec3f::new(0., 1., 0.))).unwrap();
    let quad = b.add_mesh(MeshData::quad()).unwrap();
    let cube = b.add_mesh(MeshData::cube()).unwrap();
    b.add_instance(ground, quad, Material::diffuse(Vec3f::broadcast(0.7))).unwrap();
    b.add_instance(boxed, cube, Material::metallic(Vec3f::new(0.9, 0.8, 0.7), 0.3))
      .unwrap();
    b.sky_color(Vec3f::new(0.5, 0.7, 1.), 1.);
    b.camera(CameraPose::look_at(Vec3f::new(0., 2., 5.), Vec3f::new(0., 0.5, 0.), 1.5));
    b.build()
  }

  fn renderer(s: RenderSettings) -> WavefrontRenderer {
    WavefrontRenderer::new(Arc::new(Device::new(s.threads).unwrap()), s).unwrap()
  }

  #[test]
  fn compaction_conserves_and_packs_rays() {
    let scene = scene();
    let s = settings(37, 23);
    let camera = Camera::from_pose(s.width, s.height, &scene.camera_pose().unwrap());
    let ctx = RenderContext::new(&scene);
    let mut r = renderer(s);
    r.generate_camera_rays(&camera);
    let capacity = s.pixel_count() * s.samples_per_run as usize;
    // Terminal colors are clamped to [0, 1], so this is never written.
    let unwritten = Vec3f::broadcast(-1.);

    for depth in 0..s.max_depth {
      let input: HashSet<u32> = r.buffers_mut().current_mut().rays().iter().map(|s| s.id).collect();
      let n = r.buffers().current().len();
      assert_eq!(input.len(), n);
      r.colors.fill(unwritten);
      r.buffers_mut().swap();
      let stats = r.shoot_rays(&ctx, depth);
      assert_eq!(stats.consumed, n);
      assert_eq!(r.buffers().previous().len(), 0);

      let written: HashSet<u32> = r
        .colors
        .as_mut_slice()
        .iter()
        .enumerate()
        .filter(|(_, c)| **c != unwritten)
        .map(|(id, _)| id as u32)
        .collect();
      let rays = r.buffers_mut().current_mut().rays();
      let survivors: HashSet<u32> = rays.iter().map(|s| s.id).collect();

      // Every input ray either wrote its color or moved on, never both, and
      // no survivor was stored twice.
      assert_eq!(survivors.len(), rays.len());
      assert!(written.is_disjoint(&survivors));
      assert_eq!(written.len() + survivors.len(), n);
      let covered: HashSet<u32> = written.union(&survivors).copied().collect();
      assert_eq!(covered, input);
      assert!(survivors.iter().all(|&id| (id as usize) < capacity));
      assert_eq!(stats.terminated, written.len());
      assert_eq!(stats.survived, survivors.len());
      if survivors.is_empty() {
        break;
      }
    }
  }

  #[test]
  fn last_depth_terminates_everything() {
    let scene = scene();
    let mut s = settings(16, 16);
    s.max_depth = 0;
    let camera = Camera::from_pose(s.width, s.height, &scene.camera_pose().unwrap());
    let ctx = RenderContext::new(&scene);
    let mut r = renderer(s);
    r.generate_camera_rays(&camera);
    r.buffers_mut().swap();
    let stats = r.shoot_rays(&ctx, 0);
    assert_eq!(stats.consumed, 16 * 16 * 2);
    assert_eq!(stats.survived, 0);
    assert_eq!(stats.terminated, stats.consumed);
  }

  #[test]
  fn terminal_colors_are_clamped() {
    let mut b = SceneBuilder::new();
    b.sky_color(Vec3f::new(3., 0.5, -1.), 1.);
    let scene = b.build();
    let s = settings(4, 2);
    let camera = Camera::from_pose(4, 2, &scene.framing_camera_pose());
    let ctx = RenderContext::new(&scene);
    let mut r = renderer(s);
    r.generate_camera_rays(&camera);
    r.buffers_mut().swap();
    r.shoot_rays(&ctx, 0);
    for id in 0..16 {
      assert_eq!(r.sample_color(id), Vec3f::new(1., 0.5, 0.));
    }
  }

  #[test]
  fn progress_counts_every_sample() {
    let scene = scene();
    let s = settings(9, 7);
    let camera = Camera::from_pose(s.width, s.height, &scene.camera_pose().unwrap());
    let progress = Arc::new(AtomicUsize::new(0));
    let mut r = renderer(s).with_progress(progress.clone());
    let out = r.render_frame(&camera, &scene).unwrap();
    assert_eq!(progress.load(Ordering::Relaxed), 9 * 7 * 4);
    assert!(out.stats.ray_count >= 9 * 7 * 4);
    assert_eq!(out.framebuffer.pixels().len(), 9 * 7);
  }

  #[test]
  fn frames_are_repeatable() {
    let scene = scene();
    let s = settings(12, 8);
    let camera = Camera::from_pose(s.width, s.height, &scene.camera_pose().unwrap());
    let mut r = renderer(s);
    let a = r.render_frame(&camera, &scene).unwrap();
    let b = r.render_frame(&camera, &scene).unwrap();
    assert_eq!(a.framebuffer, b.framebuffer);
    assert_eq!(a.stats.ray_count, b.stats.ray_count);
  }

  #[test]
  fn uneven_runs_are_rejected() {
    let mut s = settings(4, 4);
    s.sample_count = 5;
    let device = Arc::new(Device::new(1).unwrap());
    assert!(matches!(
      WavefrontRenderer::new(device, s),
      Err(RenderError::InvalidSettings(_))
    ));
  }
}
