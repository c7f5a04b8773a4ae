//! Renderer interface and settings.

use super::camera::Camera;
use super::error::RenderError;
use super::output::Framebuffer;
use super::scene::Scene;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSettings {
  pub width: u32,
  pub height: u32,
  /// Number of bounces after the primary hit. Paths are traced at most
  /// `max_depth + 1` times.
  pub max_depth: u32,
  pub sample_count: u32,
  /// Samples of every pixel traced together in one run.
  pub samples_per_run: u32,
  /// Device threads, zero for one per core.
  pub threads: usize,
}

impl Default for RenderSettings {
  fn default() -> RenderSettings {
    RenderSettings {
      width: 1280,
      height: 720,
      max_depth: 10,
      sample_count: 32,
      samples_per_run: 4,
      threads: 0,
    }
  }
}

impl RenderSettings {
  pub fn pixel_count(&self) -> usize {
    self.width as usize * self.height as usize
  }

  pub fn validate(&self) -> Result<(), RenderError> {
    if self.width == 0 || self.height == 0 {
      return Err(RenderError::InvalidSettings(format!(
        "resolution {}x{} is empty",
        self.width, self.height
      )));
    }
    if self.sample_count == 0 {
      return Err(RenderError::InvalidSettings(
        "sample count must be positive".to_string(),
      ));
    }
    if self.samples_per_run == 0 {
      return Err(RenderError::InvalidSettings(
        "samples per run must be positive".to_string(),
      ));
    }
    let rays = self.pixel_count() as u64 * self.samples_per_run as u64;
    if rays > u32::MAX as u64 {
      return Err(RenderError::InvalidSettings(format!(
        "{} rays per run do not fit 32-bit ray ids",
        rays
      )));
    }
    Ok(())
  }

  /// Runs trace whole sample slots, so the sample count has to split into
  /// runs evenly.
  pub fn validate_runs(&self) -> Result<(), RenderError> {
    self.validate()?;
    if self.sample_count % self.samples_per_run != 0 {
      return Err(RenderError::InvalidSettings(format!(
        "sample count {} is not a multiple of {} samples per run",
        self.sample_count, self.samples_per_run
      )));
    }
    Ok(())
  }

  pub(crate) fn check_camera(&self, camera: &Camera) -> Result<(), RenderError> {
    if camera.width() != self.width || camera.height() != self.height {
      return Err(RenderError::InvalidSettings(format!(
        "camera is {}x{} but the renderer is {}x{}",
        camera.width(),
        camera.height(),
        self.width,
        self.height
      )));
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
  /// Number of `trace_ray` calls.
  pub ray_count: u64,
  pub elapsed: Duration,
}

impl RenderStats {
  pub fn rays_per_sec(&self) -> f64 {
    let secs = self.elapsed.as_secs_f64();
    if secs > 0. {
      self.ray_count as f64 / secs
    } else {
      0.
    }
  }

  pub fn log_report(&self) {
    log::info!("Time measured: {:.6} seconds", self.elapsed.as_secs_f64());
    log::info!("Total rays: {}", self.ray_count);
    log::info!("Rays/sec: {:.2}M", self.rays_per_sec() / 1e6);
  }
}

pub struct RenderOutput {
  pub framebuffer: Framebuffer,
  pub stats: RenderStats,
}

pub trait Renderer {
  fn name(&self) -> &'static str;

  /// Counts finished pixel samples into `progress`.
  fn set_progress(&mut self, progress: Arc<AtomicUsize>);

  /// Renders one frame. The frame is complete when this returns `Ok`.
  fn render_frame(&mut self, camera: &Camera, scene: &Scene) -> Result<RenderOutput, RenderError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let s = RenderSettings::default();
    s.validate_runs().unwrap();
    assert_eq!(s.pixel_count(), 1280 * 720);
  }

  #[test]
  fn runs_must_divide_the_sample_count() {
    let s = RenderSettings {
      sample_count: 10,
      samples_per_run: 4,
      ..RenderSettings::default()
    };
    s.validate().unwrap();
    assert!(matches!(
      s.validate_runs(),
      Err(RenderError::InvalidSettings(_))
    ));
  }

  #[test]
  fn empty_settings_are_rejected() {
    for s in [
      RenderSettings {
        width: 0,
        ..RenderSettings::default()
      },
      RenderSettings {
        sample_count: 0,
        ..RenderSettings::default()
      },
      RenderSettings {
        samples_per_run: 0,
        ..RenderSettings::default()
      },
    ] {
      assert!(s.validate().is_err());
    }
  }

  #[test]
  fn throughput_handles_zero_time() {
    let stats = RenderStats {
      ray_count: 10,
      elapsed: Duration::ZERO,
    };
    assert_eq!(stats.rays_per_sec(), 0.);
    let stats = RenderStats {
      ray_count: 3_000_000,
      elapsed: Duration::from_secs(2),
    };
    assert_eq!(stats.rays_per_sec(), 1.5e6);
  }
}
