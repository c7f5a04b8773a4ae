#![warn(clippy::all)]

pub mod acceleration;
pub mod buffers;
pub mod camera;
pub mod default_scene;
pub mod device;
pub mod error;
pub mod fp;
pub mod hittable;
pub mod loader;
pub mod materials;
pub mod megakernel;
pub mod mesh;
pub mod output;
pub mod render;
pub mod rng;
pub mod scene;
pub mod texture;
pub mod trace;
pub mod types;
pub mod wavefront;

pub use camera::{Camera, CameraCreateInfo, CameraPose};
pub use device::Device;
pub use error::{RenderError, SceneError};
pub use megakernel::MegakernelRenderer;
pub use output::Framebuffer;
pub use render::{RenderOutput, RenderSettings, RenderStats, Renderer};
pub use scene::{Scene, SceneBuilder};
pub use wavefront::WavefrontRenderer;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererKind {
  Megakernel,
  Wavefront,
}

/// Makes a renderer of the given kind on `device`.
pub fn create_renderer(
  kind: RendererKind,
  device: Arc<Device>,
  settings: RenderSettings,
  progress: Option<Arc<AtomicUsize>>,
) -> Result<Box<dyn Renderer>, RenderError> {
  let mut renderer: Box<dyn Renderer> = match kind {
    RendererKind::Megakernel => Box::new(MegakernelRenderer::new(device, settings)?),
    RendererKind::Wavefront => Box::new(WavefrontRenderer::new(device, settings)?),
  };
  if let Some(progress) = progress {
    renderer.set_progress(progress);
  }
  Ok(renderer)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::Ordering;
  use crate::types::*;

  #[test]
  fn created_renderers_report_progress() {
    let mut b = SceneBuilder::new();
    b.sky_color(Vec3f::new(0.5, 0.7, 1.), 1.);
    let scene = b.build();
    let settings = RenderSettings {
      width: 6,
      height: 5,
      max_depth: 2,
      sample_count: 4,
      samples_per_run: 2,
      threads: 2,
    };
    let camera = Camera::from_pose(6, 5, &scene.framing_camera_pose());
    let device = Arc::new(Device::new(settings.threads).unwrap());
    for kind in [RendererKind::Megakernel, RendererKind::Wavefront] {
      let progress = Arc::new(AtomicUsize::new(0));
      let mut renderer = create_renderer(kind, device.clone(), settings, Some(progress.clone())).unwrap();
      let out = renderer.render_frame(&camera, &scene).unwrap();
      assert_eq!(progress.load(Ordering::Relaxed), 6 * 5 * 4, "{}", renderer.name());
      assert_eq!(out.framebuffer.pixels().len(), 6 * 5);
    }

    let mut renderer = create_renderer(RendererKind::Wavefront, device, settings, None).unwrap();
    assert_eq!(renderer.name(), "wavefront");
    assert!(renderer.render_frame(&camera, &scene).is_ok());
  }
}
