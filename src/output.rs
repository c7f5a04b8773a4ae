//! Finished images.

use super::error::RenderError;
use super::types::*;
use image::RgbaImage;
use palette::Srgb;
use std::path::Path;

/// A rendered image. Pixels are gamma encoded and stored row by row from the
/// top.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
  width: u32,
  height: u32,
  pixels: Vec<Vec3f>,
}

impl Framebuffer {
  pub fn new(width: u32, height: u32, pixels: Vec<Vec3f>) -> Framebuffer {
    debug_assert_eq!(pixels.len(), width as usize * height as usize);
    Framebuffer {
      width,
      height,
      pixels,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn pixels(&self) -> &[Vec3f] {
    &self.pixels
  }

  pub fn get(&self, x: u32, y: u32) -> Vec3f {
    self.pixels[(x + y * self.width) as usize]
  }

  /// Quantizes to RGBA8 with opaque alpha, row by row from the top.
  pub fn to_rgba8(&self) -> Vec<u8> {
    self.to_image().into_raw()
  }

  pub fn to_image(&self) -> RgbaImage {
    RgbaImage::from_fn(self.width, self.height, |x, y| {
      let c = self.get(x, y).clamped01();
      let rgb: Srgb<u8> = Srgb::new(c.x, c.y, c.z).into_format();
      image::Rgba([rgb.red, rgb.green, rgb.blue, u8::MAX])
    })
  }

  pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
    self.to_image()
      .save_with_format(path, image::ImageFormat::Png)?;
    log::info!("Wrote {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn gradient() -> Framebuffer {
    let pixels = (0..6)
      .map(|i| Vec3f::new(i as f32 / 5., 0., 1.5))
      .collect();
    Framebuffer::new(3, 2, pixels)
  }

  #[test]
  fn rgba8_is_clamped_and_opaque() {
    let bytes = gradient().to_rgba8();
    assert_eq!(bytes.len(), 3 * 2 * 4);
    assert_eq!(&bytes[0..4], &[0, 0, 255, 255]);
    assert_eq!(&bytes[20..24], &[255, 0, 255, 255]);
    let img = gradient().to_image();
    assert_eq!(img.get_pixel(2, 1).0, [255, 0, 255, 255]);
    assert_eq!(img.into_raw(), bytes);
  }

  #[test]
  fn png_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let fb = gradient();
    fb.save_png(&path).unwrap();
    let img = image::open(&path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (3, 2));
    assert_eq!(img.into_raw(), fb.to_rgba8());
  }
}
