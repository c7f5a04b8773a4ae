//! Baked image textures.

use super::error::SceneError;
use super::types::*;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

/// Side of every baked image layer, in texels.
pub const IMAGE_SIZE: u32 = 512;
/// Maximum number of layers in an `ImageArray`.
pub const MAX_IMAGES: usize = 128;

/// Handle to a layer of an `ImageArray`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageRef(u32);

impl ImageRef {
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Texture {
  Constant(Vec3f),
  Image(ImageRef),
}

impl Texture {
  #[inline]
  pub fn sample(&self, images: &ImageArray, uv: Vec2f) -> Vec3f {
    match self {
      Texture::Constant(color) => *color,
      Texture::Image(image) => images.sample(*image, uv),
    }
  }
}

impl From<Vec3f> for Texture {
  fn from(color: Vec3f) -> Texture {
    Texture::Constant(color)
  }
}

/// Collects images and resizes them to the common layer size.
pub struct ImageBaker {
  layers: Vec<RgbaImage>,
  limit: usize,
}

impl Default for ImageBaker {
  fn default() -> ImageBaker {
    ImageBaker::with_limit(MAX_IMAGES)
  }
}

impl ImageBaker {
  pub fn new() -> ImageBaker {
    ImageBaker::default()
  }

  /// Makes a baker that holds at most `limit` layers (never more than
  /// `MAX_IMAGES`).
  pub fn with_limit(limit: usize) -> ImageBaker {
    ImageBaker {
      layers: Vec::new(),
      limit: limit.min(MAX_IMAGES),
    }
  }

  pub fn len(&self) -> usize {
    self.layers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }

  pub fn upload_image(&mut self, image: &DynamicImage) -> Result<ImageRef, SceneError> {
    let rgba = image.to_rgba8();
    let layer = if rgba.dimensions() == (IMAGE_SIZE, IMAGE_SIZE) {
      rgba
    } else {
      imageops::resize(&rgba, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
    };
    self.push(layer)
  }

  /// Uploads a layer filled with a single RGBA color in `[0, 1]`.
  pub fn upload_color(&mut self, color: Vec4f) -> Result<ImageRef, SceneError> {
    let texel = Rgba([
      unorm8(color.x),
      unorm8(color.y),
      unorm8(color.z),
      unorm8(color.w),
    ]);
    self.push(RgbaImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, texel))
  }

  fn push(&mut self, layer: RgbaImage) -> Result<ImageRef, SceneError> {
    if self.layers.len() >= self.limit {
      return Err(SceneError::TooManyImages(self.limit));
    }
    self.layers.push(layer);
    Ok(ImageRef(self.layers.len() as u32 - 1))
  }

  pub fn bake(self) -> ImageArray {
    let layer_count = self.layers.len();
    let mut texels = Vec::with_capacity(layer_count * (IMAGE_SIZE * IMAGE_SIZE) as usize);
    for layer in self.layers {
      texels.extend(layer.pixels().map(|p| p.0));
    }
    log::debug!("Baked {} image layers", layer_count);
    ImageArray {
      layer_count,
      texels,
    }
  }
}

fn unorm8(c: f32) -> u8 {
  (c.clamp(0., 1.) * 255. + 0.5) as u8
}

/// Immutable array of square RGBA8 layers.
#[derive(Default)]
pub struct ImageArray {
  layer_count: usize,
  texels: Vec<[u8; 4]>,
}

impl ImageArray {
  pub fn layer_count(&self) -> usize {
    self.layer_count
  }

  /// Samples a layer at normalized coordinates with repeat addressing and
  /// nearest filtering. `(0, 0)` is the top-left corner of the image.
  pub fn sample(&self, image: ImageRef, uv: Vec2f) -> Vec3f {
    if image.index() >= self.layer_count {
      return Vec3f::zero();
    }
    let x = texel_coord(uv.x);
    let y = texel_coord(uv.y);
    let layer_len = (IMAGE_SIZE * IMAGE_SIZE) as usize;
    let offset = image.index() * layer_len + (y * IMAGE_SIZE + x) as usize;
    let [r, g, b, _] = self.texels[offset];
    Vec3f::new(r as f32, g as f32, b as f32) / 255.
  }
}

fn texel_coord(c: f32) -> u32 {
  let wrapped = c - c.floor();
  if !wrapped.is_finite() {
    return 0;
  }
  ((wrapped * IMAGE_SIZE as f32) as u32).min(IMAGE_SIZE - 1)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checker() -> DynamicImage {
    // White in the top-left and bottom-right quadrants.
    let half = IMAGE_SIZE / 2;
    let img = RgbaImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
      if (x / half + y / half) % 2 == 0 {
        Rgba([255, 255, 255, 255])
      } else {
        Rgba([0, 0, 0, 255])
      }
    });
    DynamicImage::ImageRgba8(img)
  }

  #[test]
  fn constant_texture_ignores_uv() {
    let images = ImageArray::default();
    let t = Texture::Constant(Vec3f::new(0.1, 0.2, 0.3));
    assert_eq!(t.sample(&images, Vec2f::new(7., -3.)), Vec3f::new(0.1, 0.2, 0.3));
  }

  #[test]
  fn nearest_filtering_picks_the_covering_texel() {
    let mut baker = ImageBaker::new();
    let img = baker.upload_image(&checker()).unwrap();
    let images = baker.bake();
    assert_eq!(images.sample(img, Vec2f::new(0.1, 0.1)), Vec3f::one());
    assert_eq!(images.sample(img, Vec2f::new(0.9, 0.1)), Vec3f::zero());
    assert_eq!(images.sample(img, Vec2f::new(0.9, 0.9)), Vec3f::one());
  }

  #[test]
  fn addressing_repeats() {
    let mut baker = ImageBaker::new();
    let img = baker.upload_image(&checker()).unwrap();
    let images = baker.bake();
    let a = images.sample(img, Vec2f::new(0.1, 0.9));
    assert_eq!(images.sample(img, Vec2f::new(1.1, 0.9)), a);
    assert_eq!(images.sample(img, Vec2f::new(-0.9, -0.1)), a);
  }

  #[test]
  fn solid_colors_decode_as_unorm() {
    let mut baker = ImageBaker::new();
    let img = baker.upload_color(Vec4f::new(1., 0., 0.2, 1.)).unwrap();
    let images = baker.bake();
    let c = images.sample(img, Vec2f::new(0.5, 0.5));
    assert_eq!(c.x, 1.);
    assert_eq!(c.y, 0.);
    assert!((c.z - 0.2).abs() < 1. / 255.);
  }

  #[test]
  fn images_are_resized_to_layer_size() {
    let small = RgbaImage::from_pixel(3, 5, Rgba([0, 255, 0, 255]));
    let mut baker = ImageBaker::new();
    let img = baker.upload_image(&DynamicImage::ImageRgba8(small)).unwrap();
    let images = baker.bake();
    assert_eq!(images.layer_count(), 1);
    let c = images.sample(img, Vec2f::new(0.5, 0.5));
    assert!(c.x < 0.01 && c.y > 0.99 && c.z < 0.01);
  }

  #[test]
  fn layer_count_is_bounded() {
    let mut baker = ImageBaker::with_limit(2);
    baker.upload_color(Vec4f::one()).unwrap();
    baker.upload_color(Vec4f::one()).unwrap();
    assert!(matches!(
      baker.upload_color(Vec4f::one()),
      Err(SceneError::TooManyImages(2))
    ));
    assert_eq!(ImageBaker::with_limit(1000).limit, MAX_IMAGES);
  }
}
