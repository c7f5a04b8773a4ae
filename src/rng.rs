// Provides random number generation.

use super::types::*;
pub use rand::Rng;
pub use rand::RngCore;
pub use rand::SeedableRng;

/// Seeded generator for building procedural scenes. Renders never draw from
/// it, they use one `XorShift32` per ray lane.
pub type SceneRng = rand_xoshiro::Xoshiro128Plus;

/// Marsaglia's 32-bit xorshift generator ("xor" from p. 4 of "Xorshift
/// RNGs").
///
/// The whole state is one `u32`, which is what makes it usable per ray lane:
/// the wavefront renderer saves it to a side table between dispatches and
/// restores it when the ray is traced again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XorShift32 {
  state: u32,
}

impl XorShift32 {
  pub const DEFAULT_STATE: u32 = 2463534242;

  /// Restores a generator from a saved state. Zero is a fixed point of
  /// xorshift and is replaced by the default state.
  #[inline]
  pub fn from_state(state: u32) -> XorShift32 {
    XorShift32 {
      state: if state == 0 {
        XorShift32::DEFAULT_STATE
      } else {
        state
      },
    }
  }

  #[inline]
  pub fn state(&self) -> u32 {
    self.state
  }

  /// The generator of the lane tracing sample slot `run_slot` of pixel
  /// `pixel`. Seeds are hashed from the lane's ray id so neighbouring lanes
  /// get unrelated streams.
  pub fn for_lane(pixel: u32, run_slot: u32, pixel_count: u32) -> XorShift32 {
    let lane = pixel as u64 + run_slot as u64 * pixel_count as u64;
    XorShift32::seed_from_u64(lane)
  }

  #[inline]
  pub fn next_state(&mut self) -> u32 {
    let mut x = self.state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    self.state = x;
    x
  }

  /// Uniform float in `[0, 1)`. Only the top 24 bits are used so the
  /// result is exactly representable and never rounds up to 1.
  #[inline]
  pub fn next_f32(&mut self) -> f32 {
    const SCALE: f32 = 1. / (1u32 << 24) as f32;
    (self.next_state() >> 8) as f32 * SCALE
  }

  /// Uniform float in `[min, max)`.
  #[inline]
  pub fn range(&mut self, min: f32, max: f32) -> f32 {
    min + (max - min) * self.next_f32()
  }

  #[inline]
  pub fn vec3(&mut self) -> Vec3f {
    let x = self.next_f32();
    let y = self.next_f32();
    let z = self.next_f32();
    Vec3f::new(x, y, z)
  }

  #[inline]
  pub fn vec3_range(&mut self, min: f32, max: f32) -> Vec3f {
    let x = self.range(min, max);
    let y = self.range(min, max);
    let z = self.range(min, max);
    Vec3f::new(x, y, z)
  }
}

impl Default for XorShift32 {
  fn default() -> XorShift32 {
    XorShift32::from_state(XorShift32::DEFAULT_STATE)
  }
}

impl RngCore for XorShift32 {
  fn next_u32(&mut self) -> u32 {
    self.next_state()
  }

  fn next_u64(&mut self) -> u64 {
    let lo = self.next_state() as u64;
    let hi = self.next_state() as u64;
    (hi << 32) | lo
  }

  fn fill_bytes(&mut self, dest: &mut [u8]) {
    for chunk in dest.chunks_mut(4) {
      let bytes = self.next_state().to_le_bytes();
      chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
  }

  fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
    self.fill_bytes(dest);
    Ok(())
  }
}

impl SeedableRng for XorShift32 {
  type Seed = [u8; 4];

  fn from_seed(seed: [u8; 4]) -> XorShift32 {
    XorShift32::from_state(u32::from_le_bytes(seed))
  }
}

// ultraviolet::Vec3 traits

pub trait RngVector {
  /// Generates a random unit vector by normalizing a uniform sample of the
  /// `[-1, 1]` cube. This is not uniform on the sphere (directions toward
  /// the cube corners are favoured) but needs no rejection loop. A draw
  /// too close to the origin to normalize yields +Y.
  fn gen_random_unit(rng: &mut XorShift32) -> Self;
}

impl RngVector for Vec3f {
  fn gen_random_unit(rng: &mut XorShift32) -> Vec3f {
    let v = rng.vec3_range(-1., 1.);
    let len_sq = v.mag_sq();
    if len_sq < 1e-12 {
      return Vec3f::unit_y();
    }
    v / len_sq.sqrt()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matches_reference_sequence() {
    // First outputs of Marsaglia's xor32 from the default state.
    let mut rng = XorShift32::default();
    assert_eq!(rng.next_state(), 723471715);
    assert_eq!(rng.next_state(), 2497366906);
    assert_eq!(rng.next_state(), 2064144800);
  }

  #[test]
  fn restarts_from_saved_state() {
    let mut a = XorShift32::for_lane(17, 2, 64);
    a.next_f32();
    let saved = a.state();
    let expected: Vec<f32> = (0..8).map(|_| a.next_f32()).collect();
    let mut b = XorShift32::from_state(saved);
    let restored: Vec<f32> = (0..8).map(|_| b.next_f32()).collect();
    assert_eq!(expected, restored);
  }

  #[test]
  fn zero_seed_does_not_get_stuck() {
    let mut rng = XorShift32::from_state(0);
    assert_ne!(rng.next_state(), 0);
  }

  #[test]
  fn lanes_get_distinct_streams() {
    let a = XorShift32::for_lane(0, 0, 16);
    let b = XorShift32::for_lane(1, 0, 16);
    let c = XorShift32::for_lane(0, 1, 16);
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);
    assert_eq!(a, XorShift32::for_lane(0, 0, 16));
  }

  #[test]
  fn floats_stay_in_half_open_unit_range() {
    let mut rng = XorShift32::from_state(0xffff_ffff);
    for _ in 0..100_000 {
      let f = rng.next_f32();
      assert!((0. ..1.).contains(&f));
    }
    for _ in 0..1000 {
      let f = rng.range(-2., 3.);
      assert!((-2. ..=3.).contains(&f));
    }
  }

  #[test]
  fn random_unit_vectors_have_unit_length() {
    let mut rng = XorShift32::default();
    for _ in 0..1000 {
      let v = Vec3f::gen_random_unit(&mut rng);
      assert!((v.mag() - 1.).abs() < 1e-4);
    }
  }

  #[test]
  fn plugs_into_rand() {
    let mut rng = XorShift32::seed_from_u64(5);
    let x: f32 = rng.gen_range(2. ..4.);
    assert!((2. ..4.).contains(&x));
  }
}
