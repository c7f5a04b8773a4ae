//! Ray streams and per-ray side tables of the wavefront renderer.

use super::device::*;
use super::rng::*;
use super::types::*;
use half::f16;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

#[inline]
fn to_half(v: Vec3f) -> [f16; 3] {
  [f16::from_f32(v.x), f16::from_f32(v.y), f16::from_f32(v.z)]
}

#[inline]
fn from_half(v: [f16; 3]) -> Vec3f {
  Vec3f::new(v[0].to_f32(), v[1].to_f32(), v[2].to_f32())
}

/// A stream of in-flight rays stored as a structure of arrays. Directions,
/// attenuations and radiances are kept at half precision.
///
/// `len` counts the valid entries at the front of the stream. Lanes append
/// by reserving a block with `reserve` and storing into it.
pub struct RayBuffer {
  ids: DeviceBuffer<u32>,
  origins: DeviceBuffer<[f32; 3]>,
  tnears: DeviceBuffer<f32>,
  directions: DeviceBuffer<[f16; 3]>,
  attenuations: DeviceBuffer<[f16; 3]>,
  radiances: DeviceBuffer<[f16; 3]>,
  len: AtomicUsize,
}

impl RayBuffer {
  pub fn new(capacity: usize) -> RayBuffer {
    let zero = [f16::ZERO; 3];
    RayBuffer {
      ids: DeviceBuffer::new(capacity),
      origins: DeviceBuffer::new(capacity),
      tnears: DeviceBuffer::new(capacity),
      directions: DeviceBuffer::from_elem(zero, capacity),
      attenuations: DeviceBuffer::from_elem(zero, capacity),
      radiances: DeviceBuffer::from_elem(zero, capacity),
      len: AtomicUsize::new(0),
    }
  }

  pub fn capacity(&self) -> usize {
    self.ids.len()
  }

  pub fn len(&self) -> usize {
    self.len.load(Ordering::Acquire)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn set_len(&self, len: usize) {
    debug_assert!(len <= self.capacity());
    self.len.store(len, Ordering::Release);
  }

  /// Returns the length and resets it to zero.
  pub fn take_len(&self) -> usize {
    self.len.swap(0, Ordering::AcqRel)
  }

  /// Reserves `count` consecutive slots and returns the first.
  #[inline]
  pub fn reserve(&self, count: usize) -> usize {
    let first = self.len.fetch_add(count, Ordering::AcqRel);
    debug_assert!(first + count <= self.capacity());
    first
  }

  /// # Safety
  ///
  /// No lane may store into `slot` during the current dispatch.
  #[inline]
  pub unsafe fn load(&self, slot: usize) -> RayState {
    let origin = self.origins.read(slot);
    RayState {
      id: self.ids.read(slot),
      ray: Ray {
        origin: Vec3f::from(origin),
        direction: from_half(self.directions.read(slot)),
        tnear: self.tnears.read(slot),
        tfar: f32::INFINITY,
      },
      attenuation: from_half(self.attenuations.read(slot)),
      radiance: from_half(self.radiances.read(slot)),
    }
  }

  /// # Safety
  ///
  /// `slot` must be owned by the calling lane for the current dispatch,
  /// either as its own id or through `reserve`.
  #[inline]
  pub unsafe fn store(&self, slot: usize, state: &RayState) {
    let o = state.ray.origin;
    self.ids.write(slot, state.id);
    self.origins.write(slot, [o.x, o.y, o.z]);
    self.tnears.write(slot, state.ray.tnear);
    self.directions.write(slot, to_half(state.ray.direction));
    self.attenuations.write(slot, to_half(state.attenuation));
    self.radiances.write(slot, to_half(state.radiance));
  }

  /// Copies the valid entries out of the stream.
  pub fn rays(&mut self) -> Vec<RayState> {
    let len = self.len();
    // SAFETY: `&mut self` excludes any dispatch touching the buffer.
    (0..len).map(|slot| unsafe { self.load(slot) }).collect()
  }
}

/// Two ray streams used alternately: each depth reads `previous()` and
/// appends survivors to `current()`.
pub struct Buffers {
  buffers: [RayBuffer; 2],
  index: usize,
}

impl Buffers {
  pub fn new(capacity: usize) -> Buffers {
    Buffers {
      buffers: [RayBuffer::new(capacity), RayBuffer::new(capacity)],
      index: 0,
    }
  }

  pub fn current(&self) -> &RayBuffer {
    &self.buffers[self.index]
  }

  pub fn previous(&self) -> &RayBuffer {
    &self.buffers[self.index ^ 1]
  }

  pub fn current_mut(&mut self) -> &mut RayBuffer {
    &mut self.buffers[self.index]
  }

  pub fn swap(&mut self) {
    self.index ^= 1;
  }
}

/// One color slot per ray id.
pub type ColorBuffer = DeviceBuffer<Vec3f>;

/// Generator state of every ray lane, indexed by ray id. Ray id
/// `pixel + slot * pixel_count` traces sample slot `slot` of `pixel`.
pub struct RngBuffer {
  states: DeviceBuffer<u32>,
  pixel_count: u32,
}

impl RngBuffer {
  pub fn new(pixel_count: u32, samples_per_run: u32) -> RngBuffer {
    let mut buffer = RngBuffer {
      states: DeviceBuffer::new((pixel_count * samples_per_run) as usize),
      pixel_count,
    };
    buffer.reset();
    buffer
  }

  /// Reseeds every lane from its ray id.
  pub fn reset(&mut self) {
    let pixel_count = self.pixel_count;
    for (id, state) in self.states.as_mut_slice().iter_mut().enumerate() {
      let id = id as u32;
      *state = XorShift32::for_lane(id % pixel_count, id / pixel_count, pixel_count).state();
    }
  }

  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }
}

/// Generator borrowed from an `RngBuffer` slot. The advanced state is saved
/// back when the guard is dropped.
pub struct ScopedRng<'a> {
  buffer: &'a RngBuffer,
  index: usize,
  rng: XorShift32,
}

impl<'a> ScopedRng<'a> {
  /// # Safety
  ///
  /// No other lane may acquire slot `index` while the guard is alive.
  #[inline]
  pub unsafe fn acquire(buffer: &'a RngBuffer, index: usize) -> ScopedRng<'a> {
    ScopedRng {
      buffer,
      index,
      rng: XorShift32::from_state(buffer.states.read(index)),
    }
  }
}

impl Deref for ScopedRng<'_> {
  type Target = XorShift32;

  fn deref(&self) -> &XorShift32 {
    &self.rng
  }
}

impl DerefMut for ScopedRng<'_> {
  fn deref_mut(&mut self) -> &mut XorShift32 {
    &mut self.rng
  }
}

impl Drop for ScopedRng<'_> {
  fn drop(&mut self) {
    // SAFETY: the slot is exclusive to this guard, see `acquire`.
    unsafe { self.buffer.states.write(self.index, self.rng.state()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state(id: u32) -> RayState {
    RayState {
      id,
      ray: Ray::continued(
        Vec3f::new(1.5, -2., 3.25),
        Vec3f::new(0.5, 0.25, -1.),
      ),
      attenuation: Vec3f::new(0.5, 0.75, 1.),
      radiance: Vec3f::new(2., 0., 0.125),
    }
  }

  #[test]
  fn stored_rays_keep_their_state() {
    let mut buffer = RayBuffer::new(4);
    // These values are exact in half precision.
    let s = state(9);
    let slot = buffer.reserve(1);
    unsafe { buffer.store(slot, &s) };
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.rays(), vec![s]);
  }

  #[test]
  fn reservations_are_consecutive() {
    let buffer = RayBuffer::new(16);
    assert_eq!(buffer.reserve(5), 0);
    assert_eq!(buffer.reserve(3), 5);
    assert_eq!(buffer.take_len(), 8);
    assert!(buffer.is_empty());
  }

  #[test]
  fn swapping_toggles_roles() {
    let mut buffers = Buffers::new(2);
    buffers.current().set_len(2);
    assert_eq!(buffers.previous().len(), 0);
    buffers.swap();
    assert_eq!(buffers.previous().len(), 2);
    assert_eq!(buffers.current().len(), 0);
    buffers.swap();
    assert_eq!(buffers.current_mut().len(), 2);
  }

  #[test]
  fn scoped_rng_saves_state_on_drop() {
    let table = RngBuffer::new(4, 2);
    let mut reference = XorShift32::for_lane(1, 1, 4);
    {
      let mut rng = unsafe { ScopedRng::acquire(&table, 5) };
      assert_eq!(rng.next_f32(), reference.next_f32());
    }
    let mut rng = unsafe { ScopedRng::acquire(&table, 5) };
    assert_eq!(rng.next_f32(), reference.next_f32());
  }

  #[test]
  fn reset_restores_initial_streams() {
    let mut table = RngBuffer::new(3, 1);
    {
      let mut rng = unsafe { ScopedRng::acquire(&table, 2) };
      rng.next_state();
    }
    table.reset();
    let rng = unsafe { ScopedRng::acquire(&table, 2) };
    assert_eq!(*rng, XorShift32::for_lane(2, 0, 3));
  }
}
