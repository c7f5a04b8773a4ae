//! A data-parallel "device" on top of a rayon thread pool.
//!
//! Kernels are dispatched over a global range split into work-groups. Each
//! work-group runs as one rayon task and executes its lanes in order, so the
//! phases of a group kernel are separated by implicit barriers. A dispatch
//! returns once every group has finished.

use super::error::RenderError;
use rayon::prelude::*;
use std::cell::UnsafeCell;
use std::ops::Range;

pub struct Device {
  pool: rayon::ThreadPool,
}

impl Device {
  /// Starts a device with `threads` workers, or one per core when zero.
  pub fn new(threads: usize) -> Result<Device, RenderError> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(threads)
      .thread_name(|idx| format!("device-{}", idx))
      .build()?;
    log::debug!("Device started with {} threads", pool.current_num_threads());
    Ok(Device { pool })
  }

  pub fn thread_count(&self) -> usize {
    self.pool.current_num_threads()
  }

  /// Runs `op` inside the device pool, so rayon iterators it creates use
  /// the device threads.
  pub fn install<OP, R>(&self, op: OP) -> R
  where
    OP: FnOnce() -> R + Send,
    R: Send,
  {
    self.pool.install(op)
  }

  /// Runs `kernel` once per work-group over `global_size` lanes split into
  /// groups of `local_size`. The last group may be partial.
  pub fn dispatch<K>(&self, global_size: usize, local_size: usize, kernel: K)
  where
    K: Fn(WorkGroup) + Sync + Send,
  {
    if global_size == 0 {
      return;
    }
    let local_size = local_size.max(1);
    let group_count = (global_size + local_size - 1) / local_size;
    self.pool.install(|| {
      (0..group_count).into_par_iter().for_each(|group_id| {
        kernel(WorkGroup {
          group_id,
          local_size,
          global_size,
        })
      })
    });
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkGroup {
  pub group_id: usize,
  pub local_size: usize,
  pub global_size: usize,
}

impl WorkGroup {
  /// Global ids of the lanes in this group.
  pub fn lanes(&self) -> Range<usize> {
    let start = self.group_id * self.local_size;
    start..(start + self.local_size).min(self.global_size)
  }
}

/// Fixed-size storage shared by all lanes of a dispatch.
///
/// Lanes access elements through `read` and `write`, which are unchecked
/// with respect to data races: a kernel must make sure no two lanes touch
/// the same element during one dispatch unless both only read it. Between
/// dispatches the host has exclusive access through `&mut self`.
pub struct DeviceBuffer<T> {
  data: Box<[UnsafeCell<T>]>,
}

// Elements are only ever accessed under the exclusive-slot discipline above.
unsafe impl<T: Send> Sync for DeviceBuffer<T> {}

impl<T: Copy> DeviceBuffer<T> {
  pub fn from_elem(value: T, len: usize) -> DeviceBuffer<T> {
    DeviceBuffer {
      data: (0..len).map(|_| UnsafeCell::new(value)).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// # Safety
  ///
  /// No lane may write element `index` during the current dispatch.
  #[inline]
  pub unsafe fn read(&self, index: usize) -> T {
    *self.data[index].get()
  }

  /// # Safety
  ///
  /// No other lane may read or write element `index` during the current
  /// dispatch.
  #[inline]
  pub unsafe fn write(&self, index: usize, value: T) {
    *self.data[index].get() = value;
  }

  pub fn fill(&mut self, value: T) {
    for cell in self.data.iter_mut() {
      *cell.get_mut() = value;
    }
  }

  pub fn as_mut_slice(&mut self) -> &mut [T] {
    // SAFETY: UnsafeCell<T> has the same layout as T, and `&mut self`
    // rules out any concurrent lane access.
    unsafe { &mut *(&mut *self.data as *mut [UnsafeCell<T>] as *mut [T]) }
  }
}

impl<T: Copy + Default> DeviceBuffer<T> {
  pub fn new(len: usize) -> DeviceBuffer<T> {
    DeviceBuffer::from_elem(T::default(), len)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn dispatch_covers_every_lane_once() {
    let device = Device::new(4).unwrap();
    let mut buffer = DeviceBuffer::<u32>::new(1000);
    let groups = AtomicUsize::new(0);
    device.dispatch(1000, 32, |group| {
      groups.fetch_add(1, Ordering::Relaxed);
      for lane in group.lanes() {
        // SAFETY: lanes are disjoint across groups.
        unsafe { buffer.write(lane, buffer.read(lane) + 1) };
      }
    });
    assert_eq!(groups.into_inner(), 32);
    assert!(buffer.as_mut_slice().iter().all(|&v| v == 1));
  }

  #[test]
  fn last_group_is_partial() {
    let group = WorkGroup {
      group_id: 3,
      local_size: 32,
      global_size: 100,
    };
    assert_eq!(group.lanes(), 96..100);
  }

  #[test]
  fn empty_dispatch_runs_nothing() {
    let device = Device::new(1).unwrap();
    device.dispatch(0, 32, |_| panic!("no groups expected"));
    assert_eq!(device.thread_count(), 1);
  }

  #[test]
  fn host_fill_resets_contents() {
    let mut buffer = DeviceBuffer::from_elem(7u8, 3);
    buffer.fill(2);
    assert_eq!(buffer.as_mut_slice().to_vec(), vec![2, 2, 2]);
    assert_eq!(buffer.len(), 3);
  }
}
