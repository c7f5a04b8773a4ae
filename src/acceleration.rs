use super::fp::*;
use super::hittable::*;
use super::types::*;
use arrayvec::ArrayVec;
use wide::f32x4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  pub minimum: Vec3f,
  pub maximum: Vec3f,
}

impl Default for Aabb {
  fn default() -> Aabb {
    Aabb::empty()
  }
}

impl Aabb {
  /// The box containing nothing. Growing it by anything yields that thing.
  pub fn empty() -> Aabb {
    Aabb {
      minimum: Vec3f::broadcast(f32::INFINITY),
      maximum: Vec3f::broadcast(f32::NEG_INFINITY),
    }
  }

  pub fn from_points(points: &[Vec3f]) -> Aabb {
    points.iter().fold(Aabb::empty(), |bb, p| bb.grown(*p))
  }

  pub fn is_empty(&self) -> bool {
    self.minimum.x > self.maximum.x
      || self.minimum.y > self.maximum.y
      || self.minimum.z > self.maximum.z
  }

  pub fn surrounding(a: Aabb, b: Aabb) -> Aabb {
    Aabb {
      minimum: a.minimum.min_by_component(b.minimum),
      maximum: a.maximum.max_by_component(b.maximum),
    }
  }

  pub fn grown(&self, p: Vec3f) -> Aabb {
    Aabb {
      minimum: self.minimum.min_by_component(p),
      maximum: self.maximum.max_by_component(p),
    }
  }

  pub fn centroid(&self) -> Vec3f {
    (self.minimum + self.maximum) * 0.5
  }

  pub fn extent(&self) -> Vec3f {
    self.maximum - self.minimum
  }

  pub fn corners(&self) -> [Vec3f; 8] {
    let (a, b) = (self.minimum, self.maximum);
    [
      Vec3f::new(a.x, a.y, a.z),
      Vec3f::new(b.x, a.y, a.z),
      Vec3f::new(a.x, b.y, a.z),
      Vec3f::new(b.x, b.y, a.z),
      Vec3f::new(a.x, a.y, b.z),
      Vec3f::new(b.x, a.y, b.z),
      Vec3f::new(a.x, b.y, b.z),
      Vec3f::new(b.x, b.y, b.z),
    ]
  }

  /// Bounds of this box after an affine transform.
  pub fn transformed(&self, m: &Mat4f) -> Aabb {
    if self.is_empty() {
      return *self;
    }
    self.corners()
      .iter()
      .fold(Aabb::empty(), |bb, p| bb.grown(transform_point(m, *p)))
  }

  pub fn longest_axis(&self) -> Axis {
    let e = self.extent();
    if e.x >= e.y && e.x >= e.z {
      Axis::X
    } else if e.y >= e.z {
      Axis::Y
    } else {
      Axis::Z
    }
  }

  /// Slab test. Returns the distance at which the ray enters the box if it
  /// does so within `(tnear, tfar)`.
  ///
  /// The exit distance is padded by `1 + 2 * gamma(3)` so rays grazing an
  /// edge are not lost to rounding. See
  /// http://www.pbr-book.org/3ed-2018/Shapes/Managing_Rounding_Error.html#ConservativeRayBoundsIntersections.
  #[inline]
  pub fn hit(&self, origin: f32x4, inv_dir: f32x4, tnear: f32, tfar: f32) -> Option<f32> {
    let pad = 1. + 2. * gamma_eb(3);
    let lo = f32x4::from([self.minimum.x, self.minimum.y, self.minimum.z, 0.]);
    let hi = f32x4::from([self.maximum.x, self.maximum.y, self.maximum.z, 0.]);
    let t0 = (lo - origin) * inv_dir;
    let t1 = (hi - origin) * inv_dir;
    let entry = t0.min(t1).to_array();
    let exit = t0.max(t1).to_array();
    let t_min = entry[0].max(entry[1]).max(entry[2]).max(tnear);
    let t_max = (exit[0].min(exit[1]).min(exit[2]) * pad).min(tfar);
    if t_min <= t_max {
      Some(t_min)
    } else {
      None
    }
  }
}

/// Ray in the lane layout used by `Aabb::hit`.
#[inline]
pub fn ray_lanes(ray: &Ray) -> (f32x4, f32x4) {
  let inv = ray.inv_direction();
  (
    f32x4::from([ray.origin.x, ray.origin.y, ray.origin.z, 0.]),
    f32x4::from([inv.x, inv.y, inv.z, 0.]),
  )
}

const LEAF_SIZE: usize = 4;
const STACK_SIZE: usize = 64;

#[derive(Clone, Copy, Debug)]
struct BvhNode {
  bounds: Aabb,
  // Leaves: first primitive in `indices`. Interior nodes: index of the
  // right child, the left child follows the node.
  offset: u32,
  // Zero for interior nodes.
  count: u32,
}

/// A bounding volume hierarchy stored as a flat array in depth-first order.
/// Primitives are split at the median of their centroids along the longest
/// axis of the centroid bounds.
#[derive(Clone, Debug, Default)]
pub struct Bvh {
  nodes: Vec<BvhNode>,
  indices: Vec<u32>,
}

impl Bvh {
  pub fn build(bounds: &[Aabb]) -> Bvh {
    let mut bvh = Bvh {
      nodes: Vec::with_capacity(2 * bounds.len() / LEAF_SIZE + 1),
      indices: (0..bounds.len() as u32).collect(),
    };
    if !bounds.is_empty() {
      let centroids: Vec<Vec3f> = bounds.iter().map(Aabb::centroid).collect();
      bvh.build_node(bounds, &centroids, 0, bounds.len());
    }
    bvh
  }

  fn build_node(&mut self, bounds: &[Aabb], centroids: &[Vec3f], start: usize, end: usize) -> usize {
    let range = &mut self.indices[start..end];
    let node_bounds = range
      .iter()
      .fold(Aabb::empty(), |bb, &i| Aabb::surrounding(bb, bounds[i as usize]));
    let node = self.nodes.len();
    self.nodes.push(BvhNode {
      bounds: node_bounds,
      offset: start as u32,
      count: range.len() as u32,
    });
    if range.len() <= LEAF_SIZE {
      return node;
    }

    let axis = range
      .iter()
      .fold(Aabb::empty(), |bb, &i| bb.grown(centroids[i as usize]))
      .longest_axis();
    let mid = range.len() / 2;
    range.select_nth_unstable_by(mid, |&a, &b| {
      let ca = Axis::of(centroids[a as usize], axis);
      let cb = Axis::of(centroids[b as usize], axis);
      ca.total_cmp(&cb)
    });

    self.build_node(bounds, centroids, start, start + mid);
    let right = self.build_node(bounds, centroids, start + mid, end);
    self.nodes[node].offset = right as u32;
    self.nodes[node].count = 0;
    node
  }

  pub fn bounds(&self) -> Aabb {
    self.nodes.first().map_or(Aabb::empty(), |n| n.bounds)
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Finds the nearest hit. `leaf` intersects primitive `i` with a copy of
  /// the ray whose `tfar` is the nearest hit so far.
  pub fn intersect<F>(&self, ray: &Ray, mut leaf: F) -> Option<Hit>
  where
    F: FnMut(u32, &Ray) -> Option<Hit>,
  {
    if self.nodes.is_empty() {
      return None;
    }
    let (origin, inv_dir) = ray_lanes(ray);
    let mut ray = *ray;
    let mut closest: Option<Hit> = None;
    let mut stack: ArrayVec<u32, STACK_SIZE> = ArrayVec::new();
    stack.push(0);

    while let Some(index) = stack.pop() {
      let node = &self.nodes[index as usize];
      if node.bounds.hit(origin, inv_dir, ray.tnear, ray.tfar).is_none() {
        continue;
      }
      if node.count > 0 {
        let first = node.offset as usize;
        for &prim in &self.indices[first..first + node.count as usize] {
          if let Some(hit) = leaf(prim, &ray) {
            ray.tfar = hit.t;
            closest = Some(hit);
          }
        }
        continue;
      }

      // Visit the nearer child first.
      let left = index + 1;
      let right = node.offset;
      let tl = self.nodes[left as usize]
        .bounds
        .hit(origin, inv_dir, ray.tnear, ray.tfar);
      let tr = self.nodes[right as usize]
        .bounds
        .hit(origin, inv_dir, ray.tnear, ray.tfar);
      match (tl, tr) {
        (Some(a), Some(b)) if b < a => {
          stack.push(left);
          stack.push(right);
        }
        (Some(_), Some(_)) => {
          stack.push(right);
          stack.push(left);
        }
        (Some(_), None) => stack.push(left),
        (None, Some(_)) => stack.push(right),
        (None, None) => {}
      }
    }
    closest
  }
}
