use super::rng::*;
use super::types::*;

/// Where a camera sits and where it looks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
  pub position: Vec3f,
  pub direction: Vec3f,
  pub focal_length: f32,
}

impl CameraPose {
  /// Makes a pose looking from `position` toward `target`.
  pub fn look_at(position: Vec3f, target: Vec3f, focal_length: f32) -> CameraPose {
    CameraPose {
      position,
      direction: (target - position).normalized(),
      focal_length,
    }
  }

  /// Makes a pose from the global transform of a camera node. Cameras look
  /// down their local -Z axis; `yfov` is the vertical field of view in
  /// radians.
  pub fn from_node(global: &Mat4f, yfov: f32) -> CameraPose {
    CameraPose {
      position: transform_point(global, Vec3f::zero()),
      direction: transform_vector(global, -Vec3f::unit_z()).normalized(),
      focal_length: 1. / (yfov / 2.).tan(),
    }
  }
}

pub struct CameraCreateInfo {
  pub width: u32,
  pub height: u32,
  pub position: Vec3f,
  pub direction: Vec3f,
  pub focal_length: f32,
}

/// A pinhole camera. The viewport spans `[-aspect, aspect] x [-1, 1]` at
/// `focal_length` in front of the eye.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
  width: u32,
  height: u32,
  center: Vec3f,
  direction: Vec3f,
  right: Vec3f,
  up: Vec3f,
  pixel00: Vec3f,
  pixel_delta_u: Vec3f,
  pixel_delta_v: Vec3f,
}

impl Camera {
  pub fn new(info: CameraCreateInfo) -> Camera {
    let direction = info.direction.normalized();
    let world_up = Vec3f::unit_y();
    let right = direction.cross(world_up);
    // Looking straight up or down leaves the basis undefined, pick +X.
    let right = if right.mag_sq() < 1e-12 {
      Vec3f::unit_x()
    } else {
      right.normalized()
    };
    let up = right.cross(direction).normalized();

    let aspect = info.width as f32 / info.height as f32;
    let viewport_u = -right * aspect;
    let viewport_v = up;
    let corner = info.position + viewport_u + viewport_v + direction * info.focal_length;
    let pixel_delta_u = right * (2. * aspect / info.width as f32);
    let pixel_delta_v = up * (2. / info.height as f32);

    Camera {
      width: info.width,
      height: info.height,
      center: info.position,
      direction,
      right,
      up,
      pixel00: corner + 0.5 * pixel_delta_u - 0.5 * pixel_delta_v,
      pixel_delta_u,
      pixel_delta_v,
    }
  }

  pub fn from_pose(width: u32, height: u32, pose: &CameraPose) -> Camera {
    Camera::new(CameraCreateInfo {
      width,
      height,
      position: pose.position,
      direction: pose.direction,
      focal_length: pose.focal_length,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn pixel_count(&self) -> u32 {
    self.width * self.height
  }

  pub fn position(&self) -> Vec3f {
    self.center
  }

  pub fn direction(&self) -> Vec3f {
    self.direction
  }

  pub fn right(&self) -> Vec3f {
    self.right
  }

  pub fn up(&self) -> Vec3f {
    self.up
  }

  /// Center of pixel `(x, y)` on the viewport. Rows go down the image.
  pub fn pixel_center(&self, x: u32, y: u32) -> Vec3f {
    self.pixel00 + (x as f32 * self.pixel_delta_u) - (y as f32 * self.pixel_delta_v)
  }

  /// Makes a jittered primary ray through pixel `(x, y)`. The ray id is the
  /// linear pixel index.
  pub fn get_ray(&self, x: u32, y: u32, rng: &mut XorShift32) -> RayState {
    let px = -0.5 + rng.next_f32();
    let py = -0.5 + rng.next_f32();
    let sample = self.pixel_center(x, y) + (px * self.pixel_delta_u) + (py * self.pixel_delta_v);
    RayState {
      id: x + y * self.width,
      ray: Ray::new(self.center, sample - self.center),
      attenuation: Vec3f::one(),
      radiance: Vec3f::zero(),
    }
  }
}
