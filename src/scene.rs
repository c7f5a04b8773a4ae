use super::acceleration::*;
use super::camera::*;
use super::error::SceneError;
use super::hittable::*;
use super::materials::*;
use super::mesh::*;
use super::texture::*;
use super::types::*;

/// Handle to a transform node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

#[derive(Clone, Copy, Debug)]
pub struct Node {
  pub parent: Option<NodeId>,
  pub local: Mat4f,
}

/// Everything shading needs to know about one placed mesh.
#[derive(Clone, Copy, Debug)]
pub struct GeometryData {
  pub mesh: MeshId,
  pub obj_to_world: Mat4f,
  pub world_to_obj: Mat4f,
  /// Inverse-transpose of the linear part of `obj_to_world`.
  pub normal_matrix: Mat3f,
  pub material: Material,
}

pub struct SceneBuilder {
  nodes: Vec<Node>,
  meshes: Vec<Mesh>,
  instances: Vec<GeometryData>,
  images: ImageBaker,
  sky_color: Vec3f,
  camera: Option<CameraPose>,
}

impl Default for SceneBuilder {
  fn default() -> SceneBuilder {
    SceneBuilder::new()
  }
}

impl SceneBuilder {
  pub fn new() -> SceneBuilder {
    SceneBuilder {
      nodes: vec![],
      meshes: vec![],
      instances: vec![],
      images: ImageBaker::new(),
      sky_color: Vec3f::zero(),
      camera: None,
    }
  }

  pub fn add_node(&mut self, parent: Option<NodeId>, local: Mat4f) -> Result<NodeId, SceneError> {
    if let Some(p) = parent {
      if p.index() >= self.nodes.len() {
        return Err(SceneError::UnknownNode(p.0));
      }
    }
    self.nodes.push(Node { parent, local });
    Ok(NodeId(self.nodes.len() as u32 - 1))
  }

  pub fn add_mesh(&mut self, data: MeshData) -> Result<MeshId, SceneError> {
    let mesh = Mesh::new(data)?;
    log::debug!(
      "Mesh {}: {} triangles",
      self.meshes.len(),
      mesh.triangle_count()
    );
    self.meshes.push(mesh);
    Ok(MeshId(self.meshes.len() as u32 - 1))
  }

  /// Places `mesh` at the global transform of `node`. Returns the instance
  /// id reported by hits on it.
  pub fn add_instance(
    &mut self,
    node: NodeId,
    mesh: MeshId,
    material: Material,
  ) -> Result<u32, SceneError> {
    if mesh.index() >= self.meshes.len() {
      return Err(SceneError::UnknownMesh(mesh.0));
    }
    let obj_to_world = global_matrix(&self.nodes, node)?;
    log::debug!(
      "Instance {}: mesh {} {:?}",
      self.instances.len(),
      mesh.0,
      material
    );
    self.instances.push(GeometryData {
      mesh,
      obj_to_world,
      world_to_obj: obj_to_world.inversed(),
      normal_matrix: normal_matrix(&obj_to_world),
      material,
    });
    Ok(self.instances.len() as u32 - 1)
  }

  pub fn images_mut(&mut self) -> &mut ImageBaker {
    &mut self.images
  }

  pub fn sky_color(&mut self, color: Vec3f, strength: f32) {
    self.sky_color = color * strength;
  }

  pub fn camera(&mut self, pose: CameraPose) {
    self.camera = Some(pose);
  }

  pub fn build(self) -> Scene {
    let instance_bounds: Vec<Aabb> = self
      .instances
      .iter()
      .map(|g| self.meshes[g.mesh.index()].bounds().transformed(&g.obj_to_world))
      .collect();
    let bounds = instance_bounds
      .iter()
      .fold(Aabb::empty(), |bb, b| Aabb::surrounding(bb, *b));
    let tlas = Bvh::build(&instance_bounds);
    log::info!(
      "Scene: {} meshes, {} instances, {} images, sky {:?}",
      self.meshes.len(),
      self.instances.len(),
      self.images.len(),
      self.sky_color
    );
    Scene {
      nodes: self.nodes,
      meshes: self.meshes,
      instances: self.instances,
      tlas,
      bounds,
      images: self.images.bake(),
      sky_color: self.sky_color,
      camera: self.camera,
    }
  }
}

fn global_matrix(nodes: &[Node], node: NodeId) -> Result<Mat4f, SceneError> {
  let mut m = Mat4f::identity();
  let mut current = Some(node);
  let mut steps = 0;
  while let Some(id) = current {
    let n = nodes
      .get(id.index())
      .ok_or(SceneError::UnknownNode(id.0))?;
    m = n.local * m;
    current = n.parent;
    // Parents are always added before their children, so a chain can
    // never be longer than the node list.
    steps += 1;
    if steps > nodes.len() {
      return Err(SceneError::UnknownNode(id.0));
    }
  }
  Ok(m)
}

/// A read-only scene: the node hierarchy, meshes, their instances and the
/// two-level acceleration structure over them.
pub struct Scene {
  nodes: Vec<Node>,
  meshes: Vec<Mesh>,
  instances: Vec<GeometryData>,
  tlas: Bvh,
  bounds: Aabb,
  images: ImageArray,
  sky_color: Vec3f,
  camera: Option<CameraPose>,
}

impl Scene {
  pub fn geometry(&self, instance_id: u32) -> &GeometryData {
    &self.instances[instance_id as usize]
  }

  pub fn instance_count(&self) -> usize {
    self.instances.len()
  }

  pub fn mesh(&self, id: MeshId) -> &Mesh {
    &self.meshes[id.index()]
  }

  pub fn images(&self) -> &ImageArray {
    &self.images
  }

  pub fn sky_color(&self) -> Vec3f {
    self.sky_color
  }

  pub fn camera_pose(&self) -> Option<CameraPose> {
    self.camera
  }

  /// World bounds of all instances. Empty for a scene with no geometry.
  pub fn bounds(&self) -> Aabb {
    self.bounds
  }

  pub fn node_global_matrix(&self, node: NodeId) -> Result<Mat4f, SceneError> {
    global_matrix(&self.nodes, node)
  }

  /// A pose on the +Z side of the scene that fits its bounds in a 45 degree
  /// vertical field of view.
  pub fn framing_camera_pose(&self) -> CameraPose {
    let focal_length = 1. / (std::f32::consts::FRAC_PI_4 / 2.).tan();
    if self.bounds.is_empty() {
      return CameraPose::look_at(Vec3f::unit_z(), Vec3f::zero(), focal_length);
    }
    let center = self.bounds.centroid();
    let radius = (self.bounds.extent().mag() * 0.5).max(1e-3);
    let position = center + Vec3f::unit_z() * (radius * (focal_length + 1.));
    CameraPose::look_at(position, center, focal_length)
  }
}

impl Hittable for Scene {
  fn intersect(&self, ray: &Ray) -> Option<Hit> {
    self.tlas.intersect(ray, |instance, ray| {
      let g = &self.instances[instance as usize];
      // The direction is not renormalized so that t means the same in
      // both spaces.
      let local = Ray {
        origin: transform_point(&g.world_to_obj, ray.origin),
        direction: transform_vector(&g.world_to_obj, ray.direction),
        tnear: ray.tnear,
        tfar: ray.tfar,
      };
      self.meshes[g.mesh.index()]
        .intersect(&local)
        .map(|hit| Hit {
          instance_id: instance,
          ..hit
        })
    })
  }

  fn bounds(&self) -> Aabb {
    self.bounds
  }
}
