//! Loads scenes from disk.

use super::error::SceneError;
use super::materials::*;
use super::mesh::*;
use super::scene::*;
use super::types::*;
use obj::{load_obj, Obj, TexturedVertex};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_SKY_COLOR: Vec3f = Vec3f::new(0.5, 0.7, 1.0);
const DEFAULT_ALBEDO: Vec3f = Vec3f::new(0.8, 0.8, 0.8);

/// Loads the scene at `path`. The format is picked from the file extension.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase());
  match extension.as_deref() {
    Some("obj") => load_obj_scene(path),
    _ => Err(SceneError::UnsupportedFormat(path.to_path_buf())),
  }
}

/// Loads a Wavefront OBJ file as a single light grey diffuse instance under
/// the default sky. Vertices must carry normals and texture coordinates.
pub fn load_obj_scene(path: &Path) -> Result<Scene, SceneError> {
  log::info!("Loading {}", path.display());
  let input = BufReader::new(File::open(path)?);
  let model: Obj<TexturedVertex, u32> = load_obj(input).map_err(|source| SceneError::Obj {
    path: path.to_path_buf(),
    source,
  })?;
  let mut builder = SceneBuilder::new();
  let mesh = builder.add_mesh(mesh_data(&model))?;
  let root = builder.add_node(None, Mat4f::identity())?;
  builder.add_instance(root, mesh, Material::diffuse(DEFAULT_ALBEDO))?;
  builder.sky_color(DEFAULT_SKY_COLOR, 1.);
  Ok(builder.build())
}

fn mesh_data(model: &Obj<TexturedVertex, u32>) -> MeshData {
  let v = &model.vertices;
  MeshData {
    positions: v.iter().map(|v| Vec3f::from(v.position)).collect(),
    normals: v.iter().map(|v| Vec3f::from(v.normal)).collect(),
    // OBJ puts v = 0 at the bottom of the image.
    uvs: v
      .iter()
      .map(|v| Vec2f::new(v.texture[0], 1. - v.texture[1]))
      .collect(),
    indices: model.indices.clone(),
  }
}
