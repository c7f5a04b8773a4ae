//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling or loading a scene. All of them are asset
/// errors: the scene is unusable and nothing is rendered.
#[derive(Error, Debug)]
pub enum SceneError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Failed to parse {path}: {source}")]
  Obj {
    path: PathBuf,
    #[source]
    source: obj::ObjError,
  },

  #[error("Unsupported scene format: {0}")]
  UnsupportedFormat(PathBuf),

  #[error("Mesh is missing the {0} vertex attribute")]
  MissingAttribute(&'static str),

  #[error("Index count {0} is not a multiple of 3")]
  InvalidIndexCount(usize),

  #[error("Vertex index {index} out of range (vertex count: {count})")]
  IndexOutOfRange { index: u32, count: usize },

  #[error("Too many images (limit: {0})")]
  TooManyImages(usize),

  #[error("Unknown node {0}")]
  UnknownNode(u32),

  #[error("Unknown mesh {0}")]
  UnknownMesh(u32),
}

/// Errors raised by the renderers.
#[derive(Error, Debug)]
pub enum RenderError {
  #[error("Invalid render settings: {0}")]
  InvalidSettings(String),

  #[error("Failed to start the device thread pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),

  #[error("Failed to write image: {0}")]
  Image(#[from] image::ImageError),
}
