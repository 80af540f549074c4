//! Rendering primitives: meshes and the camera

pub mod camera;
pub mod mesh;

pub use camera::{Camera, CameraUniform, CAMERA_BINDING};
pub use mesh::{Mesh, MeshError, Vertex, VertexAttribute, MAX_VERTICES};
