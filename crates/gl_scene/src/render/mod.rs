//! Rendering: backend seam, meshes, camera, lights, shaders, objects and text

pub mod backend;
pub mod backends;
pub mod lighting;
pub mod object;
pub mod primitives;
pub mod shader;
pub mod text;

pub use backend::{
    BackendError, BufferHandle, BufferKind, GraphicsBackend, ProgramHandle, RenderState, TextureHandle,
    UniformLocation, UniformValue, VertexArrayHandle,
};
pub use lighting::{Light, LightError, LightRegistry, LightUniform};
pub use object::{RenderableObject, TextureSource};
pub use primitives::{Camera, CameraUniform, Mesh, MeshError, Vertex};
pub use shader::{ShaderError, ShaderKind, ShaderProgram, ShaderRegistry, ShaderSource};
pub use text::{Font, FontCache, FontError, TextLayout, TextObject};

use thiserror::Error;

use crate::assets::AssetError;
use crate::config::ConfigError;
use crate::foundation::collections::ProgramId;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Mesh parsing or validation failed
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// An asset file could not be read or decoded
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Font loading or lookup failed
    #[error(transparent)]
    Font(#[from] FontError),

    /// Shader program creation failed
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// Light registration or upload failed
    #[error(transparent)]
    Light(#[from] LightError),

    /// A backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Scene configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The program id is not registered with this scene
    #[error("unknown shader program {0:?}")]
    UnknownProgram(ProgramId),
}
