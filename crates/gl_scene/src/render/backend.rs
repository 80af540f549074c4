//! Backend abstraction for the rendering system
//!
//! [`GraphicsBackend`] is the narrow set of OpenGL operations the scene needs.
//! Everything above this trait talks in typed handles; the OpenGL backend maps
//! them to `glow` objects and the headless backend records them for inspection.

use bitflags::bitflags;
use thiserror::Error;

use crate::assets::ImageData;
use crate::render::primitives::mesh::VertexAttribute;
use crate::render::shader::ShaderKind;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by a graphics backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The driver refused to create an object
    #[error("failed to create {resource}: {message}")]
    CreationFailed {
        /// Kind of object
        resource: &'static str,
        /// Driver message
        message: String,
    },

    /// Shader source did not compile
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    /// Program did not link
    #[error("program link failed: {0}")]
    ProgramLink(String),

    /// A handle that was never created or has been deleted
    #[error("invalid {resource} handle {id}")]
    InvalidHandle {
        /// Kind of object
        resource: &'static str,
        /// Raw handle value
        id: u32,
    },
}

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a vertex array object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub u32);

/// Handle to a 2D texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a compiled shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// Handle to a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Location of a uniform inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data
    Vertex,
    /// 16-bit triangle indices
    Index,
    /// Uniform block storage
    Uniform,
}

/// Value for a plain (non-block) uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Column-major 4x4 matrix
    Mat4([f32; 16]),
    /// vec4
    Vec4([f32; 4]),
    /// vec3
    Vec3([f32; 3]),
    /// vec2
    Vec2([f32; 2]),
}

bitflags! {
    /// Fixed pipeline state applied once at start-up
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderState: u32 {
        /// Cull back faces; front faces are counter-clockwise
        const CULL_BACK_FACES = 1 << 0;
        /// Depth test with a less-or-equal comparison
        const DEPTH_TEST = 1 << 1;
        /// Legacy 2D texturing switch, only meaningful on compatibility contexts
        const TEXTURE_2D = 1 << 2;
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::all()
    }
}

/// Graphics operations used by the scene
///
/// All calls happen on the rendering thread. Creation calls return handles
/// that stay valid until the matching `delete_*` call.
pub trait GraphicsBackend {
    /// Create a buffer and upload `data` into it
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle>;

    /// Replace the whole contents of a buffer
    fn update_buffer(&mut self, buffer: BufferHandle, kind: BufferKind, data: &[u8]) -> BackendResult<()>;

    /// Release a buffer
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Create a vertex array reading interleaved `attributes` from `vertex_buffer`
    /// with `index_buffer` as its element buffer
    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        attributes: &[VertexAttribute],
        stride: i32,
    ) -> BackendResult<VertexArrayHandle>;

    /// Release a vertex array
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Upload an RGBA8 image as a 2D texture with linear filtering
    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle>;

    /// Release a texture
    fn delete_texture(&mut self, texture: TextureHandle);

    /// Attach `size` bytes of a uniform buffer to a block binding point
    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle, size: usize) -> BackendResult<()>;

    /// Compile one shader stage
    fn create_shader(&mut self, kind: ShaderKind, source: &str) -> BackendResult<ShaderHandle>;

    /// Release a shader stage
    fn delete_shader(&mut self, shader: ShaderHandle);

    /// Link a vertex and a fragment stage into a program
    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> BackendResult<ProgramHandle>;

    /// Release a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Look up a uniform by name; `None` when the program has no such active uniform
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Make `program` current
    fn use_program(&mut self, program: ProgramHandle);

    /// Bind a texture to unit 0, or unbind with `None`
    fn bind_texture(&mut self, texture: Option<TextureHandle>);

    /// Set a uniform on the current program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Draw `index_count` indices as triangles
    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()>;

    /// Set the viewport to cover `width` x `height` pixels
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Apply fixed pipeline state and the clear color
    fn apply_render_state(&mut self, state: RenderState, clear_color: [f32; 4]);

    /// Clear color and depth
    fn clear(&mut self);
}
