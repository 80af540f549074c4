//! Headless recording backend
//!
//! Allocates handles, keeps the uploaded bytes and records every call as a
//! [`GpuCommand`]. Used by the test suite and for running scene code without a
//! GL context. Creation calls can be told to fail so rollback paths can be
//! exercised.

use std::collections::{HashMap, HashSet};

use crate::assets::ImageData;
use crate::render::backend::{
    BackendError, BackendResult, BufferHandle, BufferKind, GraphicsBackend, ProgramHandle,
    RenderState, ShaderHandle, TextureHandle, UniformLocation, UniformValue, VertexArrayHandle,
};
use crate::render::primitives::mesh::VertexAttribute;
use crate::render::shader::ShaderKind;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Buffer created and filled
    CreateBuffer {
        /// New handle
        buffer: BufferHandle,
        /// Binding kind
        kind: BufferKind,
        /// Bytes uploaded
        size: usize,
    },
    /// Buffer contents replaced
    UpdateBuffer {
        /// Target buffer
        buffer: BufferHandle,
        /// Bytes uploaded
        size: usize,
    },
    /// Buffer released
    DeleteBuffer(BufferHandle),
    /// Vertex array created
    CreateVertexArray {
        /// New handle
        vertex_array: VertexArrayHandle,
        /// Attribute source
        vertex_buffer: BufferHandle,
        /// Element source
        index_buffer: BufferHandle,
    },
    /// Vertex array released
    DeleteVertexArray(VertexArrayHandle),
    /// Texture uploaded
    CreateTexture {
        /// New handle
        texture: TextureHandle,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Texture released
    DeleteTexture(TextureHandle),
    /// Uniform block binding point attached
    BindUniformBuffer {
        /// Binding point
        slot: u32,
        /// Buffer attached
        buffer: BufferHandle,
        /// Bytes in range
        size: usize,
    },
    /// Shader stage compiled
    CreateShader {
        /// New handle
        shader: ShaderHandle,
        /// Stage
        kind: ShaderKind,
    },
    /// Shader stage released
    DeleteShader(ShaderHandle),
    /// Program linked
    LinkProgram {
        /// New handle
        program: ProgramHandle,
        /// Vertex stage
        vertex: ShaderHandle,
        /// Fragment stage
        fragment: ShaderHandle,
    },
    /// Program released
    DeleteProgram(ProgramHandle),
    /// Program made current
    UseProgram(ProgramHandle),
    /// Texture bound to unit 0
    BindTexture(Option<TextureHandle>),
    /// Uniform value set
    SetUniform {
        /// Current program at the time of the call
        program: Option<ProgramHandle>,
        /// Uniform name the location resolved from
        name: String,
        /// Value written
        value: UniformValue,
    },
    /// Indexed triangle draw
    DrawIndexed {
        /// Vertex array drawn
        vertex_array: VertexArrayHandle,
        /// Number of indices
        index_count: usize,
    },
    /// Viewport changed
    SetViewport {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Pipeline state applied
    ApplyRenderState {
        /// Enabled state
        state: RenderState,
        /// Clear color
        clear_color: [f32; 4],
    },
    /// Framebuffer cleared
    Clear,
}

/// Creation step that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `create_buffer`
    Buffer,
    /// `create_vertex_array`
    VertexArray,
    /// `create_texture`
    Texture,
    /// `create_shader`
    Shader,
    /// `link_program`
    Link,
    /// `update_buffer` on an index buffer
    IndexUpload,
}

#[derive(Debug)]
struct ProgramRecord {
    /// Active uniform names; the location is the index
    uniforms: Vec<String>,
}

/// Backend that records calls instead of talking to a GPU
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    commands: Vec<GpuCommand>,
    buffers: HashMap<BufferHandle, (BufferKind, Vec<u8>)>,
    vertex_arrays: HashSet<VertexArrayHandle>,
    textures: HashMap<TextureHandle, (u32, u32)>,
    shaders: HashMap<ShaderHandle, (ShaderKind, Vec<String>)>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    uniform_slots: HashMap<u32, BufferHandle>,
    current_program: Option<ProgramHandle>,
    fail_points: HashSet<FailPoint>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of the given kind fail
    pub fn fail_on(&mut self, point: FailPoint) {
        self.fail_points.insert(point);
    }

    /// Stop injecting failures
    pub fn clear_failures(&mut self) {
        self.fail_points.clear();
    }

    /// Every call recorded so far
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drain the recorded calls
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Current contents of a live buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, data)| data.as_slice())
    }

    /// Buffer attached to a uniform binding point
    pub fn uniform_slot(&self, slot: u32) -> Option<BufferHandle> {
        self.uniform_slots.get(&slot).copied()
    }

    /// Dimensions of a live texture
    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live vertex arrays
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Number of live textures
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live programs
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Draw calls in recording order
    pub fn draw_calls(&self) -> Vec<(VertexArrayHandle, usize)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GpuCommand::DrawIndexed {
                    vertex_array,
                    index_count,
                } => Some((*vertex_array, *index_count)),
                _ => None,
            })
            .collect()
    }

    /// Values written to the named uniform, in order
    pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GpuCommand::SetUniform { name: n, value, .. } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint, resource: &'static str) -> BackendResult<()> {
        if self.fail_points.contains(&point) {
            Err(BackendError::CreationFailed {
                resource,
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn require_buffer(&self, buffer: BufferHandle) -> BackendResult<()> {
        if self.buffers.contains_key(&buffer) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle {
                resource: "buffer",
                id: buffer.0,
            })
        }
    }
}

/// Names of the plain uniforms declared in GLSL source, skipping uniform blocks
fn declared_uniforms(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let (qualifiers, declaration) = line.trim().split_once("uniform ")?;
            if !(qualifiers.is_empty() || qualifiers.starts_with("layout")) || declaration.contains('{') {
                return None;
            }
            let name = declaration.split(';').next()?.split_whitespace().last()?;
            Some(name.to_string())
        })
        .collect()
}

impl GraphicsBackend for HeadlessBackend {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        self.check(FailPoint::Buffer, "buffer")?;
        let buffer = BufferHandle(self.allocate());
        self.buffers.insert(buffer, (kind, data.to_vec()));
        self.commands.push(GpuCommand::CreateBuffer {
            buffer,
            kind,
            size: data.len(),
        });
        Ok(buffer)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, kind: BufferKind, data: &[u8]) -> BackendResult<()> {
        if kind == BufferKind::Index {
            self.check(FailPoint::IndexUpload, "index upload")?;
        }
        let entry = self.buffers.get_mut(&buffer).ok_or(BackendError::InvalidHandle {
            resource: "buffer",
            id: buffer.0,
        })?;
        *entry = (kind, data.to_vec());
        self.commands.push(GpuCommand::UpdateBuffer {
            buffer,
            size: data.len(),
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.uniform_slots.retain(|_, bound| *bound != buffer);
        self.commands.push(GpuCommand::DeleteBuffer(buffer));
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        _attributes: &[VertexAttribute],
        _stride: i32,
    ) -> BackendResult<VertexArrayHandle> {
        self.check(FailPoint::VertexArray, "vertex array")?;
        self.require_buffer(vertex_buffer)?;
        self.require_buffer(index_buffer)?;

        let vertex_array = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(vertex_array);
        self.commands.push(GpuCommand::CreateVertexArray {
            vertex_array,
            vertex_buffer,
            index_buffer,
        });
        Ok(vertex_array)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
        self.commands.push(GpuCommand::DeleteVertexArray(vertex_array));
    }

    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        self.check(FailPoint::Texture, "texture")?;
        let texture = TextureHandle(self.allocate());
        self.textures.insert(texture, (image.width, image.height));
        self.commands.push(GpuCommand::CreateTexture {
            texture,
            width: image.width,
            height: image.height,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.commands.push(GpuCommand::DeleteTexture(texture));
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle, size: usize) -> BackendResult<()> {
        self.require_buffer(buffer)?;
        self.uniform_slots.insert(slot, buffer);
        self.commands.push(GpuCommand::BindUniformBuffer { slot, buffer, size });
        Ok(())
    }

    fn create_shader(&mut self, kind: ShaderKind, source: &str) -> BackendResult<ShaderHandle> {
        self.check(FailPoint::Shader, "shader")?;
        if source.trim().is_empty() {
            return Err(BackendError::ShaderCompile("empty source".to_string()));
        }
        let shader = ShaderHandle(self.allocate());
        self.shaders.insert(shader, (kind, declared_uniforms(source)));
        self.commands.push(GpuCommand::CreateShader { shader, kind });
        Ok(shader)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
        self.commands.push(GpuCommand::DeleteShader(shader));
    }

    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> BackendResult<ProgramHandle> {
        self.check(FailPoint::Link, "program")?;

        let mut uniforms = Vec::new();
        for (shader, expected) in [(vertex, ShaderKind::Vertex), (fragment, ShaderKind::Fragment)] {
            match self.shaders.get(&shader) {
                Some((kind, names)) if *kind == expected => {
                    for name in names {
                        if !uniforms.contains(name) {
                            uniforms.push(name.clone());
                        }
                    }
                }
                Some((kind, _)) => {
                    return Err(BackendError::ProgramLink(format!(
                        "expected a {expected:?} stage, got {kind:?}"
                    )))
                }
                None => {
                    return Err(BackendError::InvalidHandle {
                        resource: "shader",
                        id: shader.0,
                    })
                }
            }
        }

        let program = ProgramHandle(self.allocate());
        self.programs.insert(program, ProgramRecord { uniforms });
        self.commands.push(GpuCommand::LinkProgram {
            program,
            vertex,
            fragment,
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.commands.push(GpuCommand::DeleteProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let record = self.programs.get(&program)?;
        let index = record.uniforms.iter().position(|u| u == name)?;
        u32::try_from(index).ok().map(UniformLocation)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.commands.push(GpuCommand::BindTexture(texture));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let name = self
            .current_program
            .and_then(|program| self.programs.get(&program))
            .and_then(|record| record.uniforms.get(location.0 as usize))
            .cloned()
            .unwrap_or_else(|| format!("<location {}>", location.0));

        self.commands.push(GpuCommand::SetUniform {
            program: self.current_program,
            name,
            value,
        });
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()> {
        if !self.vertex_arrays.contains(&vertex_array) {
            return Err(BackendError::InvalidHandle {
                resource: "vertex array",
                id: vertex_array.0,
            });
        }
        self.commands.push(GpuCommand::DrawIndexed {
            vertex_array,
            index_count,
        });
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(GpuCommand::SetViewport { width, height });
    }

    fn apply_render_state(&mut self, state: RenderState, clear_color: [f32; 4]) {
        self.commands.push(GpuCommand::ApplyRenderState { state, clear_color });
    }

    fn clear(&mut self) {
        self.commands.push(GpuCommand::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_uniforms_skip_blocks() {
        let source = "\
#version 420
layout(std140, binding = 1) uniform Camera {
    mat4 view;
};
uniform mat4 model;
layout(location = 3) uniform vec4 textColor;
in vec3 position;
";
        assert_eq!(declared_uniforms(source), vec!["model", "textColor"]);
    }

    #[test]
    fn test_deleted_buffer_is_no_longer_live() {
        let mut backend = HeadlessBackend::new();
        let buffer = backend.create_buffer(BufferKind::Vertex, &[1, 2, 3]).unwrap();
        assert_eq!(backend.buffer_data(buffer), Some(&[1u8, 2, 3][..]));

        backend.delete_buffer(buffer);
        assert_eq!(backend.live_buffers(), 0);
        assert!(backend.update_buffer(buffer, BufferKind::Vertex, &[]).is_err());
    }

    #[test]
    fn test_fail_point_only_affects_its_call() {
        let mut backend = HeadlessBackend::new();
        backend.fail_on(FailPoint::Texture);

        assert!(backend.create_buffer(BufferKind::Uniform, &[0; 4]).is_ok());
        assert!(matches!(
            backend.create_texture(&ImageData::solid_color(1, 1, [255; 4])),
            Err(BackendError::CreationFailed { resource: "texture", .. })
        ));
    }

    #[test]
    fn test_link_rejects_swapped_stages() {
        let mut backend = HeadlessBackend::new();
        let vs = backend.create_shader(ShaderKind::Vertex, "void main() {}").unwrap();
        let fs = backend.create_shader(ShaderKind::Fragment, "void main() {}").unwrap();

        assert!(matches!(backend.link_program(fs, vs), Err(BackendError::ProgramLink(_))));
        assert!(backend.link_program(vs, fs).is_ok());
    }

    #[test]
    fn test_set_uniform_records_name() {
        let mut backend = HeadlessBackend::new();
        let vs = backend
            .create_shader(ShaderKind::Vertex, "uniform mat4 model;\nvoid main() {}")
            .unwrap();
        let fs = backend.create_shader(ShaderKind::Fragment, "void main() {}").unwrap();
        let program = backend.link_program(vs, fs).unwrap();

        let location = backend.uniform_location(program, "model").unwrap();
        assert!(backend.uniform_location(program, "textColor").is_none());

        backend.use_program(program);
        backend.set_uniform(location, UniformValue::Vec2([1.0, 2.0]));
        assert_eq!(backend.uniform_values("model"), vec![UniformValue::Vec2([1.0, 2.0])]);
    }
}
