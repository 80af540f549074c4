//! OpenGL backend through `glow`
//!
//! Wraps a caller-created [`glow::Context`]; window and context creation stay
//! with the application. Requires OpenGL 4.2 (explicit uniform block bindings).

#![allow(unsafe_code)]

use std::num::NonZeroU32;

use glow::HasContext;

use crate::assets::ImageData;
use crate::render::backend::{
    BackendError, BackendResult, BufferHandle, BufferKind, GraphicsBackend, ProgramHandle,
    RenderState, ShaderHandle, TextureHandle, UniformLocation, UniformValue, VertexArrayHandle,
};
use crate::render::primitives::mesh::VertexAttribute;
use crate::render::shader::ShaderKind;

/// OpenGL implementation of [`GraphicsBackend`]
pub struct OpenGlBackend {
    gl: glow::Context,
}

impl OpenGlBackend {
    /// Wrap a current GL context
    pub fn new(gl: glow::Context) -> Self {
        // SAFETY: the caller hands over a context that is current on this thread
        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        log::info!("OpenGL backend on {}", version);
        Self { gl }
    }

    /// Underlying context, for callers that issue their own GL calls
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

fn gl_size(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn native<T>(id: u32, resource: &'static str, wrap: fn(NonZeroU32) -> T) -> BackendResult<T> {
    NonZeroU32::new(id)
        .map(wrap)
        .ok_or(BackendError::InvalidHandle { resource, id })
}

fn creation_failed(resource: &'static str) -> impl FnOnce(String) -> BackendError {
    move |message| BackendError::CreationFailed { resource, message }
}

/// Upload target for a buffer kind. Element-array binding is vertex array
/// state, so index data is uploaded through the array target.
const fn upload_target(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex | BufferKind::Index => glow::ARRAY_BUFFER,
        BufferKind::Uniform => glow::UNIFORM_BUFFER,
    }
}

const fn usage(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex | BufferKind::Index => glow::STATIC_DRAW,
        BufferKind::Uniform => glow::DYNAMIC_DRAW,
    }
}

impl GraphicsBackend for OpenGlBackend {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let target = upload_target(kind);
        unsafe {
            let buffer = self.gl.create_buffer().map_err(creation_failed("buffer"))?;
            self.gl.bind_buffer(target, Some(buffer));
            self.gl.buffer_data_u8_slice(target, data, usage(kind));
            self.gl.bind_buffer(target, None);
            log::trace!("Created {:?} buffer {} ({} bytes)", kind, buffer.0, data.len());
            Ok(BufferHandle(buffer.0.get()))
        }
    }

    fn update_buffer(&mut self, buffer: BufferHandle, kind: BufferKind, data: &[u8]) -> BackendResult<()> {
        let native_buffer = native(buffer.0, "buffer", glow::NativeBuffer)?;
        let target = upload_target(kind);
        unsafe {
            self.gl.bind_buffer(target, Some(native_buffer));
            self.gl.buffer_data_u8_slice(target, data, usage(kind));
            self.gl.bind_buffer(target, None);
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Ok(native_buffer) = native(buffer.0, "buffer", glow::NativeBuffer) {
            unsafe { self.gl.delete_buffer(native_buffer) };
        }
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        attributes: &[VertexAttribute],
        stride: i32,
    ) -> BackendResult<VertexArrayHandle> {
        let vbo = native(vertex_buffer.0, "buffer", glow::NativeBuffer)?;
        let ibo = native(index_buffer.0, "buffer", glow::NativeBuffer)?;

        unsafe {
            let vao = self
                .gl
                .create_vertex_array()
                .map_err(creation_failed("vertex array"))?;
            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));

            for attribute in attributes {
                self.gl.enable_vertex_attrib_array(attribute.location);
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components,
                    glow::FLOAT,
                    false,
                    stride,
                    attribute.offset,
                );
            }

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(VertexArrayHandle(vao.0.get()))
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if let Ok(vao) = native(vertex_array.0, "vertex array", glow::NativeVertexArray) {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }

    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        let width = i32::try_from(image.width).map_err(|e| creation_failed("texture")(e.to_string()))?;
        let height = i32::try_from(image.height).map_err(|e| creation_failed("texture")(e.to_string()))?;

        unsafe {
            let texture = self.gl.create_texture().map_err(creation_failed("texture"))?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(&image.data),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            log::debug!("Uploaded {}x{} texture {}", image.width, image.height, texture.0);
            Ok(TextureHandle(texture.0.get()))
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if let Ok(native_texture) = native(texture.0, "texture", glow::NativeTexture) {
            unsafe { self.gl.delete_texture(native_texture) };
        }
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle, size: usize) -> BackendResult<()> {
        let native_buffer = native(buffer.0, "buffer", glow::NativeBuffer)?;
        unsafe {
            self.gl
                .bind_buffer_range(glow::UNIFORM_BUFFER, slot, Some(native_buffer), 0, gl_size(size));
        }
        Ok(())
    }

    fn create_shader(&mut self, kind: ShaderKind, source: &str) -> BackendResult<ShaderHandle> {
        let stage = match kind {
            ShaderKind::Vertex => glow::VERTEX_SHADER,
            ShaderKind::Fragment => glow::FRAGMENT_SHADER,
        };

        unsafe {
            let shader = self.gl.create_shader(stage).map_err(creation_failed("shader"))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);

            if !self.gl.get_shader_compile_status(shader) {
                let info = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                log::error!("{:?} shader failed to compile: {}", kind, info);
                return Err(BackendError::ShaderCompile(info));
            }
            Ok(ShaderHandle(shader.0.get()))
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if let Ok(native_shader) = native(shader.0, "shader", glow::NativeShader) {
            unsafe { self.gl.delete_shader(native_shader) };
        }
    }

    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> BackendResult<ProgramHandle> {
        let vs = native(vertex.0, "shader", glow::NativeShader)?;
        let fs = native(fragment.0, "shader", glow::NativeShader)?;

        unsafe {
            let program = self.gl.create_program().map_err(creation_failed("program"))?;
            self.gl.attach_shader(program, vs);
            self.gl.attach_shader(program, fs);
            self.gl.link_program(program);
            self.gl.detach_shader(program, vs);
            self.gl.detach_shader(program, fs);

            if !self.gl.get_program_link_status(program) {
                let info = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                log::error!("Program failed to link: {}", info);
                return Err(BackendError::ProgramLink(info));
            }
            Ok(ProgramHandle(program.0.get()))
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if let Ok(native_program) = native(program.0, "program", glow::NativeProgram) {
            unsafe { self.gl.delete_program(native_program) };
        }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let native_program = native(program.0, "program", glow::NativeProgram).ok()?;
        unsafe { self.gl.get_uniform_location(native_program, name) }.map(|location| UniformLocation(location.0))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let native_program = native(program.0, "program", glow::NativeProgram).ok();
        unsafe { self.gl.use_program(native_program) };
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        let native_texture = texture.and_then(|t| native(t.0, "texture", glow::NativeTexture).ok());
        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, native_texture);
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe {
            match value {
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(Some(&location), false, &m),
                UniformValue::Vec4([x, y, z, w]) => self.gl.uniform_4_f32(Some(&location), x, y, z, w),
                UniformValue::Vec3([x, y, z]) => self.gl.uniform_3_f32(Some(&location), x, y, z),
                UniformValue::Vec2([x, y]) => self.gl.uniform_2_f32(Some(&location), x, y),
            }
        }
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: usize) -> BackendResult<()> {
        let vao = native(vertex_array.0, "vertex array", glow::NativeVertexArray)?;
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl
                .draw_elements(glow::TRIANGLES, gl_size(index_count), glow::UNSIGNED_SHORT, 0);
            self.gl.bind_vertex_array(None);
        }
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        unsafe { self.gl.viewport(0, 0, width, height) };
    }

    fn apply_render_state(&mut self, state: RenderState, clear_color: [f32; 4]) {
        unsafe {
            if state.contains(RenderState::CULL_BACK_FACES) {
                self.gl.enable(glow::CULL_FACE);
                self.gl.cull_face(glow::BACK);
                self.gl.front_face(glow::CCW);
            } else {
                self.gl.disable(glow::CULL_FACE);
            }

            if state.contains(RenderState::DEPTH_TEST) {
                self.gl.enable(glow::DEPTH_TEST);
                self.gl.depth_func(glow::LEQUAL);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }

            // Core profiles reject this enum
            if state.contains(RenderState::TEXTURE_2D) {
                let profile = self.gl.get_parameter_i32(glow::CONTEXT_PROFILE_MASK);
                if profile & glow::CONTEXT_CORE_PROFILE_BIT as i32 == 0 {
                    self.gl.enable(glow::TEXTURE_2D);
                } else {
                    log::debug!("Core profile context, skipping TEXTURE_2D enable");
                }
            }

            let [r, g, b, a] = clear_color;
            self.gl.clear_color(r, g, b, a);
        }
    }

    fn clear(&mut self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT) };
    }
}
