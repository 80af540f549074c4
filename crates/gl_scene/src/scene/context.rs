//! Scene context
//!
//! [`SceneContext`] owns the per-scene state every renderable needs: the
//! camera and its uniform block, the light registry, the shader registry and
//! the font cache. Objects, text and lights can only be created against an
//! initialized context, so start-up order is enforced by the types.
//!
//! Per frame, [`SceneContext::begin_frame`] flushes pending viewport, camera and
//! light changes and hands out a [`Frame`]. The frame borrows the context
//! immutably, so scene state cannot change while objects are being drawn.

use crate::config::SceneConfig;
use crate::foundation::collections::{LightId, ProgramId};
use crate::foundation::math::Vec3;
use crate::physics::collision::Ray;
use crate::render::backend::{BufferHandle, BufferKind, GraphicsBackend, RenderState};
use crate::render::lighting::LightRegistry;
use crate::render::primitives::camera::{Camera, CameraUniform, CAMERA_BINDING};
use crate::render::shader::{ShaderProgram, ShaderRegistry};
use crate::render::text::font::{FontCache, FontError};
use crate::render::RenderError;

/// Shared scene state
#[derive(Debug)]
pub struct SceneContext {
    config: SceneConfig,
    camera: Camera,
    camera_buffer: BufferHandle,
    lights: LightRegistry,
    shaders: ShaderRegistry,
    fonts: FontCache,
    pending_viewport: Option<(u32, u32)>,
}

impl SceneContext {
    /// Validate the configuration, apply render state and create the camera block
    pub fn initialize(backend: &mut dyn GraphicsBackend, config: SceneConfig) -> Result<Self, RenderError> {
        config.validate()?;

        let (width, height) = (config.window.width, config.window.height);
        backend.apply_render_state(RenderState::default(), config.window.clear_color);
        backend.set_viewport(width, height);

        let mut camera = Camera::from_config(&config.camera, width, height);
        let camera_buffer = backend.create_buffer(BufferKind::Uniform, bytemuck::bytes_of(&camera.uniform()))?;
        if let Err(e) =
            backend.bind_uniform_buffer(CAMERA_BINDING, camera_buffer, std::mem::size_of::<CameraUniform>())
        {
            backend.delete_buffer(camera_buffer);
            return Err(e.into());
        }
        camera.take_dirty();

        log::info!(
            "Scene initialized: {}x{}, camera at {:?}, {} font source(s)",
            width,
            height,
            camera.location(),
            config.fonts.len()
        );

        Ok(Self {
            config,
            camera,
            camera_buffer,
            lights: LightRegistry::new(),
            shaders: ShaderRegistry::new(),
            fonts: FontCache::new(),
            pending_viewport: None,
        })
    }

    /// Configuration the scene was created with
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The camera, for pan/zoom/set_position
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Registered lights
    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    /// Registered lights, for moving and recoloring
    pub fn lights_mut(&mut self) -> &mut LightRegistry {
        &mut self.lights
    }

    /// Register a light
    pub fn add_light(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        location: Vec3,
        color: Vec3,
    ) -> Result<LightId, RenderError> {
        Ok(self.lights.add(backend, name, location, color)?)
    }

    /// Linked shader programs
    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    /// Linked shader programs, for registering new ones
    pub fn shaders_mut(&mut self) -> &mut ShaderRegistry {
        &mut self.shaders
    }

    /// Program by id
    pub fn program(&self, id: ProgramId) -> Result<&ShaderProgram, RenderError> {
        self.shaders.get(id).ok_or(RenderError::UnknownProgram(id))
    }

    /// Loaded fonts
    pub fn fonts(&self) -> &FontCache {
        &self.fonts
    }

    /// Loaded fonts, for adding fonts built in memory
    pub fn fonts_mut(&mut self) -> &mut FontCache {
        &mut self.fonts
    }

    /// Load the configured fonts that are not loaded yet
    pub fn load_fonts(&mut self) -> Result<(), FontError> {
        self.fonts.ensure_loaded(&self.config.fonts)
    }

    /// React to a window resize
    ///
    /// The camera aspect and pick mapping change immediately; the viewport is
    /// applied at the next [`begin_frame`](Self::begin_frame). Zero sizes
    /// (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        self.camera.resize(width, height);
        self.pending_viewport = Some((width, height));
    }

    /// Pick ray through a window pixel
    pub fn pick_ray(&self, x: f32, y: f32) -> Option<Ray> {
        self.camera.pick_ray(x, y)
    }

    /// Upload pending changes, clear the framebuffer and start drawing
    pub fn begin_frame(&mut self, backend: &mut dyn GraphicsBackend) -> Result<Frame<'_>, RenderError> {
        if let Some((width, height)) = self.pending_viewport.take() {
            backend.set_viewport(width, height);
        }

        if self.camera.is_dirty() {
            backend.update_buffer(
                self.camera_buffer,
                BufferKind::Uniform,
                bytemuck::bytes_of(&self.camera.uniform()),
            )?;
            self.camera.take_dirty();
            log::trace!("Camera block uploaded");
        }

        self.lights.flush(backend)?;
        backend.clear();

        Ok(Frame { context: self })
    }

    /// Release the camera block, lights and programs
    pub fn destroy(mut self, backend: &mut dyn GraphicsBackend) {
        self.shaders.destroy_all(backend);
        self.lights.destroy_all(backend);
        backend.delete_buffer(self.camera_buffer);
    }
}

/// Token for drawing one frame
///
/// Holding a `Frame` keeps the scene context immutably borrowed, so camera and
/// light uploads always happen before any object of the frame is drawn.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    context: &'a SceneContext,
}

impl<'a> Frame<'a> {
    /// Scene being drawn
    pub fn context(&self) -> &'a SceneContext {
        self.context
    }

    /// Camera for this frame
    pub fn camera(&self) -> &'a Camera {
        &self.context.camera
    }
}
