//! Text objects
//!
//! [`TextObject`] wraps a [`RenderableObject`] whose mesh is the laid-out
//! string and whose texture is the font atlas. Rendering goes through the
//! object's normal path with the text color and offset uniforms added between
//! binding and drawing.

use std::sync::Arc;

use crate::foundation::collections::ProgramId;
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::physics::collision::Ray;
use crate::render::backend::{GraphicsBackend, UniformValue};
use crate::render::object::{RenderableObject, TextureSource};
use crate::render::text::font::Font;
use crate::render::text::layout::TextLayout;
use crate::render::RenderError;
use crate::scene::{Frame, SceneContext};

/// A line of text drawn with a bitmap font
#[derive(Debug)]
pub struct TextObject {
    object: RenderableObject,
    font: Arc<Font>,
    text: String,
    color: Vec4,
    offset: Vec2,
}

impl TextObject {
    /// Lay out `text` in the named font and upload it
    ///
    /// Configured fonts are loaded on the first call.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        context: &mut SceneContext,
        text: &str,
        font_name: &str,
        program: ProgramId,
    ) -> Result<Self, RenderError> {
        context.load_fonts()?;
        let font = context.fonts().get(font_name)?;
        let mesh = TextLayout::layout(&font, text)?;

        let object = RenderableObject::new(
            backend,
            context,
            mesh,
            TextureSource::File(font.atlas_path().to_path_buf()),
            program,
            false,
        )?;

        Ok(Self {
            object,
            font,
            text: text.to_string(),
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            offset: Vec2::zeros(),
        })
    }

    /// Current string
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Font in use
    pub fn font(&self) -> &Font {
        &self.font
    }

    /// Replace the string, re-uploading the quads
    pub fn set_text(&mut self, backend: &mut dyn GraphicsBackend, text: &str) -> Result<(), RenderError> {
        let mesh = TextLayout::layout(&self.font, text)?;
        self.object.update_buffer_objects(backend, mesh)?;
        self.text = text.to_string();
        Ok(())
    }

    /// RGBA tint
    pub fn color(&self) -> Vec4 {
        self.color
    }

    /// Set the RGBA tint
    pub fn set_color(&mut self, color: Vec4) {
        self.color = color;
    }

    /// Offset added to every glyph position, in text units
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Set the glyph offset
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Place the text in the world
    pub fn set_position(&mut self, position: Vec3) {
        self.object.set_position(position);
    }

    /// Underlying object, for transforms
    pub fn object(&self) -> &RenderableObject {
        &self.object
    }

    /// Underlying object, for transforms
    pub fn object_mut(&mut self) -> &mut RenderableObject {
        &mut self.object
    }

    /// Text quads are never pickable
    pub fn check_for_collision(&self, ray: &Ray) -> bool {
        self.object.check_for_collision(ray)
    }

    /// Draw the text
    pub fn render(&self, backend: &mut dyn GraphicsBackend, frame: &Frame<'_>) -> Result<(), RenderError> {
        let program = self.object.bind(backend, frame)?;

        if let Some(location) = program.text_color_location() {
            backend.set_uniform(location, UniformValue::Vec4(self.color.into()));
        }
        if let Some(location) = program.text_offset_location() {
            backend.set_uniform(location, UniformValue::Vec2(self.offset.into()));
        }

        self.object.draw(backend)
    }

    /// Release the GPU handles
    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        self.object.destroy(backend);
    }
}
