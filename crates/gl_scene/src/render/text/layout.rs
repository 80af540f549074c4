//! Single-line text layout
//!
//! Turns a string into one textured quad per character. Quads sit side by
//! side starting at the origin, top edge on y = 0, growing towards -y.

use crate::render::primitives::mesh::{Mesh, MeshError, Vertex, MAX_VERTICES};
use crate::render::text::font::Font;

const FACING: [f32; 3] = [0.0, 0.0, 1.0];

/// Text to quad mesh conversion
pub struct TextLayout;

impl TextLayout {
    /// Lay out `text` with `font`
    ///
    /// Each quad is as wide as its glyph and as tall as the font cell; the x
    /// position advances by the glyph width. Characters without a glyph are
    /// skipped. Texture coordinates use a top-left origin like the atlas
    /// image. Quads wind counter-clockwise when seen from +z.
    pub fn layout(font: &Font, text: &str) -> Result<Mesh, MeshError> {
        let (atlas_width, atlas_height) = font.image_size();
        let (atlas_width, atlas_height) = (atlas_width as f32, atlas_height as f32);

        let mut vertices = Vec::with_capacity(text.len() * 4);
        let mut indices = Vec::with_capacity(text.len() * 6);
        let mut cursor = 0.0_f32;

        for ch in text.chars() {
            let Some(rect) = font.glyph_rect(u32::from(ch)) else {
                log::trace!("No glyph for {:?} in font '{}'", ch, font.name());
                continue;
            };

            if vertices.len() + 4 > MAX_VERTICES {
                return Err(MeshError::CapacityExceeded { limit: MAX_VERTICES });
            }

            let (left, right) = (cursor, cursor + rect.width);
            let (top, bottom) = (0.0, -rect.height);

            let u0 = rect.x / atlas_width;
            let u1 = (rect.x + rect.width) / atlas_width;
            let v0 = rect.y / atlas_height;
            let v1 = (rect.y + rect.height) / atlas_height;

            let base = vertices.len() as u16;
            vertices.extend_from_slice(&[
                Vertex::new([left, top, 0.0], [u0, v0], FACING),
                Vertex::new([left, bottom, 0.0], [u0, v1], FACING),
                Vertex::new([right, bottom, 0.0], [u1, v1], FACING),
                Vertex::new([right, top, 0.0], [u1, v0], FACING),
            ]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);

            cursor = right;
        }

        Mesh::new(vertices, indices)
    }
}
