//! Bitmap-font text: font metrics, layout and text objects

pub mod font;
pub mod layout;
pub mod text_object;

pub use font::{Font, FontCache, FontError, GlyphRect, Letter};
pub use layout::TextLayout;
pub use text_object::TextObject;
