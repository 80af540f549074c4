//! Bitmap fonts
//!
//! A font is a fixed-cell atlas image plus a metrics table in the CSV form
//! written by common bitmap font generators:
//!
//! ```text
//! Image Width,256
//! Image Height,256
//! Cell Width,16
//! Cell Height,16
//! Font Name,Arial
//! Start Char,32
//! Char 65 Base Width,11
//! Char 65 Width Offset,0
//! Char 65 X Offset,0
//! Char 65 Y Offset,0
//! ```
//!
//! Per-glyph labels may also be written without the `Char` prefix
//! (`Base Width 65,11`). Numbers that do not parse read as 0.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::assets::{read_to_string, require_file, AssetError};
use crate::config::FontSource;

/// Number of character codes a font covers
pub const GLYPH_COUNT: usize = 256;

/// Font loading and lookup errors
#[derive(Error, Debug)]
pub enum FontError {
    /// Metrics or atlas file missing or unreadable
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// No loaded font has this name
    #[error("font '{0}' not found")]
    FontNotFound(String),

    /// The metrics describe an unusable atlas
    #[error("invalid metrics for font '{font}': {message}")]
    InvalidMetrics {
        /// Font name, or the atlas path when unnamed
        font: String,
        /// What is wrong
        message: String,
    },
}

/// Metrics for one character code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Letter {
    /// Width of the glyph in pixels
    pub base_width: i32,
    /// Extra advance
    pub width_offset: i32,
    /// Horizontal bearing
    pub x_offset: i32,
    /// Vertical bearing
    pub y_offset: i32,
}

/// Pixel rectangle of a glyph inside the atlas, top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Glyph width
    pub width: f32,
    /// Cell height
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LetterField {
    BaseWidth,
    WidthOffset,
    XOffset,
    YOffset,
}

impl LetterField {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Base Width" => Some(Self::BaseWidth),
            "Width Offset" => Some(Self::WidthOffset),
            "X Offset" | "XOffset" => Some(Self::XOffset),
            "Y Offset" | "YOffset" => Some(Self::YOffset),
            _ => None,
        }
    }
}

/// A loaded bitmap font
#[derive(Debug, Clone)]
pub struct Font {
    name: String,
    image_width: u32,
    image_height: u32,
    cell_width: u32,
    cell_height: u32,
    start_char: u32,
    letters: Vec<Letter>,
    atlas: PathBuf,
}

impl Font {
    /// Load a font from its metrics file and atlas image
    ///
    /// Both files must exist; the atlas is decoded later, when a text object
    /// uploads it.
    pub fn load(metrics: impl AsRef<Path>, atlas: impl AsRef<Path>) -> Result<Self, FontError> {
        let metrics = metrics.as_ref();
        let atlas = atlas.as_ref();
        require_file(metrics)?;
        require_file(atlas)?;

        let font = Self::from_metrics_str(&read_to_string(metrics)?, atlas)?;
        log::info!(
            "Loaded font '{}' ({}x{} atlas, {}x{} cells)",
            font.name,
            font.image_width,
            font.image_height,
            font.cell_width,
            font.cell_height
        );
        Ok(font)
    }

    /// Build a font from metrics text already in memory
    pub fn from_metrics_str(metrics: &str, atlas: impl Into<PathBuf>) -> Result<Self, FontError> {
        let mut font = Self {
            name: String::new(),
            image_width: 0,
            image_height: 0,
            cell_width: 0,
            cell_height: 0,
            start_char: 0,
            letters: vec![Letter::default(); GLYPH_COUNT],
            atlas: atlas.into(),
        };

        for line in metrics.lines() {
            font.parse_line(line);
        }

        if font.name.is_empty() {
            font.name = font
                .atlas
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        font.validate()?;
        Ok(font)
    }

    fn parse_line(&mut self, line: &str) {
        let Some((label, value)) = line.split_once(',') else {
            return;
        };
        let label = label.trim();
        let value = value.trim();

        match label {
            "Image Width" => self.image_width = parse_or_zero(value),
            "Image Height" => self.image_height = parse_or_zero(value),
            "Cell Width" => self.cell_width = parse_or_zero(value),
            "Cell Height" => self.cell_height = parse_or_zero(value),
            "Start Char" => self.start_char = parse_or_zero(value),
            "Font Name" => self.name = value.to_string(),
            _ => self.parse_letter(label, value),
        }
    }

    /// Per-glyph record: the numeric token is the code, the rest names the field
    fn parse_letter(&mut self, label: &str, value: &str) {
        let mut code = None;
        let mut words = Vec::new();
        for token in label.split_whitespace() {
            match token.parse::<usize>() {
                Ok(n) if code.is_none() => code = Some(n),
                _ if token == "Char" => {}
                _ => words.push(token),
            }
        }

        let Some(field) = LetterField::from_label(&words.join(" ")) else {
            log::trace!("Ignoring font metric '{}'", label);
            return;
        };
        let Some(code) = code else {
            log::trace!("Ignoring font metric without a character code: '{}'", label);
            return;
        };
        let Some(letter) = self.letters.get_mut(code) else {
            log::debug!("Ignoring metrics for character code {} (outside 0..{})", code, GLYPH_COUNT);
            return;
        };

        let value: i32 = parse_or_zero(value);
        match field {
            LetterField::BaseWidth => letter.base_width = value,
            LetterField::WidthOffset => letter.width_offset = value,
            LetterField::XOffset => letter.x_offset = value,
            LetterField::YOffset => letter.y_offset = value,
        }
    }

    fn validate(&self) -> Result<(), FontError> {
        let invalid = |message: String| FontError::InvalidMetrics {
            font: self.name.clone(),
            message,
        };

        if self.image_width == 0 || self.image_height == 0 {
            return Err(invalid(format!(
                "image size {}x{} must be non-zero",
                self.image_width, self.image_height
            )));
        }
        if self.cell_width == 0 || self.cell_height == 0 {
            return Err(invalid(format!(
                "cell size {}x{} must be non-zero",
                self.cell_width, self.cell_height
            )));
        }
        if self.cell_width > self.image_width || self.cell_height > self.image_height {
            return Err(invalid(format!(
                "cell {}x{} does not fit in image {}x{}",
                self.cell_width, self.cell_height, self.image_width, self.image_height
            )));
        }
        Ok(())
    }

    /// Font name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atlas image path
    pub fn atlas_path(&self) -> &Path {
        &self.atlas
    }

    /// Atlas size in pixels
    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    /// Cell size in pixels
    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    /// First character code stored in the atlas
    pub fn start_char(&self) -> u32 {
        self.start_char
    }

    /// Metrics for a character code
    pub fn letter(&self, code: u32) -> Option<&Letter> {
        self.letters.get(code as usize)
    }

    /// Atlas rectangle of a character
    ///
    /// Cells are laid out row by row starting at `Start Char`. Returns `None`
    /// for codes before the start character or outside the 256-code table,
    /// and when the cell origin does not fit in `u32` pixels.
    pub fn glyph_rect(&self, code: u32) -> Option<GlyphRect> {
        let letter = self.letter(code)?;
        let index = code.checked_sub(self.start_char)?;

        let cells_per_row = self.image_width / self.cell_width;
        let column = index % cells_per_row;
        let row = index / cells_per_row;
        let x = column.checked_mul(self.cell_width)?;
        let y = row.checked_mul(self.cell_height)?;

        Some(GlyphRect {
            x: x as f32,
            y: y as f32,
            width: letter.base_width as f32,
            height: self.cell_height as f32,
        })
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: &str) -> T {
    value.trim().parse().unwrap_or_default()
}

/// Fonts keyed by name
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: HashMap<String, Arc<Font>>,
    loaded_sources: HashSet<PathBuf>,
}

impl FontCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every source not loaded before
    pub fn ensure_loaded(&mut self, sources: &[FontSource]) -> Result<(), FontError> {
        for source in sources {
            if self.loaded_sources.contains(&source.metrics) {
                continue;
            }
            let font = Font::load(&source.metrics, &source.atlas)?;
            self.insert(font);
            self.loaded_sources.insert(source.metrics.clone());
        }
        Ok(())
    }

    /// Add a font, replacing any font of the same name
    pub fn insert(&mut self, font: Font) -> Arc<Font> {
        let font = Arc::new(font);
        if self.fonts.insert(font.name().to_string(), Arc::clone(&font)).is_some() {
            log::warn!("Font '{}' replaced", font.name());
        }
        font
    }

    /// Font by name
    pub fn get(&self, name: &str) -> Result<Arc<Font>, FontError> {
        self.fonts
            .get(name)
            .cloned()
            .ok_or_else(|| FontError::FontNotFound(name.to_string()))
    }

    /// Number of fonts
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// True when no font is loaded
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ARIAL_METRICS: &str = "\
Image Width,256
Image Height,256
Cell Width,16
Cell Height,16
Start Char,32
Font Name,Arial
Font Height,16
Global Width Offset,0
Char 32 Base Width,5
Char 65 Base Width,11
Char 65 Width Offset,1
Char 65 X Offset,0
Char 65 Y Offset,2
Char 66 Base Width,10
Char 300 Base Width,99
";

    pub(crate) fn arial() -> Font {
        Font::from_metrics_str(ARIAL_METRICS, "Font_Arial.bmp").unwrap()
    }

    #[test]
    fn test_header_fields() {
        let font = arial();
        assert_eq!(font.name(), "Arial");
        assert_eq!(font.image_size(), (256, 256));
        assert_eq!(font.cell_size(), (16, 16));
        assert_eq!(font.start_char(), 32);
    }

    #[test]
    fn test_letter_fields_in_both_label_forms() {
        let font = Font::from_metrics_str(
            "Image Width,64\nImage Height,64\nCell Width,8\nCell Height,8\nBase Width 65,7\nXOffset 65,3\nY Offset 65,-1\n",
            "a.bmp",
        )
        .unwrap();

        let a = font.letter(65).unwrap();
        assert_eq!((a.base_width, a.x_offset, a.y_offset), (7, 3, -1));
        // Unnamed fonts take the atlas file name
        assert_eq!(font.name(), "a");

        let a = *arial().letter(65).unwrap();
        assert_eq!(
            a,
            Letter {
                base_width: 11,
                width_offset: 1,
                x_offset: 0,
                y_offset: 2
            }
        );
    }

    #[test]
    fn test_glyph_grid_position() {
        let font = arial();
        // 'A' is 33 cells after ' ', 16 cells per row: row 2, column 1
        let rect = font.glyph_rect(u32::from(b'A')).unwrap();
        assert_eq!(
            rect,
            GlyphRect {
                x: 16.0,
                y: 32.0,
                width: 11.0,
                height: 16.0
            }
        );

        let space = font.glyph_rect(32).unwrap();
        assert_eq!((space.x, space.y, space.width), (0.0, 0.0, 5.0));

        // First cell of the second row
        let cells_per_row = 256 / 16;
        let wrapped = font.glyph_rect(32 + cells_per_row).unwrap();
        assert_eq!((wrapped.x, wrapped.y), (0.0, 16.0));
    }

    #[test]
    fn test_tall_atlas_row_offset_overflow_has_no_glyph() {
        let font = Font::from_metrics_str(
            "Image Width,8\nImage Height,20000000\nCell Width,8\nCell Height,20000000\nStart Char,0\nChar 1 Base Width,4\nChar 255 Base Width,4\n",
            "tall.bmp",
        )
        .unwrap();

        // Row 255 starts at 255 * 20000000, past u32::MAX
        assert!(font.glyph_rect(255).is_none());
        assert_eq!(font.glyph_rect(1).unwrap().y, 20_000_000.0);
    }

    #[test]
    fn test_codes_outside_table_have_no_glyph() {
        let font = arial();
        assert!(font.glyph_rect(31).is_none());
        assert!(font.glyph_rect(256).is_none());
        assert!(font.glyph_rect(300).is_none());
    }

    #[test]
    fn test_bad_numbers_read_as_zero() {
        let font = Font::from_metrics_str(
            "Image Width,64\nImage Height,64\nCell Width,8\nCell Height,8\nChar 65 Base Width,wide\n",
            "a.bmp",
        )
        .unwrap();
        assert_eq!(font.letter(65).unwrap().base_width, 0);
    }

    #[test]
    fn test_invalid_cell_geometry_rejected() {
        for metrics in [
            "Image Width,64\nImage Height,64\nCell Width,0\nCell Height,8\n",
            "Image Width,64\nImage Height,64\nCell Width,128\nCell Height,8\n",
            "Cell Width,8\nCell Height,8\n",
        ] {
            assert!(matches!(
                Font::from_metrics_str(metrics, "a.bmp"),
                Err(FontError::InvalidMetrics { .. })
            ));
        }
    }

    #[test]
    fn test_missing_files_report_path() {
        let dir = std::env::temp_dir();
        let metrics = dir.join(format!("gl_scene_font_{}.csv", std::process::id()));
        let atlas = dir.join("gl_scene_font_missing_atlas.bmp");
        std::fs::write(&metrics, ARIAL_METRICS).unwrap();

        let err = Font::load(&metrics, &atlas).unwrap_err();
        std::fs::remove_file(&metrics).ok();
        match err {
            FontError::Asset(AssetError::ResourceNotFound { path }) => assert_eq!(path, atlas),
            other => panic!("expected ResourceNotFound, got {other:?}"),
        }

        let missing_metrics = dir.join("gl_scene_font_missing.csv");
        assert!(matches!(
            Font::load(&missing_metrics, &atlas),
            Err(FontError::Asset(AssetError::ResourceNotFound { path })) if path == missing_metrics
        ));
    }

    #[test]
    fn test_cache_lookup() {
        let mut cache = FontCache::new();
        cache.insert(arial());

        assert_eq!(cache.get("Arial").unwrap().name(), "Arial");
        assert!(matches!(cache.get("Courier"), Err(FontError::FontNotFound(name)) if name == "Courier"));
    }
}
