//! Bitmap fonts and glyph quad layout

use crate::backend::types::{TextureHandle, TexturedVertex};
use crate::error::{RenderResult, RendererError};
use glam::{Vec2, Vec3};

/// Number of character codes a font can describe
pub const GLYPH_COUNT: usize = 256;

/// One character's atlas rectangle, screen size and draw offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Top-left corner of the glyph in the atlas
    pub uv_origin: Vec2,
    /// Extent of the glyph in the atlas
    pub uv_size: Vec2,
    /// Quad size before scaling
    pub size: Vec2,
    /// Shift from the cursor applied by `render_string`; `render_char` ignores it
    pub offset: Vec2,
}

impl Glyph {
    pub fn new(uv_origin: Vec2, uv_size: Vec2, size: Vec2, offset: Vec2) -> Self {
        Self {
            uv_origin,
            uv_size,
            size,
            offset,
        }
    }

    /// Quad corners at `origin`, growing right and down, in the order
    /// top-left, top-right, bottom-right, bottom-left
    pub fn quad(&self, origin: Vec2, scale: f32) -> [TexturedVertex; 4] {
        let extent = self.size * scale;
        let uv_end = self.uv_origin + self.uv_size;
        [
            TexturedVertex::new(Vec3::new(origin.x, origin.y, 0.0), self.uv_origin),
            TexturedVertex::new(
                Vec3::new(origin.x + extent.x, origin.y, 0.0),
                Vec2::new(uv_end.x, self.uv_origin.y),
            ),
            TexturedVertex::new(Vec3::new(origin.x + extent.x, origin.y - extent.y, 0.0), uv_end),
            TexturedVertex::new(
                Vec3::new(origin.x, origin.y - extent.y, 0.0),
                Vec2::new(self.uv_origin.x, uv_end.y),
            ),
        ]
    }
}

/// A glyph table for character codes 0-255 sharing one atlas texture
#[derive(Debug, Clone)]
pub struct Font {
    glyphs: Vec<Option<Glyph>>,
    texture: TextureHandle,
}

impl Font {
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            glyphs: vec![None; GLYPH_COUNT],
            texture,
        }
    }

    /// Set the glyph for `c`; characters past code 255 are ignored
    pub fn with_glyph(mut self, c: char, glyph: Glyph) -> Self {
        if let Some(slot) = self.glyphs.get_mut(c as usize) {
            *slot = Some(glyph);
        } else {
            log::warn!("Character {c:?} is outside the glyph table");
        }
        self
    }

    /// Glyphs for an atlas of equally sized cells, filled row by row from `first`
    pub fn monospace_grid(
        texture: TextureHandle,
        columns: u32,
        rows: u32,
        first: u8,
        glyph_size: Vec2,
    ) -> Self {
        let mut font = Self::new(texture);
        if columns == 0 || rows == 0 {
            return font;
        }
        let uv_size = Vec2::new(1.0 / columns as f32, 1.0 / rows as f32);

        for cell in 0..columns * rows {
            let code = first as usize + cell as usize;
            let Some(slot) = font.glyphs.get_mut(code) else {
                break;
            };
            let uv_origin = Vec2::new((cell % columns) as f32, (cell / columns) as f32) * uv_size;
            *slot = Some(Glyph::new(uv_origin, uv_size, glyph_size, Vec2::ZERO));
        }

        font
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(c as usize)?.as_ref()
    }

    pub(crate) fn require_glyph(&self, c: char) -> RenderResult<&Glyph> {
        self.glyph(c).ok_or(RendererError::MissingGlyph(c))
    }
}

/// Reusable position and texture coordinate buffers for a laid out string
#[derive(Debug, Clone)]
pub struct TextBuffers {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    max_chars: usize,
}

impl TextBuffers {
    pub fn new(max_chars: usize) -> Self {
        Self {
            positions: Vec::new(),
            uvs: Vec::new(),
            max_chars,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Lay out `text` on one line starting at `(pos.x, -pos.y)`.
    ///
    /// Each glyph is drawn at the cursor plus its offset (y subtracted), and
    /// the cursor moves to the right edge of the glyph just drawn. Returns the
    /// number of vertices written. The buffers are left empty on error.
    pub fn layout(&mut self, text: &str, font: &Font, pos: Vec2, scale: f32) -> RenderResult<usize> {
        self.positions.clear();
        self.uvs.clear();

        let len = text.chars().count();
        if len > self.max_chars {
            return Err(RendererError::TextTooLong {
                len,
                max: self.max_chars,
            });
        }

        self.positions.reserve(len * 4);
        self.uvs.reserve(len * 4);

        let mut cursor = Vec2::new(pos.x, -pos.y);
        for c in text.chars() {
            let glyph = match font.require_glyph(c) {
                Ok(glyph) => glyph,
                Err(e) => {
                    self.positions.clear();
                    self.uvs.clear();
                    return Err(e);
                }
            };

            let origin = Vec2::new(cursor.x + glyph.offset.x, cursor.y - glyph.offset.y);
            for vertex in glyph.quad(origin, scale) {
                self.positions.push(vertex.position);
                self.uvs.push(vertex.uv);
            }
            cursor.x = origin.x + glyph.size.x * scale;
        }

        Ok(self.positions.len())
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }
}
