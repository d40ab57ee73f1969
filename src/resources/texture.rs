//! Texture loading and upload

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderResult, RendererError};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Decoded RGBA8 texture data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file; the format follows the extension (DDS, PNG, ...)
    pub fn from_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let bytes = std::fs::read(path).map_err(|source| RendererError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let img = match image::ImageFormat::from_path(path) {
            Ok(format) => image::load_from_memory_with_format(&bytes, format),
            Err(_) => image::load_from_memory(&bytes),
        }
        .map_err(|source| RendererError::TextureDecode {
            name: name.clone(),
            source,
        })?;

        log::debug!("Loaded texture {} ({}x{})", path.display(), img.width(), img.height());
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> RenderResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|source| RendererError::TextureDecode {
            name: name.to_string(),
            source,
        })?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Flat tangent-space normal map
    pub fn default_normal() -> Self {
        Self::solid_color([128, 128, 255, 255], "default_normal")
    }

    /// Create a checkerboard texture with 8 pixel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                data.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }

        Self {
            width: size,
            height: size,
            data,
            name: "checkerboard".to_string(),
        }
    }

    pub fn image_data(&self) -> ImageData<'_> {
        ImageData {
            label: Some(&self.name),
            width: self.width,
            height: self.height,
            rgba: &self.data,
        }
    }

    /// Upload to the backend
    pub fn upload<B: GraphicsBackend>(&self, backend: &mut B) -> BackendResult<TextureHandle> {
        backend.create_texture(&self.image_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_every_eight_pixels() {
        let tex = TextureData::checkerboard(16, [255; 4], [0, 0, 0, 255]);
        assert_eq!(tex.data.len(), 16 * 16 * 4);
        assert_eq!(&tex.data[0..4], &[255; 4]);
        assert_eq!(&tex.data[8 * 4..8 * 4 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut bytes = Vec::new();
        image::RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 4]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let tex = TextureData::from_bytes(&bytes, "tiny").unwrap();
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(&tex.data[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = TextureData::from_bytes(b"not an image", "junk").unwrap_err();
        assert!(matches!(err, RendererError::TextureDecode { ref name, .. } if name == "junk"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TextureData::from_file("does/not/exist.dds").unwrap_err();
        match err {
            RendererError::Io { path, .. } => assert!(path.ends_with("exist.dds")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
