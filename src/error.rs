//! Renderer error types

use crate::backend::traits::BackendError;
use crate::resources::MeshError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the renderer API
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode texture {name}: {source}")]
    TextureDecode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Mesh {index} is invalid: {source}")]
    InvalidMesh {
        index: usize,
        #[source]
        source: MeshError,
    },
    #[error("Font has no glyph for character {0:?}")]
    MissingGlyph(char),
    #[error("Text of {len} characters exceeds the limit of {max}")]
    TextTooLong { len: usize, max: usize },
    #[error("Viewport width is zero")]
    DegenerateViewport,
    #[error("Renderer is not set up")]
    NotSetUp,
}

pub type RenderResult<T> = Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_include_context() {
        let err = RendererError::TextTooLong { len: 3000, max: 2048 };
        assert_eq!(err.to_string(), "Text of 3000 characters exceeds the limit of 2048");

        let err = RendererError::InvalidMesh {
            index: 2,
            source: MeshError::NotTriangles(4),
        };
        assert_eq!(err.to_string(), "Mesh 2 is invalid: index count 4 is not a multiple of 3");
    }

    #[test]
    fn backend_errors_convert() {
        let err: RendererError = BackendError::ShaderCreationFailed("bad".into()).into();
        assert!(matches!(err, RendererError::Backend(_)));
        assert_eq!(err.to_string(), "Failed to create shader: bad");
    }
}
