//! Error types for resource loading

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Unsupported image format '{format}' for {source_path}")]
    UnsupportedImage { format: String, source_path: String },
}

pub type Result<T> = std::result::Result<T, ResourceError>;
