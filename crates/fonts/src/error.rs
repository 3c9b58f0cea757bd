//! Error types for font handling

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("Invalid font name '{0}': expected 'family[,weight[,style]]'")]
    InvalidFontName(String),

    #[error("Unknown font weight: {0}")]
    UnknownWeight(String),

    #[error("Unknown font style: {0}")]
    UnknownStyle(String),

    #[error("Empty font selector")]
    EmptySelector,

    #[error("No font matched '{0}'")]
    FontNotFound(String),
}

pub type Result<T> = std::result::Result<T, FontError>;
