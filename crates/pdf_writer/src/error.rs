//! Error types for PDF writing

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A begin/end call did not match the innermost open construct
    #[error("Unbalanced writer call: expected to close {expected}, found {found}")]
    Unbalanced { expected: String, found: String },

    #[error("Object {0} was already written")]
    DuplicateObject(u32),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;
