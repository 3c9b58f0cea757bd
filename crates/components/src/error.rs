//! Error types for document generation

use data_binding::BindingError;
use fonts::FontError;
use pdf_writer::PdfError;
use resources::ResourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The component tree is malformed: a template outside a container,
    /// a duplicate name, an unbalanced reference stack
    #[error("Structural error: {0}")]
    Structural(String),

    /// A generation stage was entered out of order
    #[error("The document {0}")]
    Stage(String),

    /// A component failed while binding in strict conformance
    #[error("Data binding failed for '{component}': {message}")]
    Data {
        component: String,
        message: String,
        #[source]
        source: Option<Box<GenerationError>>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    /// A referenced file or remote resource could not be resolved
    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Binding(BindingError),

    #[error(transparent)]
    Font(#[from] FontError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        GenerationError::Structural(message.into())
    }

    /// Errors that pass through the conformance boundary whatever the mode
    pub fn always_propagates(&self) -> bool {
        matches!(
            self,
            GenerationError::Structural(_)
                | GenerationError::Stage(_)
                | GenerationError::Data { .. }
                | GenerationError::NotImplemented(_)
        )
    }
}

impl From<BindingError> for GenerationError {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::NotImplemented(what) => GenerationError::NotImplemented(what),
            other => GenerationError::Binding(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_binding_error_is_lifted() {
        let err: GenerationError = BindingError::NotImplemented("expanding text".into()).into();
        assert!(matches!(err, GenerationError::NotImplemented(_)));
        assert!(err.always_propagates());

        let err: GenerationError = BindingError::DataSourceNotFound("orders".into()).into();
        assert!(matches!(err, GenerationError::Binding(_)));
        assert!(!err.always_propagates());
    }

    #[test]
    fn test_stage_message() {
        let err = GenerationError::Stage("has not been initialized".into());
        assert_eq!(err.to_string(), "The document has not been initialized");
    }
}
