//! Error types for data binding operations

use thiserror::Error;

/// Errors that can occur while resolving or enumerating bound data
#[derive(Debug, Error)]
pub enum BindingError {
    /// IO error reading a data source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing CSV data
    #[error("CSV parse error: {0}")]
    CsvParse(#[from] csv::Error),

    /// Error parsing JSON data
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A binding path could not be parsed
    #[error("Invalid binding path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The requested enumeration mode has no implementation for this value
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// No data source was registered with the id
    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    /// The data source exists but its data has not been loaded yet
    #[error("Data source '{0}' has not been loaded")]
    DataSourceNotLoaded(String),
}

/// Result type for data binding operations
pub type Result<T> = std::result::Result<T, BindingError>;
