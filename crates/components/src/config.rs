//! Generation options
//!
//! Options are read from JSON with every field optional; missing fields take
//! their defaults.

use crate::trace::TraceLevel;
use crate::Result;
use data_binding::ConformanceMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Options for one document generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Lax logs binding failures and continues; Strict aborts
    #[serde(default)]
    pub conformance: ConformanceMode,
    /// Lowest level kept in the collected trace log
    #[serde(default)]
    pub trace_level: TraceLevel,
    /// Whether a missing font may be substituted by a face of the same family
    #[serde(default = "default_true")]
    pub font_substitution: bool,
    /// Draw a placeholder instead of failing when an image cannot be loaded
    #[serde(default)]
    pub allow_missing_images: bool,
    /// Register a named destination for every component, named or not
    #[serde(default)]
    pub name_all_components: bool,
    /// Flate-compress content streams
    #[serde(default = "default_true")]
    pub compress_streams: bool,
    /// How long loaded image and attachment bytes stay cached
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Append the collected trace log to the output as extra pages
    #[serde(default)]
    pub append_trace_log: bool,
    /// Run the data binding stage automatically before layout
    #[serde(default = "default_true")]
    pub auto_bind: bool,
    #[serde(default)]
    pub page_size: PageSize,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    600
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            conformance: ConformanceMode::default(),
            trace_level: TraceLevel::default(),
            font_substitution: true,
            allow_missing_images: false,
            name_all_components: false,
            compress_streams: true,
            cache_ttl_seconds: default_cache_ttl(),
            append_trace_log: false,
            auto_bind: true,
            page_size: PageSize::default(),
        }
    }
}

impl GenerationOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read options from a file, falling back to the defaults (with a warning)
    /// when the file is missing or malformed
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "options file not readable, using defaults");
                return Self::default();
            }
        };
        match Self::from_json_str(&text) {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "options file malformed, using defaults");
                Self::default()
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Custom { width: f64, height: f64 },
}

impl PageSize {
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Custom { width, height } => (width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_object() {
        let options = GenerationOptions::from_json_str("{}").unwrap();
        assert_eq!(options, GenerationOptions::default());
        assert!(options.auto_bind);
        assert_eq!(options.conformance, ConformanceMode::Lax);
    }

    #[test]
    fn test_camel_case_fields() {
        let options = GenerationOptions::from_json_str(
            r#"{ "conformance": "strict", "traceLevel": "warning", "fontSubstitution": false,
                 "autoBind": false, "pageSize": { "custom": { "width": 300, "height": 400 } } }"#,
        )
        .unwrap();
        assert_eq!(options.conformance, ConformanceMode::Strict);
        assert_eq!(options.trace_level, TraceLevel::Warning);
        assert!(!options.font_substitution);
        assert!(!options.auto_bind);
        assert_eq!(options.page_size.dimensions(), (300.0, 400.0));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(GenerationOptions::load_or_default(file.path()), GenerationOptions::default());

        let missing = GenerationOptions::load_or_default("/definitely/not/here.json");
        assert_eq!(missing, GenerationOptions::default());
    }
}
