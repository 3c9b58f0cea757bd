//! Mapping of template and resource paths to files or remote locations

use crate::component::LoadType;
use crate::{GenerationError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a referenced path resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedPath {
    File(PathBuf),
    /// An http(s) address the host has to fetch
    Remote(String),
}

impl fmt::Display for MappedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappedPath::File(path) => write!(f, "{}", path.display()),
            MappedPath::Remote(url) => f.write_str(url),
        }
    }
}

pub trait PathMapper: fmt::Debug {
    /// Resolve `path` as referenced by a component with the given load type.
    /// `base` is the file the component was read from, if any.
    fn map_path(&self, path: &str, load_type: LoadType, base: Option<&Path>) -> Result<MappedPath>;
}

/// Resolves relative paths against the file a component came from, when it
/// was read from a file or instantiated from a template read from one, and
/// against a fixed root otherwise
#[derive(Debug, Clone)]
pub struct RootedPathMapper {
    root: PathBuf,
}

impl RootedPathMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted at the process working directory
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for RootedPathMapper {
    fn default() -> Self {
        Self::current_dir()
    }
}

impl PathMapper for RootedPathMapper {
    fn map_path(&self, path: &str, load_type: LoadType, base: Option<&Path>) -> Result<MappedPath> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::Reference("empty path".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(MappedPath::Remote(trimmed.to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix("file://") {
            let decoded = urlencoding::decode(rest)
                .map_err(|e| GenerationError::Reference(format!("{}: {}", trimmed, e)))?;
            return Ok(MappedPath::File(PathBuf::from(decoded.into_owned())));
        }

        let candidate = Path::new(trimmed);
        if candidate.is_absolute() {
            return Ok(MappedPath::File(candidate.to_path_buf()));
        }

        let dir = match (load_type, base.and_then(Path::parent)) {
            (LoadType::File | LoadType::Template, Some(dir)) => dir.to_path_buf(),
            _ => self.root.clone(),
        };
        Ok(MappedPath::File(dir.join(candidate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_by_load_type() {
        let mapper = RootedPathMapper::new("/srv/templates");
        let base = Path::new("/data/reports/main.json");

        assert_eq!(
            mapper.map_path("logo.jpg", LoadType::File, Some(base)).unwrap(),
            MappedPath::File(PathBuf::from("/data/reports/logo.jpg"))
        );
        assert_eq!(
            mapper.map_path("logo.jpg", LoadType::Code, Some(base)).unwrap(),
            MappedPath::File(PathBuf::from("/srv/templates/logo.jpg"))
        );
        assert_eq!(
            mapper.map_path("logo.jpg", LoadType::Template, None).unwrap(),
            MappedPath::File(PathBuf::from("/srv/templates/logo.jpg"))
        );
    }

    #[test]
    fn test_remote_and_file_urls() {
        let mapper = RootedPathMapper::new("/srv");
        assert_eq!(
            mapper.map_path("https://example.com/a.png", LoadType::Code, None).unwrap(),
            MappedPath::Remote("https://example.com/a.png".into())
        );
        assert_eq!(
            mapper.map_path("file:///tmp/my%20file.txt", LoadType::Code, None).unwrap(),
            MappedPath::File(PathBuf::from("/tmp/my file.txt"))
        );
        assert!(matches!(
            mapper.map_path("  ", LoadType::Code, None),
            Err(GenerationError::Reference(_))
        ));
    }
}
