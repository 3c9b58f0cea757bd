//! Fonts for document generation
//!
//! Font requests (family chain, weight, style), loadable definitions, the
//! per-document set of shared font resources, and the matcher that resolves
//! a request to a resource by exact match, substitution or Courier fallback.

pub mod definition;
pub mod error;
pub mod font;
pub mod matcher;
pub mod resource;
pub mod standard;

pub use definition::{FontDefinition, FontFactory, FontRegistry};
pub use error::{FontError, Result};
pub use font::{font_key, Font, FontSelector, FontStyle, FontWeight};
pub use matcher::{proximity, FontMatch, FontMatcher, MatchOutcome};
pub use resource::{FontResource, FontResourceSet};
pub use standard::StandardFont;
