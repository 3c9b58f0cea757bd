//! PDF output primitives
//!
//! An object model with a serializer, stream filters, page content streams
//! and an object writer that tracks cross-reference offsets.

pub mod content;
pub mod error;
pub mod filter;
pub mod objects;
pub mod writer;

pub use content::ContentStream;
pub use error::{PdfError, Result};
pub use filter::{FilterPipeline, FlateFilter, StreamFilter};
pub use objects::{to_bytes, ObjectRef, PdfDictionary, PdfObject, PdfSerializer, PdfString, StringMode};
pub use writer::{PdfObjectWriter, Trailer};
