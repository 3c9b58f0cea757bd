//! Shared document resources
//!
//! Resources are registered once per document and shared by every component
//! that uses them: fonts (through [`fonts::FontResourceSet`]), images and
//! embedded files. Loaded bytes go through a TTL cache provider.

pub mod attachment;
pub mod cache;
pub mod error;
pub mod image;
pub mod shared;

pub use attachment::AttachmentData;
pub use cache::{CacheProvider, CacheStats, CachedBytes, Clock, InMemoryCache, ManualClock, SystemClock};
pub use error::{ResourceError, Result};
pub use image::{ImageData, ImageFormat};
pub use shared::{AttachmentResource, ImageResource, ResourceType, SharedResource, SharedResources};
