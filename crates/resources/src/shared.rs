//! Document-wide resource collection, one entry per (type, key)

use crate::{AttachmentData, ImageData};
use fonts::FontResourceSet;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The kinds of shared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Font,
    Image,
    Attachment,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Font => write!(f, "Font"),
            ResourceType::Image => write!(f, "XObject"),
            ResourceType::Attachment => write!(f, "EmbeddedFile"),
        }
    }
}

/// An image written once as an XObject and drawn wherever it is used
#[derive(Debug)]
pub struct ImageResource {
    resource_name: String,
    key: String,
    data: ImageData,
}

impl ImageResource {
    /// Name used in content streams (`Img1`, `Img2`, ...)
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn data(&self) -> &ImageData {
        &self.data
    }
}

/// A file embedded once and referenced by every annotation or link using it
#[derive(Debug)]
pub struct AttachmentResource {
    resource_name: String,
    key: String,
    data: AttachmentData,
}

impl AttachmentResource {
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn data(&self) -> &AttachmentData {
        &self.data
    }
}

/// A registered image or attachment
#[derive(Debug, Clone)]
pub enum SharedResource {
    Image(Rc<ImageResource>),
    Attachment(Rc<AttachmentResource>),
}

/// Every resource a document shares between its components
#[derive(Debug, Default)]
pub struct SharedResources {
    fonts: FontResourceSet,
    entries: HashMap<(ResourceType, String), SharedResource>,
    images: Vec<Rc<ImageResource>>,
    attachments: Vec<Rc<AttachmentResource>>,
}

impl SharedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fonts(&self) -> &FontResourceSet {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontResourceSet {
        &mut self.fonts
    }

    pub fn get(&self, resource_type: ResourceType, key: &str) -> Option<&SharedResource> {
        self.entries.get(&(resource_type, key.to_string()))
    }

    /// Whether a resource is registered; fonts are keyed by `Family,Weight,Style`
    pub fn contains(&self, resource_type: ResourceType, key: &str) -> bool {
        match resource_type {
            ResourceType::Font => self.fonts.iter().any(|f| f.full_name() == key),
            _ => self.get(resource_type, key).is_some(),
        }
    }

    pub fn image(&self, key: &str) -> Option<Rc<ImageResource>> {
        match self.get(ResourceType::Image, key) {
            Some(SharedResource::Image(image)) => Some(Rc::clone(image)),
            _ => None,
        }
    }

    /// Register an image under `key`, or return the one already registered
    pub fn add_image(&mut self, key: impl Into<String>, data: ImageData) -> Rc<ImageResource> {
        let key = key.into();
        if let Some(existing) = self.image(&key) {
            return existing;
        }
        let resource = Rc::new(ImageResource {
            resource_name: format!("Img{}", self.images.len() + 1),
            key: key.clone(),
            data,
        });
        self.images.push(Rc::clone(&resource));
        self.entries
            .insert((ResourceType::Image, key), SharedResource::Image(Rc::clone(&resource)));
        resource
    }

    pub fn attachment(&self, key: &str) -> Option<Rc<AttachmentResource>> {
        match self.get(ResourceType::Attachment, key) {
            Some(SharedResource::Attachment(file)) => Some(Rc::clone(file)),
            _ => None,
        }
    }

    /// Register an attachment under `key`, or return the one already registered
    pub fn add_attachment(&mut self, key: impl Into<String>, data: AttachmentData) -> Rc<AttachmentResource> {
        let key = key.into();
        if let Some(existing) = self.attachment(&key) {
            return existing;
        }
        let resource = Rc::new(AttachmentResource {
            resource_name: format!("Att{}", self.attachments.len() + 1),
            key: key.clone(),
            data,
        });
        self.attachments.push(Rc::clone(&resource));
        self.entries.insert(
            (ResourceType::Attachment, key),
            SharedResource::Attachment(Rc::clone(&resource)),
        );
        resource
    }

    /// Images in registration order
    pub fn images(&self) -> &[Rc<ImageResource>] {
        &self.images
    }

    /// Attachments in registration order
    pub fn attachments(&self) -> &[Rc<AttachmentResource>] {
        &self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::tests::tiny_jpeg;

    #[test]
    fn test_images_dedup_by_key() {
        let mut shared = SharedResources::new();
        let data = ImageData::from_bytes("logo.jpg", Rc::new(tiny_jpeg(10, 10))).unwrap();

        let a = shared.add_image("logo.jpg", data.clone());
        let b = shared.add_image("logo.jpg", data);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.resource_name(), "Img1");
        assert_eq!(shared.images().len(), 1);
        assert!(shared.contains(ResourceType::Image, "logo.jpg"));
        assert!(!shared.contains(ResourceType::Attachment, "logo.jpg"));
    }

    #[test]
    fn test_attachments() {
        let mut shared = SharedResources::new();
        let file = AttachmentData::new("notes.txt", Rc::new(b"hello".to_vec()));
        let resource = shared.add_attachment("notes", file);
        assert_eq!(resource.resource_name(), "Att1");
        assert!(shared.attachment("notes").is_some());
        assert!(shared.image("notes").is_none());
    }

    #[test]
    fn test_font_lookup_by_full_name() {
        let mut shared = SharedResources::new();
        shared
            .fonts_mut()
            .register(fonts::FontDefinition::standard(fonts::StandardFont::Helvetica));
        assert!(shared.contains(ResourceType::Font, "Helvetica,Regular,Regular"));
    }
}
