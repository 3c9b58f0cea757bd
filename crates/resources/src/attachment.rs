//! Embedded file data

use std::path::Path;
use std::rc::Rc;

/// A file embedded in the output
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentData {
    file_name: String,
    mime_type: String,
    description: Option<String>,
    bytes: Rc<Vec<u8>>,
}

impl AttachmentData {
    pub fn new(file_name: impl Into<String>, bytes: Rc<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            description: None,
            bytes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn bytes(&self) -> &Rc<Vec<u8>> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_name() {
        assert_eq!(AttachmentData::new("data.CSV", Rc::new(vec![])).mime_type(), "text/csv");
        assert_eq!(AttachmentData::new("blob", Rc::new(vec![1])).mime_type(), "application/octet-stream");
        let custom = AttachmentData::new("x.bin", Rc::new(vec![1, 2])).with_mime_type("application/x-custom");
        assert_eq!(custom.mime_type(), "application/x-custom");
        assert_eq!(custom.len(), 2);
    }
}
