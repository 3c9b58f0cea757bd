//! PDF output of a laid out document
//!
//! Objects are allocated up front so that pages, outlines and annotations
//! can reference each other, then written in one pass. Fonts, images and
//! embedded files are shared: each distinct resource is written once and
//! named on the pages that use it.

use crate::artefacts::{AnnotationAction, ArtefactCatalog, PagePosition};
use crate::layout::{LayoutDocument, LayoutPage, PageItem};
use crate::Result;
use fonts::FontResource;
use pdf_writer::{
    ContentStream, FilterPipeline, ObjectRef, PdfDictionary, PdfObject, PdfObjectWriter, PdfString, Trailer,
};
use resources::{AttachmentResource, ImageResource};
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

const PDF_VERSION: &str = "1.7";
const PRODUCER: &str = concat!("components ", env!("CARGO_PKG_VERSION"));

/// Resources shared across pages, keyed by identity
#[derive(Default)]
struct SharedObjects {
    fonts: Vec<(Rc<FontResource>, ObjectRef)>,
    images: Vec<(Rc<ImageResource>, ObjectRef)>,
    files: Vec<(Rc<AttachmentResource>, ObjectRef)>,
}

impl SharedObjects {
    fn font_name(&self, font: &Rc<FontResource>) -> Option<String> {
        self.fonts
            .iter()
            .position(|(f, _)| f.full_name() == font.full_name())
            .map(|i| format!("F{}", i + 1))
    }

    fn image_name(&self, image: &Rc<ImageResource>) -> Option<String> {
        self.images
            .iter()
            .position(|(i, _)| i.key() == image.key())
            .map(|i| format!("Im{}", i + 1))
    }

    fn file_ref(&self, file: &Rc<AttachmentResource>) -> Option<ObjectRef> {
        self.files
            .iter()
            .find(|(f, _)| f.resource_name() == file.resource_name())
            .map(|(_, r)| *r)
    }
}

impl LayoutDocument {
    /// Write the document as PDF and hand back the writer
    pub fn output_to_pdf<W: Write>(&self, writer: W) -> Result<W> {
        let mut pdf = PdfObjectWriter::new(writer);
        pdf.write_header(PDF_VERSION)?;

        let catalog = pdf.allocate();
        let pages_root = pdf.allocate();
        let info = pdf.allocate();
        let shared = self.allocate_shared(&mut pdf);
        let page_refs: Vec<ObjectRef> = self.pages.iter().map(|_| pdf.allocate()).collect();
        let outline_refs: Vec<ObjectRef> = self.artefacts.outlines().iter().map(|_| pdf.allocate()).collect();
        let outlines_root = (!outline_refs.is_empty()).then(|| pdf.allocate());

        let filters = if self.compress {
            FilterPipeline::flate()
        } else {
            FilterPipeline::new()
        };

        self.write_shared(&mut pdf, &shared, &filters)?;
        for (index, page) in self.pages.iter().enumerate() {
            self.write_page(&mut pdf, index, page, &page_refs, pages_root, &shared, &filters)?;
        }

        pdf.write_object(
            pages_root,
            &PdfDictionary::typed("Pages")
                .with("Kids", PdfObject::refs(page_refs.iter().copied()))
                .with("Count", page_refs.len())
                .into(),
        )?;

        if let Some(root) = outlines_root {
            write_outlines(&mut pdf, &self.artefacts, root, &outline_refs, &page_refs)?;
        }

        let names = self.names_dictionary(&page_refs, &shared);

        // The catalog is small enough to stream entry by entry
        pdf.begin_object(catalog)?;
        pdf.begin_dictionary()?;
        pdf.write_entry("Type", PdfObject::name("Catalog"))?;
        pdf.write_entry("Pages", pages_root)?;
        if let Some(root) = outlines_root {
            pdf.write_entry("Outlines", root)?;
            pdf.write_entry("PageMode", PdfObject::name("UseOutlines"))?;
        }
        if !names.is_empty() {
            pdf.write_entry("Names", names)?;
        }
        pdf.end_dictionary()?;
        pdf.end_object()?;

        pdf.write_object(info, &self.info_dictionary().into())?;
        pdf.write_xref_and_trailer(&Trailer {
            root: catalog,
            info: Some(info),
            id: Some(self.file_id),
        })?;

        tracing::debug!(pages = self.pages.len(), objects = pdf.object_count(), "wrote PDF");
        Ok(pdf.finish()?)
    }

    fn allocate_shared<W: Write>(&self, pdf: &mut PdfObjectWriter<W>) -> SharedObjects {
        let mut shared = SharedObjects::default();
        for item in self.pages.iter().flat_map(|p| &p.items) {
            match item {
                PageItem::Text { font, .. } => {
                    if shared.font_name(font).is_none() {
                        shared.fonts.push((Rc::clone(font), pdf.allocate()));
                    }
                }
                PageItem::Image { image, .. } => {
                    if shared.image_name(image).is_none() {
                        shared.images.push((Rc::clone(image), pdf.allocate()));
                    }
                }
                PageItem::Placeholder { .. } => {}
            }
        }

        let annotated = self.artefacts.annotations().iter().filter_map(|a| match &a.action {
            AnnotationAction::Launch(file) | AnnotationAction::Attachment(file) => Some(file),
            _ => None,
        });
        let embedded = self.artefacts.embedded().iter().map(|e| &e.file);
        for file in embedded.chain(annotated) {
            if shared.file_ref(file).is_none() {
                shared.files.push((Rc::clone(file), pdf.allocate()));
            }
        }
        shared
    }

    fn write_shared<W: Write>(
        &self,
        pdf: &mut PdfObjectWriter<W>,
        shared: &SharedObjects,
        filters: &FilterPipeline,
    ) -> Result<()> {
        for (font, r) in &shared.fonts {
            let definition = font.definition();
            let mut dict = PdfDictionary::typed("Font")
                .with("Subtype", PdfObject::name("Type1"))
                .with("BaseFont", PdfObject::name(definition.base_font()));
            let encoding = definition
                .standard_font()
                .map_or(Some("WinAnsiEncoding"), |s| s.encoding());
            if let Some(encoding) = encoding {
                dict.insert("Encoding", PdfObject::name(encoding));
            }
            pdf.write_object(*r, &dict.into())?;
        }

        // JPEG bytes pass through with their own filter
        for (image, r) in &shared.images {
            let data = image.data();
            let color_space = match data.components() {
                1 => "DeviceGray",
                4 => "DeviceCMYK",
                _ => "DeviceRGB",
            };
            let dict = PdfDictionary::typed("XObject")
                .with("Subtype", PdfObject::name("Image"))
                .with("Width", data.width())
                .with("Height", data.height())
                .with("ColorSpace", PdfObject::name(color_space))
                .with("BitsPerComponent", 8)
                .with("Filter", PdfObject::name("DCTDecode"));
            pdf.write_stream(*r, dict, data.bytes(), &FilterPipeline::new())?;
        }

        for (file, spec) in &shared.files {
            let stream = pdf.allocate();
            let data = file.data();
            let params = PdfDictionary::new().with("Size", data.len());
            pdf.write_stream(
                stream,
                PdfDictionary::typed("EmbeddedFile").with("Params", params),
                data.bytes(),
                filters,
            )?;

            let mut dict = PdfDictionary::typed("Filespec")
                .with("F", PdfObject::text(data.file_name()))
                .with("UF", PdfObject::text(data.file_name()))
                .with("EF", PdfDictionary::new().with("F", stream));
            if let Some(description) = data.description() {
                dict.insert("Desc", PdfObject::text(description));
            }
            pdf.write_object(*spec, &dict.into())?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_page<W: Write>(
        &self,
        pdf: &mut PdfObjectWriter<W>,
        index: usize,
        page: &LayoutPage,
        page_refs: &[ObjectRef],
        pages_root: ObjectRef,
        shared: &SharedObjects,
        filters: &FilterPipeline,
    ) -> Result<()> {
        let mut content = ContentStream::new();
        let mut fonts = PdfDictionary::new();
        let mut images = PdfDictionary::new();

        for item in &page.items {
            match item {
                PageItem::Text { x, y, font, size, text } => {
                    if let Some((name, (_, r))) = shared
                        .font_name(font)
                        .zip(shared.fonts.iter().find(|(f, _)| f.full_name() == font.full_name()))
                    {
                        content
                            .begin_text()
                            .set_font(&name, f64::from(*size))
                            .move_text(*x, *y)
                            .show_text(text)
                            .end_text();
                        fonts.insert(name, *r);
                    }
                }
                PageItem::Image {
                    x,
                    y,
                    width,
                    height,
                    image,
                } => {
                    if let Some((name, (_, r))) = shared
                        .image_name(image)
                        .zip(shared.images.iter().find(|(i, _)| i.key() == image.key()))
                    {
                        content.draw_image(&name, *x, *y, *width, *height);
                        images.insert(name, *r);
                    }
                }
                PageItem::Placeholder { x, y, width, height } => {
                    content
                        .save_state()
                        .set_fill_gray(0.85)
                        .rect(*x, *y, *width, *height)
                        .fill()
                        .restore_state();
                }
            }
        }

        let content_ref = pdf.allocate();
        pdf.write_stream(content_ref, PdfDictionary::new(), content.as_bytes(), filters)?;

        let mut annotation_refs = Vec::new();
        for annotation in self.artefacts.annotations_on(index) {
            let [x1, y1, x2, y2] = annotation.region.rect;
            let mut dict = PdfDictionary::typed("Annot").with("Rect", PdfObject::rect(x1, y1, x2, y2));
            match &annotation.action {
                AnnotationAction::Uri(uri) => {
                    dict.insert("Subtype", PdfObject::name("Link"));
                    dict.insert("Border", no_border());
                    dict.insert(
                        "A",
                        PdfDictionary::new()
                            .with("S", PdfObject::name("URI"))
                            .with("URI", PdfString::literal(uri.as_bytes())),
                    );
                }
                AnnotationAction::Destination(name) => {
                    dict.insert("Subtype", PdfObject::name("Link"));
                    dict.insert("Border", no_border());
                    dict.insert("Dest", PdfObject::text(name));
                }
                AnnotationAction::Launch(file) => {
                    let Some(spec) = shared.file_ref(file) else { continue };
                    dict.insert("Subtype", PdfObject::name("Link"));
                    dict.insert("Border", no_border());
                    dict.insert("A", PdfDictionary::new().with("S", PdfObject::name("Launch")).with("F", spec));
                }
                AnnotationAction::Attachment(file) => {
                    let Some(spec) = shared.file_ref(file) else { continue };
                    dict.insert("Subtype", PdfObject::name("FileAttachment"));
                    dict.insert("FS", spec);
                    dict.insert("Name", PdfObject::name("PushPin"));
                    let contents = file.data().description().unwrap_or(file.data().file_name());
                    dict.insert("Contents", PdfObject::text(contents));
                }
            }
            let r = pdf.allocate();
            pdf.write_object(r, &dict.into())?;
            annotation_refs.push(r);
        }

        let mut resources = PdfDictionary::new();
        if !fonts.is_empty() {
            resources.insert("Font", fonts);
        }
        if !images.is_empty() {
            resources.insert("XObject", images);
        }

        let mut dict = PdfDictionary::typed("Page")
            .with("Parent", pages_root)
            .with("MediaBox", PdfObject::rect(0.0, 0.0, page.width, page.height))
            .with("Resources", resources)
            .with("Contents", content_ref);
        if !annotation_refs.is_empty() {
            dict.insert("Annots", PdfObject::refs(annotation_refs));
        }
        pdf.write_object(page_refs[index], &dict.into())?;
        Ok(())
    }

    /// The catalog's `/Names`: destinations and embedded files, each a flat
    /// name tree sorted by key
    fn names_dictionary(&self, page_refs: &[ObjectRef], shared: &SharedObjects) -> PdfDictionary {
        let mut names = PdfDictionary::new();

        let dests: BTreeMap<&str, PdfObject> = self
            .artefacts
            .destinations()
            .iter()
            .filter_map(|d| destination(d.target, page_refs).map(|dest| (d.name.as_str(), dest)))
            .collect();
        if !dests.is_empty() {
            names.insert("Dests", name_tree(dests));
        }

        let files: BTreeMap<&str, PdfObject> = self
            .artefacts
            .embedded()
            .iter()
            .filter_map(|e| shared.file_ref(&e.file).map(|r| (e.name.as_str(), r.into())))
            .collect();
        if !files.is_empty() {
            names.insert("EmbeddedFiles", name_tree(files));
        }
        names
    }

    fn info_dictionary(&self) -> PdfDictionary {
        let mut dict = PdfDictionary::new()
            .with("Producer", PdfObject::text(PRODUCER))
            .with(
                "CreationDate",
                PdfString::literal(chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()),
            );
        let fields = [
            ("Title", &self.info.title),
            ("Author", &self.info.author),
            ("Subject", &self.info.subject),
            ("Keywords", &self.info.keywords),
        ];
        for (key, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                dict.insert(key, PdfObject::text(value));
            }
        }
        dict
    }
}

fn no_border() -> PdfObject {
    PdfObject::Array(vec![PdfObject::Integer(0), PdfObject::Integer(0), PdfObject::Integer(0)])
}

/// `[page /XYZ null y null]`
fn destination(target: PagePosition, page_refs: &[ObjectRef]) -> Option<PdfObject> {
    let page = page_refs.get(target.page)?;
    Some(PdfObject::Array(vec![
        (*page).into(),
        PdfObject::name("XYZ"),
        PdfObject::Null,
        target.y.into(),
        PdfObject::Null,
    ]))
}

fn name_tree(entries: BTreeMap<&str, PdfObject>) -> PdfDictionary {
    let mut flat = Vec::with_capacity(entries.len() * 2);
    for (name, value) in entries {
        flat.push(PdfObject::text(name));
        flat.push(value);
    }
    PdfDictionary::new().with("Names", flat)
}

fn write_outlines<W: Write>(
    pdf: &mut PdfObjectWriter<W>,
    catalog: &ArtefactCatalog,
    root: ObjectRef,
    refs: &[ObjectRef],
    page_refs: &[ObjectRef],
) -> Result<()> {
    let outlines = catalog.outlines();
    let top: Vec<usize> = catalog.root_outlines().collect();

    for (index, entry) in outlines.iter().enumerate() {
        let siblings: &[usize] = match entry.parent {
            Some(parent) => &outlines[parent].children,
            None => &top,
        };
        let at = siblings.iter().position(|s| *s == index).unwrap_or(0);

        let mut dict = PdfDictionary::new()
            .with("Title", PdfObject::text(&entry.title))
            .with("Parent", entry.parent.map_or(root, |p| refs[p]));
        if let Some(dest) = destination(entry.target, page_refs) {
            dict.insert("Dest", dest);
        }
        if at > 0 {
            dict.insert("Prev", refs[siblings[at - 1]]);
        }
        if let Some(next) = siblings.get(at + 1) {
            dict.insert("Next", refs[*next]);
        }
        if let (Some(first), Some(last)) = (entry.children.first(), entry.children.last()) {
            dict.insert("First", refs[*first]);
            dict.insert("Last", refs[*last]);
            dict.insert("Count", entry.children.len());
        }
        pdf.write_object(refs[index], &dict.into())?;
    }

    let mut dict = PdfDictionary::typed("Outlines").with("Count", top.len());
    if let (Some(first), Some(last)) = (top.first(), top.last()) {
        dict.insert("First", refs[*first]);
        dict.insert("Last", refs[*last]);
    }
    pdf.write_object(root, &dict.into())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::component::{BindableText, ComponentBuilder, LinkTarget};
    use crate::document::Document;

    fn uncompressed() -> crate::GenerationOptions {
        crate::GenerationOptions {
            compress_streams: false,
            ..Default::default()
        }
    }

    fn render(doc: &mut Document) -> String {
        let bytes = doc.save_as_pdf_to(Vec::new(), true).unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_minimal_document_structure() {
        let mut doc = Document::with_options(uncompressed());
        doc.info_mut().set_title(BindableText::literal("Report"));
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("Hello")))
            .unwrap();

        let pdf = render(&mut doc);
        assert!(pdf.starts_with("%PDF-1.7"));
        assert!(pdf.contains("/Type /Catalog"));
        assert!(pdf.contains("/BaseFont /Helvetica"));
        assert!(pdf.contains("(Hello) Tj"));
        assert!(pdf.contains("/Title (Report)"));
        assert!(pdf.contains("/ID [<"));
        assert!(pdf.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_outlines_links_and_names() {
        let mut doc = Document::with_options(uncompressed());
        doc.add_page(
            ComponentBuilder::page()
                .outline("Start")
                .named("start")
                .child(ComponentBuilder::link_to_uri(BindableText::literal("https://example.com"))),
        )
        .unwrap();
        doc.add_page(
            ComponentBuilder::page()
                .child(ComponentBuilder::link(LinkTarget::Destination("start".into())).child(ComponentBuilder::label("back"))),
        )
        .unwrap();

        let pdf = render(&mut doc);
        assert!(pdf.contains("/Type /Outlines"));
        assert!(pdf.contains("/Title (Start)"));
        assert!(pdf.contains("/Dests"));
        assert!(pdf.contains("/URI (https://example.com)"));
        assert!(pdf.contains("/Dest (start)"));
    }

    #[test]
    fn test_compressed_streams_are_flagged() {
        let mut doc = Document::new();
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("squeezed")))
            .unwrap();
        let pdf = render(&mut doc);
        assert!(pdf.contains("/Filter /FlateDecode"));
        assert!(!pdf.contains("(squeezed) Tj"));
    }
}
