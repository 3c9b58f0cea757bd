//! Reference layout: a vertical flow of blocks
//!
//! Each visible Page component starts a new output page; content that does
//! not fit continues on the pages that follow. Text is measured with the
//! resolved font's approximate metrics and wrapped at Unicode line break
//! opportunities. Every component registers its outline, destination and
//! annotations while it is laid out and closes them before returning.

use crate::artefacts::{
    Annotation, AnnotationAction, ArtefactCatalog, ArtefactRegistrationSet, PagePosition, PageRegion,
};
use crate::component::{ComponentKind, LinkTarget};
use crate::config::{GenerationOptions, PageSize};
use crate::document::Document;
use crate::{GenerationError, NodeId, Result};
use fonts::{Font, FontError, FontResource};
use resources::{ImageFormat, ImageResource};
use std::collections::HashMap;
use std::rc::Rc;
use unicode_linebreak::{linebreaks, BreakOpportunity};

/// Size of an image drawn without explicit dimensions or pixel data
const DEFAULT_IMAGE_SIZE: f64 = 100.0;

/// Side of the square reserved for an attachment icon
const ATTACHMENT_ICON_SIZE: f64 = 16.0;

/// Turns a bound component tree into pages
pub trait LayoutEngine {
    fn layout(&mut self, document: &mut Document) -> Result<LayoutDocument>;
}

// =============================================================================
// Layout output
// =============================================================================

/// One positioned piece of page content, in PDF user space
#[derive(Debug, Clone)]
pub enum PageItem {
    /// A line of text; `y` is the baseline
    Text {
        x: f64,
        y: f64,
        font: Rc<FontResource>,
        size: f32,
        text: String,
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image: Rc<ImageResource>,
    },
    /// A grey box standing in for an image that cannot be embedded
    Placeholder { x: f64, y: f64, width: f64, height: f64 },
}

#[derive(Debug, Clone)]
pub struct LayoutPage {
    pub width: f64,
    pub height: f64,
    pub items: Vec<PageItem>,
}

impl LayoutPage {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }
}

/// Resolved document information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

/// Display data for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNumber {
    /// One-based
    pub number: usize,
    pub total: usize,
}

impl std::fmt::Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Page {} of {}", self.number, self.total)
    }
}

/// Laid out pages plus the artefacts registered on them
#[derive(Debug, Clone)]
pub struct LayoutDocument {
    pub(crate) pages: Vec<LayoutPage>,
    pub(crate) artefacts: ArtefactCatalog,
    pub(crate) info: LayoutInfo,
    pub(crate) file_id: [u8; 16],
    pub(crate) compress: bool,
}

impl LayoutDocument {
    pub fn pages(&self) -> &[LayoutPage] {
        &self.pages
    }

    pub fn artefacts(&self) -> &ArtefactCatalog {
        &self.artefacts
    }

    pub fn info(&self) -> &LayoutInfo {
        &self.info
    }

    pub fn total_page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_numbering(&self) -> Vec<PageNumber> {
        let total = self.pages.len();
        (1..=total).map(|number| PageNumber { number, total }).collect()
    }

    /// Add the pages of another layout after these ones
    pub fn append(&mut self, other: LayoutDocument) -> Result<()> {
        let offset = self.pages.len();
        self.artefacts.append(other.artefacts, offset)?;
        self.pages.extend(other.pages);
        Ok(())
    }
}

// =============================================================================
// Flow engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct FlowLayoutEngine {
    page_size: PageSize,
    margin: f64,
    spacing: f64,
    default_font: String,
    default_size: f32,
}

impl Default for FlowLayoutEngine {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin: 36.0,
            spacing: 4.0,
            default_font: "Helvetica".to_string(),
            default_size: Font::DEFAULT_SIZE,
        }
    }
}

impl FlowLayoutEngine {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn for_options(options: &GenerationOptions) -> Self {
        Self::new(options.page_size)
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Space added after each block
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Font for labels without a style, as `family[,weight[,style]]`
    pub fn with_default_font(mut self, font: impl Into<String>, size: f32) -> Self {
        self.default_font = font.into();
        self.default_size = size;
        self
    }
}

impl LayoutEngine for FlowLayoutEngine {
    fn layout(&mut self, document: &mut Document) -> Result<LayoutDocument> {
        let default_font = Font::parse(&self.default_font)?.with_size(self.default_size);
        let mut run = FlowRun {
            engine: self,
            default_font,
            pages: Vec::new(),
            current: 0,
            cursor_y: 0.0,
            catalog: ArtefactCatalog::new(),
            fonts: HashMap::new(),
            doc: document,
        };
        run.register_additions()?;

        for page in run.doc.tree.pages() {
            if !run.doc.tree.component(page)?.is_visible() {
                continue;
            }
            run.start_page();
            run.layout_component(page, run.engine.margin, run.content_width())?;
        }
        run.catalog.ensure_closed()?;

        let info = &run.doc.info;
        let info = LayoutInfo {
            title: info.title_text().map(str::to_string),
            author: info.author_text().map(str::to_string),
            subject: info.subject_text().map(str::to_string),
            keywords: info.keywords_text().map(str::to_string),
        };
        tracing::debug!(pages = run.pages.len(), "flow layout complete");

        Ok(LayoutDocument {
            pages: run.pages,
            artefacts: run.catalog,
            info,
            file_id: *run.doc.uuid().as_bytes(),
            compress: run.doc.options.compress_streams,
        })
    }
}

/// State of one layout pass
struct FlowRun<'a> {
    engine: &'a FlowLayoutEngine,
    doc: &'a mut Document,
    default_font: Font,
    pages: Vec<LayoutPage>,
    current: usize,
    cursor_y: f64,
    catalog: ArtefactCatalog,
    fonts: HashMap<String, (Rc<FontResource>, f32)>,
}

impl FlowRun<'_> {
    fn dimensions(&self) -> (f64, f64) {
        self.engine.page_size.dimensions()
    }

    fn content_width(&self) -> f64 {
        self.dimensions().0 - 2.0 * self.engine.margin
    }

    fn top(&self) -> f64 {
        self.dimensions().1 - self.engine.margin
    }

    fn position(&self) -> PagePosition {
        PagePosition {
            page: self.current,
            y: self.cursor_y,
        }
    }

    /// Begin a fresh page after everything laid out so far
    fn start_page(&mut self) {
        let (width, height) = self.dimensions();
        self.pages.push(LayoutPage::new(width, height));
        self.current = self.pages.len() - 1;
        self.cursor_y = self.top();
    }

    /// Continue on the page after the current one, creating it if needed
    fn next_page(&mut self) {
        self.current += 1;
        if self.current == self.pages.len() {
            let (width, height) = self.dimensions();
            self.pages.push(LayoutPage::new(width, height));
        }
        self.cursor_y = self.top();
    }

    /// Move to the next page when `height` does not fit below the cursor,
    /// unless the page is still empty
    fn ensure_space(&mut self, height: f64) {
        if self.cursor_y - height < self.engine.margin && self.cursor_y < self.top() {
            self.next_page();
        }
    }

    fn push(&mut self, item: PageItem) {
        if let Some(page) = self.pages.get_mut(self.current) {
            page.items.push(item);
        }
    }

    fn register_additions(&mut self) -> Result<()> {
        let additions: Vec<(String, Option<String>)> = self
            .doc
            .additions
            .iter()
            .map(|a| (a.name().to_string(), a.resource_key().map(str::to_string)))
            .collect();
        for (name, key) in additions {
            if let Some(file) = key.and_then(|k| self.doc.resources.attachment(&k)) {
                let handle = self.catalog.add_embedded(name, file);
                self.catalog.close(handle)?;
            }
        }
        Ok(())
    }

    fn layout_component(&mut self, node: NodeId, x: f64, width: f64) -> Result<Vec<PageRegion>> {
        let component = self.doc.tree.component(node)?;
        if !component.is_visible() {
            return Ok(Vec::new());
        }

        let outline = component.outline_title().map(str::to_string);
        let destination = match component.name() {
            Some(name) => Some(name.to_string()),
            None if self.doc.options.name_all_components => Some(component.id().to_string()),
            None => None,
        };
        let kind = component.kind().clone();
        let style = component.style().map(str::to_string);
        let children = component.children().to_vec();

        let mut set = ArtefactRegistrationSet::new();
        let position = self.position();
        if let Some(title) = outline {
            set.register(self.catalog.open_outline(title, position))?;
        }
        if let Some(name) = destination {
            set.register(self.catalog.add_destination(name, position))?;
        }

        let regions = match &kind {
            ComponentKind::Document
            | ComponentKind::Page
            | ComponentKind::Panel
            | ComponentKind::Table
            | ComponentKind::TableCell => self.layout_stack(&children, x, width)?,
            ComponentKind::TableRow => self.layout_row(&children, x, width)?,
            ComponentKind::Label(content) => self.layout_text(content.display(), style.as_deref(), x, width)?,
            ComponentKind::Link(target) => self.layout_link(node, target, &children, style.as_deref(), x, width, &mut set)?,
            ComponentKind::Image(image) => {
                self.layout_image(node, image.resource_key.as_deref(), image.width, image.height, x, width)?
            }
            ComponentKind::Attachment(attachment) => match attachment
                .resource_key
                .as_deref()
                .and_then(|k| self.doc.resources.attachment(k))
            {
                Some(file) => {
                    let region = self.reserve(x, ATTACHMENT_ICON_SIZE, ATTACHMENT_ICON_SIZE);
                    set.register_item(self.catalog.add_annotation(Annotation {
                        region,
                        action: AnnotationAction::Attachment(file),
                    }));
                    vec![region]
                }
                None => Vec::new(),
            },
            // Template items are laid out where they were inserted
            ComponentKind::Template(_) => Vec::new(),
        };

        set.close(&mut self.catalog)?;
        Ok(regions)
    }

    fn layout_stack(&mut self, children: &[NodeId], x: f64, width: f64) -> Result<Vec<PageRegion>> {
        let mut regions = Vec::new();
        for &child in children {
            regions.extend(self.layout_component(child, x, width)?);
        }
        Ok(regions)
    }

    /// Cells side by side in equal columns; the row ends below its tallest cell
    fn layout_row(&mut self, children: &[NodeId], x: f64, width: f64) -> Result<Vec<PageRegion>> {
        let cells: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| self.doc.tree.get(*c).is_some_and(|c| c.is_visible()))
            .collect();
        if cells.is_empty() {
            return Ok(Vec::new());
        }

        let cell_width = width / cells.len() as f64;
        let start = (self.current, self.cursor_y);
        let mut furthest = start;
        let mut regions = Vec::new();
        for (i, cell) in cells.into_iter().enumerate() {
            (self.current, self.cursor_y) = start;
            regions.extend(self.layout_component(cell, x + i as f64 * cell_width, cell_width)?);
            if self.current > furthest.0 || (self.current == furthest.0 && self.cursor_y < furthest.1) {
                furthest = (self.current, self.cursor_y);
            }
        }
        (self.current, self.cursor_y) = furthest;
        Ok(regions)
    }

    fn layout_text(&mut self, text: &str, style: Option<&str>, x: f64, width: f64) -> Result<Vec<PageRegion>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let (font, size) = self.font_for(style)?;
        let definition = font.definition();
        let line_height = f64::from(definition.line_height(size));
        let ascent = f64::from(definition.ascent(size));

        let mut regions = Vec::new();
        for line in wrap_lines(text, width as f32, |s| definition.measure(s, size)) {
            self.ensure_space(line_height);
            let line_width = f64::from(definition.measure(&line, size));
            let top = self.cursor_y;
            self.push(PageItem::Text {
                x,
                y: top - ascent,
                font: Rc::clone(&font),
                size,
                text: line,
            });
            self.cursor_y -= line_height;
            regions.push(PageRegion {
                page: self.current,
                rect: [x, self.cursor_y, x + line_width.min(width), top],
            });
        }
        self.cursor_y -= self.engine.spacing;
        Ok(regions)
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_link(
        &mut self,
        node: NodeId,
        target: &LinkTarget,
        children: &[NodeId],
        style: Option<&str>,
        x: f64,
        width: f64,
        set: &mut ArtefactRegistrationSet,
    ) -> Result<Vec<PageRegion>> {
        let action = self.link_action(node, target)?;

        if children.is_empty() {
            let text = match target {
                LinkTarget::Destination(name) | LinkTarget::File(name) => name.as_str(),
                LinkTarget::Uri(content) => content.display(),
            };
            let regions = self.layout_text(text, style, x, width)?;
            if let Some(action) = &action {
                for region in &regions {
                    set.register_item(self.catalog.add_annotation(Annotation {
                        region: *region,
                        action: action.clone(),
                    }));
                }
            }
            return Ok(regions);
        }

        // One annotation per region of each child, registered once the child is done
        let mut regions = Vec::new();
        for &child in children {
            let child_regions = self.layout_component(child, x, width)?;
            if let Some(action) = &action {
                for region in &child_regions {
                    set.register_item(self.catalog.add_annotation(Annotation {
                        region: *region,
                        action: action.clone(),
                    }));
                }
            }
            regions.extend(child_regions);
        }
        Ok(regions)
    }

    fn link_action(&mut self, node: NodeId, target: &LinkTarget) -> Result<Option<AnnotationAction>> {
        match target {
            LinkTarget::Destination(name) => Ok(Some(AnnotationAction::Destination(name.clone()))),
            LinkTarget::Uri(content) => {
                let uri = content.display().trim();
                Ok((!uri.is_empty()).then(|| AnnotationAction::Uri(uri.to_string())))
            }
            LinkTarget::File(name) => {
                let file = self
                    .doc
                    .additions
                    .iter()
                    .find(|a| a.name() == name)
                    .and_then(|a| a.resource_key())
                    .and_then(|k| self.doc.resources.attachment(k));
                match file {
                    Some(file) => Ok(Some(AnnotationAction::Launch(file))),
                    None => {
                        let what = self.doc.describe(node);
                        self.doc.tolerate(
                            "Layout",
                            what,
                            GenerationError::Reference(format!("no loaded addition named '{}'", name)),
                        )?;
                        Ok(None)
                    }
                }
            }
        }
    }

    fn layout_image(
        &mut self,
        node: NodeId,
        key: Option<&str>,
        width: Option<f64>,
        height: Option<f64>,
        x: f64,
        max_width: f64,
    ) -> Result<Vec<PageRegion>> {
        let image = key.and_then(|k| self.doc.resources.image(k));
        let (natural_w, natural_h) = match &image {
            Some(image) if image.data().width() > 0 && image.data().height() > 0 => {
                (f64::from(image.data().width()), f64::from(image.data().height()))
            }
            _ => (DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE),
        };
        let (mut w, mut h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * natural_h / natural_w),
            (None, Some(h)) => (h * natural_w / natural_h, h),
            (None, None) => (natural_w, natural_h),
        };
        if w > max_width {
            h *= max_width / w;
            w = max_width;
        }

        let region = self.reserve(x, w, h);
        let [x1, y1, ..] = region.rect;
        match image {
            Some(image) if image.data().format() == ImageFormat::Jpeg && !image.data().is_placeholder() => {
                self.push(PageItem::Image {
                    x: x1,
                    y: y1,
                    width: w,
                    height: h,
                    image,
                })
            }
            other => {
                if other.as_ref().is_some_and(|i| !i.data().is_placeholder()) {
                    tracing::debug!(component = %self.doc.describe(node), "image format cannot be embedded, drawing a placeholder");
                }
                self.push(PageItem::Placeholder {
                    x: x1,
                    y: y1,
                    width: w,
                    height: h,
                })
            }
        }
        Ok(vec![region])
    }

    /// Claim a block of the given size below the cursor
    fn reserve(&mut self, x: f64, width: f64, height: f64) -> PageRegion {
        self.ensure_space(height);
        let top = self.cursor_y;
        self.cursor_y -= height + self.engine.spacing;
        PageRegion {
            page: self.current,
            rect: [x, top - height, x + width, top],
        }
    }

    /// The resource and size for text in the given style
    fn font_for(&mut self, style: Option<&str>) -> Result<(Rc<FontResource>, f32)> {
        let mut font = style
            .and_then(|name| self.doc.styles.get(name))
            .and_then(|s| s.resolved_font())
            .cloned()
            .unwrap_or_else(|| self.default_font.clone());

        let size = font.size();
        let key = format!("{}@{}", font, size);
        if let Some(found) = self.fonts.get(&key) {
            return Ok(found.clone());
        }

        let matched = self
            .doc
            .resolve_font(&mut font, true)
            .ok_or_else(|| FontError::FontNotFound(font.to_string()))?;
        let entry = (matched.resource, size);
        self.fonts.insert(key, entry.clone());
        Ok(entry)
    }
}

/// Greedy line filling at Unicode break opportunities. A word wider than
/// the line gets a line of its own.
fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut last_fit: Option<usize> = None;

    for (offset, opportunity) in linebreaks(text) {
        if measure(text[line_start..offset].trim_end()) > max_width {
            if let Some(fit) = last_fit.take() {
                lines.push(text[line_start..fit].trim_end().to_string());
                line_start = fit;
            }
        }
        match opportunity {
            BreakOpportunity::Mandatory => {
                lines.push(text[line_start..offset].trim_end().to_string());
                line_start = offset;
                last_fit = None;
            }
            BreakOpportunity::Allowed => last_fit = Some(offset),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentBuilder;
    use crate::document::Addition;

    fn char_width(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn test_wrap_lines() {
        assert_eq!(wrap_lines("one two three", 7.0, char_width), vec!["one two", "three"]);
        assert_eq!(wrap_lines("a\nb", 100.0, char_width), vec!["a", "b"]);
        assert_eq!(
            wrap_lines("tiny enormousword x", 5.0, char_width),
            vec!["tiny", "enormousword", "x"]
        );
    }

    fn laid_out(doc: &mut Document) -> LayoutDocument {
        doc.initialize_and_load().unwrap();
        doc.data_bind().unwrap();
        doc.layout().unwrap()
    }

    #[test]
    fn test_one_output_page_per_page_component() {
        let mut doc = Document::new();
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("first")))
            .unwrap();
        doc.add_page(ComponentBuilder::page().hidden()).unwrap();
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("second")))
            .unwrap();

        let layout = laid_out(&mut doc);
        assert_eq!(layout.total_page_count(), 2);
        assert_eq!(layout.page_numbering()[1].to_string(), "Page 2 of 2");
        assert!(matches!(&layout.pages()[0].items[0], PageItem::Text { text, .. } if text == "first"));
    }

    #[test]
    fn test_long_content_overflows() {
        let mut doc = Document::new();
        let labels = (0..200).map(|i| ComponentBuilder::label(format!("line {}", i)));
        doc.add_page(ComponentBuilder::page().children(labels)).unwrap();
        let layout = laid_out(&mut doc);
        assert!(layout.total_page_count() > 1);
    }

    #[test]
    fn test_nested_outlines_and_names() {
        let mut doc = Document::new();
        doc.add_page(
            ComponentBuilder::page().outline("Chapter").child(
                ComponentBuilder::panel()
                    .outline("Section")
                    .named("section")
                    .child(ComponentBuilder::label("body")),
            ),
        )
        .unwrap();
        let layout = laid_out(&mut doc);

        let outlines = layout.artefacts().outlines();
        assert_eq!(outlines.len(), 2);
        assert_eq!(outlines[1].parent, Some(0));
        assert_eq!(layout.artefacts().destinations()[0].name, "section");
        assert_eq!(layout.artefacts().open_count(), 0);
    }

    #[test]
    fn test_link_annotates_each_child_region() {
        let mut doc = Document::new();
        doc.add_page(
            ComponentBuilder::page().child(
                ComponentBuilder::link(LinkTarget::Destination("end".into()))
                    .child(ComponentBuilder::label("a"))
                    .child(ComponentBuilder::label("b")),
            ),
        )
        .unwrap();
        let layout = laid_out(&mut doc);
        let annotations = layout.artefacts().annotations();
        assert_eq!(annotations.len(), 2);
        assert!(annotations
            .iter()
            .all(|a| matches!(&a.action, AnnotationAction::Destination(d) if d == "end")));
    }

    #[test]
    fn test_link_to_missing_addition_is_tolerated() {
        let mut doc = Document::new();
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::link(LinkTarget::File("nope".into()))))
            .unwrap();
        let layout = laid_out(&mut doc);
        assert!(layout.artefacts().annotations().is_empty());
        assert!(doc.trace().entries().iter().any(|e| e.to_string().contains("nope")));
    }

    #[test]
    fn test_table_row_cells_share_the_line() {
        let mut doc = Document::new();
        doc.add_page(
            ComponentBuilder::page().child(
                ComponentBuilder::table().child(
                    ComponentBuilder::row()
                        .child(ComponentBuilder::cell().child(ComponentBuilder::label("left")))
                        .child(ComponentBuilder::cell().child(ComponentBuilder::label("right"))),
                ),
            ),
        )
        .unwrap();
        let layout = laid_out(&mut doc);
        let baselines: Vec<f64> = layout.pages()[0]
            .items
            .iter()
            .filter_map(|i| match i {
                PageItem::Text { y, .. } => Some(*y),
                _ => None,
            })
            .collect();
        assert_eq!(baselines.len(), 2);
        assert_eq!(baselines[0], baselines[1]);
    }

    #[test]
    fn test_additions_become_embedded_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();

        let mut doc = Document::new().with_path_mapper(crate::paths::RootedPathMapper::new(dir.path()));
        doc.add_addition(Addition::new("data", "data.csv"));
        doc.add_page(ComponentBuilder::page()).unwrap();
        let layout = laid_out(&mut doc);

        let embedded = layout.artefacts().embedded();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].file.data().file_name(), "data.csv");
    }
}
