//! The document: root of the component tree and owner of everything the
//! components share
//!
//! Generation runs in fixed stages, each guarded by [`GenerationStage`]:
//!
//! 1. `init` walks params, additions, data sources, styles, then the tree
//! 2. `load` reads additions, data sources and literal image/attachment sources
//! 3. `data_bind` resolves info, styles and bound content, and expands templates
//! 4. `layout` hands the tree to a [`LayoutEngine`]
//! 5. `write_pdf` serializes the laid out pages

use crate::component::{BindableText, Component, ComponentBuilder, ComponentKind, LinkTarget, LoadType, TextContent};
use crate::config::GenerationOptions;
use crate::events::{ComponentEvent, EventArgs};
use crate::layout::{FlowLayoutEngine, LayoutDocument, LayoutEngine};
use crate::parser::{ComponentParser, JsonComponentParser, ParsedDataSource, ParsedDocument};
use crate::paths::{MappedPath, PathMapper, RootedPathMapper};
use crate::perf::PerfMonitor;
use crate::remote::{RemoteFileRequest, RemoteOutcome, RemoteRequestQueue, RequestId};
use crate::stage::GenerationStage;
use crate::style::{Style, StyleCollection};
use crate::template::TemplateSpec;
use crate::trace::{TraceLevel, TraceLog};
use crate::tree::ComponentTree;
use crate::{GenerationError, NodeId, Result};
use data_binding::{
    BindingPath, BindingValue, ConformanceMode, DataContext, DataSource, DataSourceCollection, InlineDataSource,
    ItemCollection,
};
use fonts::{Font, FontFactory, FontMatch, FontMatcher, FontRegistry, MatchOutcome};
use resources::{AttachmentData, CacheProvider, ImageData, InMemoryCache, ResourceType, SharedResources};
use std::collections::HashSet;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uuid::Uuid;

/// Size given to placeholder images, in pixels
const PLACEHOLDER_SIZE: u32 = 100;

/// Longest cache lifetime accepted from the options (ten years)
const MAX_CACHE_TTL_SECONDS: u64 = 315_360_000;

// =============================================================================
// Additions and document info
// =============================================================================

/// A file embedded in the output at document level
#[derive(Debug, Clone)]
pub struct Addition {
    name: String,
    source: String,
    description: Option<String>,
    resource_key: Option<String>,
}

impl Addition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            description: None,
            resource_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Key of the shared attachment once loaded
    pub fn resource_key(&self) -> Option<&str> {
        self.resource_key.as_deref()
    }
}

/// Title, author, subject and keywords; each may be bound
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: Option<TextContent>,
    pub author: Option<TextContent>,
    pub subject: Option<TextContent>,
    pub keywords: Option<TextContent>,
}

impl DocumentInfo {
    pub fn set_title(&mut self, text: BindableText) {
        self.title = Some(TextContent::new(text));
    }

    pub fn set_author(&mut self, text: BindableText) {
        self.author = Some(TextContent::new(text));
    }

    pub fn set_subject(&mut self, text: BindableText) {
        self.subject = Some(TextContent::new(text));
    }

    pub fn set_keywords(&mut self, text: BindableText) {
        self.keywords = Some(TextContent::new(text));
    }

    fn fields_mut(&mut self) -> impl Iterator<Item = &mut TextContent> {
        [&mut self.title, &mut self.author, &mut self.subject, &mut self.keywords]
            .into_iter()
            .flatten()
    }

    pub(crate) fn bind(&mut self, context: &DataContext) {
        for field in self.fields_mut() {
            field.resolved = Some(field.text.resolve(context));
        }
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_ref().map(TextContent::display)
    }

    pub fn author_text(&self) -> Option<&str> {
        self.author.as_ref().map(TextContent::display)
    }

    pub fn subject_text(&self) -> Option<&str> {
        self.subject.as_ref().map(TextContent::display)
    }

    pub fn keywords_text(&self) -> Option<&str> {
        self.keywords.as_ref().map(TextContent::display)
    }
}

/// Formats [`Document::render_to`] can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputFormat {
    Pdf,
}

// =============================================================================
// Document
// =============================================================================

pub struct Document {
    uuid: Uuid,
    pub(crate) tree: ComponentTree,
    stage: GenerationStage,
    pub(crate) options: GenerationOptions,
    params: ItemCollection,
    pub(crate) additions: Vec<Addition>,
    pub(crate) data_sources: DataSourceCollection,
    pub(crate) styles: StyleCollection,
    pub(crate) info: DocumentInfo,
    pub(crate) resources: SharedResources,
    cache: Box<dyn CacheProvider>,
    font_matcher: FontMatcher,
    pub(crate) trace: TraceLog,
    perf: PerfMonitor,
    remote: RemoteRequestQueue,
    path_mapper: Box<dyn PathMapper>,
    loaded_source: Option<PathBuf>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("uuid", &self.uuid)
            .field("stage", &self.stage)
            .field("components", &self.tree.len())
            .field("loaded_source", &self.loaded_source)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_options(GenerationOptions::default())
    }

    pub fn with_options(options: GenerationOptions) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            tree: ComponentTree::new(),
            stage: GenerationStage::None,
            params: ItemCollection::new(),
            additions: Vec::new(),
            data_sources: DataSourceCollection::new(),
            styles: StyleCollection::new(),
            info: DocumentInfo::default(),
            resources: SharedResources::new(),
            cache: Box::new(InMemoryCache::new()),
            font_matcher: FontMatcher::new(FontRegistry::standard(), options.font_substitution),
            trace: TraceLog::new(options.trace_level),
            perf: PerfMonitor::default(),
            remote: RemoteRequestQueue::new(),
            path_mapper: Box::new(RootedPathMapper::current_dir()),
            loaded_source: None,
            options,
        }
    }

    /// Replace the font factory fonts are loaded from
    pub fn with_font_factory(mut self, factory: impl FontFactory + 'static) -> Self {
        self.font_matcher = FontMatcher::new(factory, self.options.font_substitution);
        self
    }

    pub fn with_cache(mut self, cache: impl CacheProvider + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn with_path_mapper(mut self, mapper: impl PathMapper + 'static) -> Self {
        self.path_mapper = Box::new(mapper);
        self
    }

    /// Parse a document file and build a document from it
    pub fn open(path: impl AsRef<Path>, options: GenerationOptions) -> Result<Self> {
        let parser = JsonComponentParser::new(options.conformance);
        let parsed = parser.parse_file(path.as_ref())?;
        Self::from_parsed(parsed, options)
    }

    /// Build a document from parser output. Processing instructions in the
    /// file override the given options.
    pub fn from_parsed(parsed: ParsedDocument, mut options: GenerationOptions) -> Result<Self> {
        parsed.instructions.apply(&mut options);
        let mut document = Self::with_options(options);
        document.loaded_source = parsed.source;
        document.info = parsed.info;
        for (name, value) in parsed.params {
            document.params.set(name, value);
        }
        document.additions = parsed.additions;
        for source in parsed.data_sources {
            match source {
                ParsedDataSource::Inline(s) => document.data_sources.add(s),
                ParsedDataSource::Json(s) => document.data_sources.add(s),
                ParsedDataSource::Csv(s) => document.data_sources.add(s),
            }
        }
        for style in parsed.styles {
            document.styles.add(style);
        }
        let root = document.tree.root();
        for page in &parsed.pages {
            document.tree.append(root, page)?;
        }
        Ok(document)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn conformance(&self) -> ConformanceMode {
        self.options.conformance
    }

    pub fn auto_bind(&self) -> bool {
        self.options.auto_bind
    }

    pub fn set_auto_bind(&mut self, auto_bind: bool) {
        self.options.auto_bind = auto_bind;
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn component(&self, node: NodeId) -> Result<&Component> {
        self.tree.component(node)
    }

    pub fn component_mut(&mut self, node: NodeId) -> Result<&mut Component> {
        self.tree.component_mut(node)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Component> {
        self.tree.find_by_name(name).and_then(|n| self.tree.get(n))
    }

    /// Add a subtree as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, builder: &ComponentBuilder) -> Result<NodeId> {
        self.stage.check_not_disposed()?;
        self.tree.append(parent, builder)
    }

    /// Add a page below the document root
    pub fn add_page(&mut self, page: ComponentBuilder) -> Result<NodeId> {
        let root = self.tree.root();
        self.append(root, &page)
    }

    /// Parameters, copied into the item collection when binding
    pub fn params_mut(&mut self) -> &mut ItemCollection {
        &mut self.params
    }

    pub fn add_addition(&mut self, addition: Addition) {
        self.additions.push(addition);
    }

    pub fn additions(&self) -> &[Addition] {
        &self.additions
    }

    pub fn add_data_source(&mut self, source: impl DataSource + 'static) {
        self.data_sources.add(source);
    }

    pub fn data_sources(&self) -> &DataSourceCollection {
        &self.data_sources
    }

    pub fn add_style(&mut self, style: Style) {
        self.styles.add(style);
    }

    pub fn styles(&self) -> &StyleCollection {
        &self.styles
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut DocumentInfo {
        &mut self.info
    }

    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    pub fn perf(&self) -> &PerfMonitor {
        &self.perf
    }

    pub fn remote_requests(&self) -> &RemoteRequestQueue {
        &self.remote
    }

    /// The file the document was parsed from
    pub fn loaded_source(&self) -> Option<&Path> {
        self.loaded_source.as_deref()
    }

    pub(crate) fn describe(&self, node: NodeId) -> String {
        self.tree
            .get(node)
            .map(|c| c.to_string())
            .unwrap_or_else(|| node.to_string())
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    fn run_stage<T>(&mut self, name: &'static str, stage: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let _timer = self.perf.begin(name);
        self.trace.begin(TraceLevel::Verbose, "Document", format!("{} started", name));
        let outcome = stage(self);
        let status = if outcome.is_ok() { "finished" } else { "failed" };
        self.trace.end(TraceLevel::Verbose, "Document", format!("{} {}", name, status));
        outcome
    }

    pub fn init(&mut self) -> Result<()> {
        self.stage.check_can_init()?;
        self.run_stage("init", |doc| {
            doc.trace
                .add(TraceLevel::Debug, "Document", format!("{} parameter(s)", doc.params.len()));

            let mut names = HashSet::new();
            for addition in &doc.additions {
                if addition.name.trim().is_empty() {
                    return Err(GenerationError::structural("a document addition must have a name"));
                }
                if !names.insert(addition.name.as_str()) {
                    return Err(GenerationError::structural(format!(
                        "an addition named '{}' already exists in the document",
                        addition.name
                    )));
                }
            }

            for id in doc.data_sources.ids() {
                doc.trace.add(TraceLevel::Debug, "Document", format!("data source '{}'", id));
            }

            let failures: Vec<(String, GenerationError)> = doc
                .styles
                .iter_mut()
                .filter_map(|s| s.validate().err().map(|e| (format!("Style '{}'", s.name()), e)))
                .collect();
            for (what, e) in failures {
                doc.tolerate("Document", what, e)?;
            }

            let root = doc.tree.root();
            doc.init_subtree(root)?;
            doc.stage = GenerationStage::Initialized;
            Ok(())
        })
    }

    pub fn load(&mut self) -> Result<()> {
        self.stage.check_can_load()?;
        self.run_stage("load", |doc| {
            doc.load_additions()?;
            doc.load_data_sources()?;
            doc.load_styles();
            let root = doc.tree.root();
            doc.load_subtree(root)?;
            doc.stage = GenerationStage::Loaded;
            Ok(())
        })
    }

    pub fn initialize_and_load(&mut self) -> Result<()> {
        self.init()?;
        self.load()
    }

    /// Bind the whole document. May be repeated once bound; templates
    /// replace what they inserted on the previous pass.
    pub fn data_bind(&mut self) -> Result<()> {
        self.stage.check_can_bind()?;
        self.run_stage("bind", |doc| {
            let mut context = DataContext::new(doc.params.clone(), doc.options.conformance);

            doc.trace
                .add(TraceLevel::Debug, "Binding", format!("{} addition(s)", doc.additions.len()));
            doc.info.bind(&context);
            for id in doc.data_sources.ids() {
                doc.trace.add(TraceLevel::Debug, "Binding", format!("data source '{}' available", id));
            }

            let failures: Vec<(String, GenerationError)> = doc
                .styles
                .iter_mut()
                .filter_map(|s| s.bind(&context).err().map(|e| (format!("Style '{}'", s.name()), e)))
                .collect();
            for (what, e) in failures {
                doc.apply_conformance(what, e)?;
            }

            let root = doc.tree.root();
            doc.data_bind_component(root, &mut context, true)?;
            doc.stage = GenerationStage::Bound;
            Ok(())
        })
    }

    /// Lay out with the flow engine
    pub fn layout(&mut self) -> Result<LayoutDocument> {
        let mut engine = FlowLayoutEngine::for_options(&self.options);
        self.layout_with(&mut engine)
    }

    /// Lay out with `engine`, binding first when the document is loaded but
    /// unbound and auto-bind is on
    pub fn layout_with(&mut self, engine: &mut dyn LayoutEngine) -> Result<LayoutDocument> {
        if self.stage == GenerationStage::Loaded && self.options.auto_bind {
            self.data_bind()?;
        }
        self.stage.check_can_layout()?;
        self.remote.ensure_fulfilled(self.options.conformance, &mut self.trace)?;
        self.run_stage("layout", |doc| {
            let layout = engine.layout(doc)?;
            doc.stage = GenerationStage::Laidout;
            Ok(layout)
        })
    }

    /// Serialize a layout, appending the trace log first when configured
    pub fn write_pdf<W: Write>(&mut self, mut layout: LayoutDocument, writer: W) -> Result<W> {
        self.stage.check_can_write()?;
        let _timer = self.perf.begin("write");
        if self.options.append_trace_log {
            let appendix = self.trace_appendix()?;
            layout.append(appendix)?;
        }
        let writer = layout.output_to_pdf(writer)?;
        self.stage = GenerationStage::Written;
        self.trace.add(
            TraceLevel::Message,
            "Document",
            format!("wrote {} page(s)", layout.total_page_count()),
        );
        Ok(writer)
    }

    /// Run whatever stages remain and write the PDF to `writer`
    pub fn save_as_pdf_to<W: Write>(&mut self, writer: W, bind: bool) -> Result<W> {
        if self.stage == GenerationStage::None {
            self.initialize_and_load()?;
        }
        if bind {
            self.data_bind()?;
        }
        let layout = self.layout()?;
        self.write_pdf(layout, writer)
    }

    pub fn save_as_pdf(&mut self, path: impl AsRef<Path>, bind: bool) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = self.save_as_pdf_to(BufWriter::new(file), bind)?;
        writer.flush()?;
        Ok(())
    }

    pub fn render_to<W: Write>(&mut self, writer: W, format: OutputFormat) -> Result<W> {
        match format {
            OutputFormat::Pdf => self.save_as_pdf_to(writer, false),
        }
    }

    pub fn dispose(&mut self) -> Result<()> {
        self.stage.check_not_disposed()?;
        let nodes = self.tree.descendants(self.tree.root());
        let outcome = nodes
            .into_iter()
            .try_for_each(|n| self.fire(n, ComponentEvent::Disposed, None));
        self.stage = GenerationStage::Disposed;
        outcome
    }

    // -------------------------------------------------------------------------
    // Error tolerance
    // -------------------------------------------------------------------------

    /// The per-component binding boundary: Lax logs and continues, Strict
    /// wraps the failure as a data error
    pub(crate) fn apply_conformance(&mut self, component: String, err: GenerationError) -> Result<()> {
        if err.always_propagates() {
            return Err(err);
        }
        match self.options.conformance {
            ConformanceMode::Lax => {
                self.trace.error("Binding", format!("{}: {}", component, err));
                Ok(())
            }
            ConformanceMode::Strict => Err(GenerationError::Data {
                message: err.to_string(),
                component,
                source: Some(Box::new(err)),
            }),
        }
    }

    /// Reference and load failures: Lax logs and skips, Strict returns the error
    pub(crate) fn tolerate(&mut self, category: &str, what: String, err: GenerationError) -> Result<()> {
        if err.always_propagates() || self.options.conformance == ConformanceMode::Strict {
            return Err(err);
        }
        self.trace.error(category, format!("{}: {}", what, err));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Events and subtree walks
    // -------------------------------------------------------------------------

    pub(crate) fn fire(&mut self, node: NodeId, event: ComponentEvent, context: Option<&DataContext>) -> Result<()> {
        let handlers = self.tree.component(node)?.handlers(event);
        for handler in handlers {
            let mut args = EventArgs {
                event,
                source: node,
                context,
                item: None,
            };
            handler(&mut args)?;
        }
        Ok(())
    }

    pub(crate) fn init_subtree(&mut self, node: NodeId) -> Result<()> {
        for n in self.tree.descendants(node) {
            self.fire(n, ComponentEvent::Init, None)?;
        }
        Ok(())
    }

    pub(crate) fn load_subtree(&mut self, node: NodeId) -> Result<()> {
        for n in self.tree.descendants(node) {
            let pending = match self.tree.component(n)?.kind() {
                ComponentKind::Image(image) => image
                    .source
                    .text
                    .literal_text()
                    .map(|s| (ResourceType::Image, s.to_string(), None)),
                ComponentKind::Attachment(attachment) => attachment
                    .source
                    .text
                    .literal_text()
                    .map(|s| (ResourceType::Attachment, s.to_string(), attachment.description.clone())),
                _ => None,
            };
            if let Some((resource_type, source, description)) = pending {
                if !source.trim().is_empty() {
                    self.load_component_resource(n, resource_type, &source, description)?;
                }
            }
            self.fire(n, ComponentEvent::Loaded, None)?;
        }
        Ok(())
    }

    /// Remove a subtree and dispose it, together with whatever templates
    /// inside it inserted elsewhere
    pub(crate) fn dispose_subtree(&mut self, node: NodeId) -> Result<()> {
        let owned: Vec<NodeId> = self
            .tree
            .descendants(node)
            .into_iter()
            .filter_map(|n| self.tree.get(n))
            .flat_map(|c| c.bound_items().to_vec())
            .collect();
        for item in owned {
            if self.tree.contains(item) {
                self.dispose_subtree(item)?;
            }
        }
        if !self.tree.contains(node) {
            return Ok(());
        }

        for component in self.tree.remove(node)? {
            for handler in component.handlers(ComponentEvent::Disposed) {
                let mut args = EventArgs {
                    event: ComponentEvent::Disposed,
                    source: component.node_id(),
                    context: None,
                    item: None,
                };
                handler(&mut args)?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Binding walk
    // -------------------------------------------------------------------------

    /// Bind one component, applying the conformance mode to its failure
    pub(crate) fn data_bind_component(
        &mut self,
        node: NodeId,
        context: &mut DataContext,
        include_children: bool,
    ) -> Result<()> {
        let is_template = matches!(self.tree.component(node)?.kind(), ComponentKind::Template(_));
        let outcome = if is_template {
            self.bind_template(node, context, include_children)
        } else {
            self.bind_node(node, context, include_children)
        };
        match outcome {
            Ok(()) => self.fire(node, ComponentEvent::DataBound, Some(&*context)),
            Err(e) => {
                let component = self.describe(node);
                self.apply_conformance(component, e)
            }
        }
    }

    fn bind_node(&mut self, node: NodeId, context: &mut DataContext, include_children: bool) -> Result<()> {
        self.fire(node, ComponentEvent::DataBinding, Some(&*context))?;
        self.resolve_bound_content(node, context)?;
        if !include_children {
            return Ok(());
        }

        // Items inserted by a template are bound by that template
        let children = self.tree.children(node).to_vec();
        for child in children {
            let skip = self.tree.get(child).map_or(true, |c| c.template_owner().is_some());
            if !skip {
                self.data_bind_component(child, context, true)?;
            }
        }
        Ok(())
    }

    fn resolve_bound_content(&mut self, node: NodeId, context: &DataContext) -> Result<()> {
        fn resolve(content: &mut TextContent, context: &DataContext) -> bool {
            if !content.text.is_bound() {
                return false;
            }
            let value = content.text.resolve(context);
            let changed = content.resolved.as_ref().is_some_and(|previous| *previous != value);
            content.resolved = Some(value);
            changed
        }

        let mut pending = None;
        let changed = match self.tree.component_mut(node)?.kind_mut() {
            ComponentKind::Label(content) => resolve(content, context),
            ComponentKind::Link(LinkTarget::Uri(content)) => resolve(content, context),
            ComponentKind::Image(image) => {
                let changed = resolve(&mut image.source, context);
                if image.source.text.is_bound() {
                    pending = Some((ResourceType::Image, image.source.display().to_string(), None));
                }
                changed
            }
            ComponentKind::Attachment(attachment) => {
                let changed = resolve(&mut attachment.source, context);
                if attachment.source.text.is_bound() {
                    pending = Some((
                        ResourceType::Attachment,
                        attachment.source.display().to_string(),
                        attachment.description.clone(),
                    ));
                }
                changed
            }
            _ => false,
        };

        if changed {
            self.fire(node, ComponentEvent::ContentChanged, Some(context))?;
        }
        if let Some((resource_type, source, description)) = pending {
            if source.trim().is_empty() {
                tracing::debug!(component = %self.describe(node), "bound source resolved to nothing");
            } else {
                self.load_component_resource(node, resource_type, &source, description)?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------------

    fn cache_ttl(&self) -> chrono::Duration {
        let seconds = self.options.cache_ttl_seconds.min(MAX_CACHE_TTL_SECONDS);
        chrono::Duration::seconds(seconds as i64)
    }

    fn read_cached(&mut self, key: &str, path: &Path) -> Result<Rc<Vec<u8>>> {
        let ttl = self.cache_ttl();
        let mut read = || -> resources::Result<Vec<u8>> { Ok(std::fs::read(path)?) };
        Ok(self.cache.get_or_load(key, ttl, &mut read)?)
    }

    fn load_component_resource(
        &mut self,
        node: NodeId,
        resource_type: ResourceType,
        source: &str,
        description: Option<String>,
    ) -> Result<()> {
        let (load_type, base) = {
            let component = self.tree.component(node)?;
            (component.load_type(), component.loaded_source().map(Path::to_path_buf))
        };
        let loaded = self.load_resource(resource_type, source, load_type, base.as_deref(), Some(node), description);
        let key = match (resource_type, loaded) {
            (_, Ok(key)) => key,
            (ResourceType::Attachment, Err(e)) => {
                let what = self.describe(node);
                return self.tolerate("Load", what, e);
            }
            (_, Err(e)) => return Err(e),
        };

        match self.tree.component_mut(node)?.kind_mut() {
            ComponentKind::Image(image) => image.resource_key = Some(key),
            ComponentKind::Attachment(attachment) => attachment.resource_key = Some(key),
            _ => {}
        }
        Ok(())
    }

    /// Load `source` into the shared resources and return its key. Remote
    /// sources register a request and are stored when the host completes it.
    pub(crate) fn load_resource(
        &mut self,
        resource_type: ResourceType,
        source: &str,
        load_type: LoadType,
        base: Option<&Path>,
        owner: Option<NodeId>,
        description: Option<String>,
    ) -> Result<String> {
        let mapped = self.path_mapper.map_path(source, load_type, base)?;
        let key = mapped.to_string();
        if self.resources.contains(resource_type, &key) {
            return Ok(key);
        }

        match mapped {
            MappedPath::File(path) => match resource_type {
                ResourceType::Image => self.load_image_file(&key, &path)?,
                ResourceType::Attachment => {
                    let bytes = self.read_cached(&key, &path)?;
                    let mut data = AttachmentData::new(file_name_of(source), bytes);
                    if let Some(description) = description {
                        data = data.with_description(description);
                    }
                    self.resources.add_attachment(key.clone(), data);
                }
                ResourceType::Font => {
                    return Err(GenerationError::NotImplemented(format!(
                        "loading font files ({})",
                        source
                    )))
                }
            },
            MappedPath::Remote(url) => {
                let callback = remote_callback(resource_type, key.clone(), source, description, self.options.allow_missing_images);
                let mut request = RemoteFileRequest::new(url, resource_type, key.clone(), callback);
                if let Some(owner) = owner {
                    request = request.owned_by(owner);
                }
                self.remote.register(request);
            }
        }
        Ok(key)
    }

    fn load_image_file(&mut self, key: &str, path: &Path) -> Result<()> {
        let loaded = self
            .read_cached(key, path)
            .and_then(|bytes| Ok(ImageData::from_bytes(key, bytes)?));
        match loaded {
            Ok(data) => {
                self.resources.add_image(key, data);
                Ok(())
            }
            Err(e) if self.options.allow_missing_images => {
                self.trace.warn("Images", format!("{}: {}, drawing a placeholder", key, e));
                self.resources
                    .add_image(key, ImageData::placeholder(key, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Deliver the outcome of a remote fetch registered during load or binding
    pub fn complete_remote_request(&mut self, id: RequestId, outcome: RemoteOutcome) -> Result<bool> {
        self.stage.check_not_disposed()?;
        self.remote.complete(
            id,
            outcome,
            &mut self.resources,
            self.options.conformance,
            &mut self.trace,
        )
    }

    /// Resolve a font against the document's resources, recording
    /// substitutions and fallbacks in the trace log
    pub fn resolve_font(&mut self, font: &mut Font, create: bool) -> Option<FontMatch> {
        let found = self
            .font_matcher
            .get_font(font, self.resources.fonts_mut(), create);
        if let Some(matched) = &found {
            match matched.outcome {
                MatchOutcome::Exact => {}
                MatchOutcome::Substituted { .. } => self.trace.record(
                    TraceLevel::Warning,
                    "Fonts",
                    format!("{} substituted by {}", font, matched.resource.full_name()),
                ),
                MatchOutcome::Fallback => self.trace.record(
                    TraceLevel::Error,
                    "Fonts",
                    format!("{} not found, fell back to {}", font, matched.resource.full_name()),
                ),
            }
        }
        found
    }

    fn load_additions(&mut self) -> Result<()> {
        let base = self.loaded_source.clone();
        let load_type = if base.is_some() { LoadType::File } else { LoadType::Code };
        for i in 0..self.additions.len() {
            let addition = self.additions[i].clone();
            let loaded = self.load_resource(
                ResourceType::Attachment,
                &addition.source,
                load_type,
                base.as_deref(),
                None,
                addition.description.clone(),
            );
            match loaded {
                Ok(key) => self.additions[i].resource_key = Some(key),
                Err(e) => self.tolerate("Load", format!("addition '{}'", addition.name), e)?,
            }
        }
        Ok(())
    }

    fn load_data_sources(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for source in self.data_sources.sources_mut() {
            match source.load() {
                Ok(()) => self
                    .trace
                    .add(TraceLevel::Debug, "Load", format!("data source '{}' loaded", source.id())),
                Err(e) => failures.push((source.id().to_string(), GenerationError::from(e))),
            }
        }
        for (id, e) in failures {
            self.tolerate("Load", format!("data source '{}'", id), e)?;
        }
        Ok(())
    }

    /// Styles hold no external content; their fonts resolve at layout
    fn load_styles(&mut self) {
        for style in self.styles.iter() {
            self.trace.add(TraceLevel::Debug, "Load", format!("style '{}' loaded", style.name()));
        }
    }

    // -------------------------------------------------------------------------
    // Trace log appendix
    // -------------------------------------------------------------------------

    /// Lay out the collected trace entries as a document of their own
    fn trace_appendix(&self) -> Result<LayoutDocument> {
        let entries: Vec<BindingValue> = self
            .trace
            .entries()
            .iter()
            .map(|e| BindingValue::from(e.to_string()))
            .collect();

        let mut options = self.options.clone();
        options.append_trace_log = false;
        options.conformance = ConformanceMode::Lax;
        let mut log = Document::with_options(options);
        log.add_data_source(InlineDataSource::new("log", BindingValue::Sequence(entries)));
        log.add_page(
            ComponentBuilder::page()
                .outline("Generation log")
                .child(ComponentBuilder::label("Generation log"))
                .child(ComponentBuilder::template(
                    TemplateSpec::repeating(ComponentBuilder::bound_label(BindingPath::current()))
                        .with_data_source("log"),
                )),
        )?;
        log.initialize_and_load()?;
        log.data_bind()?;
        log.layout()
    }
}

fn file_name_of(source: &str) -> String {
    source
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(source)
        .to_string()
}

fn remote_callback(
    resource_type: ResourceType,
    key: String,
    source: &str,
    description: Option<String>,
    allow_missing_images: bool,
) -> crate::remote::RemoteCallback {
    let file_name = file_name_of(source);
    Box::new(move |resources: &mut SharedResources, outcome: RemoteOutcome| -> Result<()> {
        match (resource_type, outcome) {
            (ResourceType::Image, Ok(bytes)) => {
                let data = ImageData::from_bytes(key.clone(), bytes)?;
                resources.add_image(key, data);
                Ok(())
            }
            (ResourceType::Image, Err(reason)) if allow_missing_images => {
                tracing::warn!(key = %key, reason = %reason, "remote image missing, drawing a placeholder");
                let placeholder = ImageData::placeholder(key.clone(), PLACEHOLDER_SIZE, PLACEHOLDER_SIZE);
                resources.add_image(key, placeholder);
                Ok(())
            }
            (ResourceType::Attachment, Ok(bytes)) => {
                let mut data = AttachmentData::new(file_name, bytes);
                if let Some(description) = description {
                    data = data.with_description(description);
                }
                resources.add_attachment(key, data);
                Ok(())
            }
            (_, Err(reason)) => Err(GenerationError::Reference(format!("{}: {}", key, reason))),
            (ResourceType::Font, Ok(_)) => Err(GenerationError::NotImplemented(format!(
                "loading remote font files ({})",
                key
            ))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> EventHandler {
        let log = Rc::clone(log);
        Rc::new(move |args: &mut EventArgs<'_>| -> Result<()> {
            log.borrow_mut().push(format!("{}:{:?}", tag, args.event));
            Ok(())
        })
    }

    #[test]
    fn test_stage_order_is_enforced() {
        let mut doc = Document::new();
        assert!(matches!(doc.load(), Err(GenerationError::Stage(_))));
        assert!(matches!(doc.data_bind(), Err(GenerationError::Stage(_))));
        doc.init().unwrap();
        assert!(matches!(doc.init(), Err(GenerationError::Stage(_))));
        doc.load().unwrap();
        doc.data_bind().unwrap();
        doc.data_bind().unwrap();
        doc.dispose().unwrap();
        assert!(doc.data_bind().unwrap_err().to_string().contains("has been disposed"));
    }

    #[test]
    fn test_load_visits_data_sources_before_styles() {
        let mut options = GenerationOptions::default();
        options.trace_level = TraceLevel::Debug;
        let mut doc = Document::with_options(options);
        doc.add_style(Style::new("heading"));
        doc.add_data_source(InlineDataSource::new("rows", vec![1, 2]));
        doc.initialize_and_load().unwrap();

        let loaded: Vec<&str> = doc
            .trace()
            .entries()
            .iter()
            .filter(|e| e.category == "Load")
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(loaded, vec!["data source 'rows' loaded", "style 'heading' loaded"]);
    }

    #[test]
    fn test_events_fire_per_stage() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut doc = Document::new();
        doc.add_page(
            ComponentBuilder::page()
                .on(ComponentEvent::Init, recorder(&log, "page"))
                .on(ComponentEvent::Loaded, recorder(&log, "page"))
                .on(ComponentEvent::DataBinding, recorder(&log, "page"))
                .on(ComponentEvent::DataBound, recorder(&log, "page"))
                .on(ComponentEvent::Disposed, recorder(&log, "page")),
        )
        .unwrap();

        doc.initialize_and_load().unwrap();
        doc.data_bind().unwrap();
        doc.dispose().unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["page:Init", "page:Loaded", "page:DataBinding", "page:DataBound", "page:Disposed"]
        );
    }

    #[test]
    fn test_lax_binding_failure_is_logged() {
        let failing: EventHandler = Rc::new(|_args: &mut EventArgs<'_>| -> Result<()> {
            Err(GenerationError::Reference("lookup failed".into()))
        });
        let mut doc = Document::new();
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("x").on(ComponentEvent::DataBinding, failing)))
            .unwrap();
        doc.initialize_and_load().unwrap();
        doc.data_bind().unwrap();
        assert_eq!(doc.trace().entries_at(TraceLevel::Error).count(), 1);
    }

    #[test]
    fn test_strict_binding_failure_is_wrapped_once() {
        let failing: EventHandler = Rc::new(|_args: &mut EventArgs<'_>| -> Result<()> {
            Err(GenerationError::Reference("lookup failed".into()))
        });
        let options = GenerationOptions {
            conformance: ConformanceMode::Strict,
            ..Default::default()
        };
        let mut doc = Document::with_options(options);
        doc.add_page(
            ComponentBuilder::page().child(
                ComponentBuilder::panel()
                    .child(ComponentBuilder::label("x").named("broken").on(ComponentEvent::DataBinding, failing)),
            ),
        )
        .unwrap();
        doc.initialize_and_load().unwrap();

        match doc.data_bind() {
            Err(GenerationError::Data { component, source, .. }) => {
                assert!(component.contains("broken"));
                assert!(matches!(source.as_deref(), Some(GenerationError::Reference(_))));
            }
            other => panic!("expected a data error, got {:?}", other),
        }
    }

    #[test]
    fn test_bound_labels_and_info() {
        let mut doc = Document::new();
        doc.params_mut().set("customer", "Ada");
        doc.info_mut().set_title(BindableText::parse("{{ @customer }}").unwrap());
        let label = doc
            .add_page(ComponentBuilder::page().child(ComponentBuilder::text(
                BindableText::parse("{{ @customer }}").unwrap(),
            )))
            .unwrap();
        doc.initialize_and_load().unwrap();
        doc.data_bind().unwrap();

        assert_eq!(doc.info().title_text(), Some("Ada"));
        let label = doc.tree().children(label)[0];
        assert_eq!(doc.component(label).unwrap().text(), Some("Ada"));
    }

    #[test]
    fn test_duplicate_additions_are_structural() {
        let mut doc = Document::new();
        doc.add_addition(Addition::new("data", "a.csv"));
        doc.add_addition(Addition::new("data", "b.csv"));
        assert!(matches!(doc.init(), Err(GenerationError::Structural(_))));
    }

    #[test]
    fn test_missing_addition_by_conformance() {
        let mut lax = Document::new().with_path_mapper(RootedPathMapper::new("/definitely/not/here"));
        lax.add_addition(Addition::new("data", "missing.csv"));
        lax.initialize_and_load().unwrap();
        assert!(lax.additions()[0].resource_key().is_none());
        assert_eq!(lax.trace().entries_at(TraceLevel::Error).count(), 1);

        let options = GenerationOptions {
            conformance: ConformanceMode::Strict,
            ..Default::default()
        };
        let mut strict =
            Document::with_options(options).with_path_mapper(RootedPathMapper::new("/definitely/not/here"));
        strict.add_addition(Addition::new("data", "missing.csv"));
        strict.init().unwrap();
        assert!(strict.load().is_err());
    }

    #[test]
    fn test_missing_image_placeholder() {
        let options = GenerationOptions {
            allow_missing_images: true,
            ..Default::default()
        };
        let mut doc = Document::with_options(options).with_path_mapper(RootedPathMapper::new("/definitely/not/here"));
        doc.add_page(ComponentBuilder::page().child(ComponentBuilder::image("logo.jpg".into())))
            .unwrap();
        doc.initialize_and_load().unwrap();
        let image = doc.resources().images()[0].clone();
        assert!(image.data().is_placeholder());

        let mut strict = Document::new().with_path_mapper(RootedPathMapper::new("/definitely/not/here"));
        strict
            .add_page(ComponentBuilder::page().child(ComponentBuilder::image("logo.jpg".into())))
            .unwrap();
        strict.init().unwrap();
        assert!(matches!(strict.load(), Err(GenerationError::Resource(_))));
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("docs/readme.txt"), "readme.txt");
        assert_eq!(file_name_of("https://example.com/a/b.pdf"), "b.pdf");
        assert_eq!(file_name_of("plain"), "plain");
    }
}
