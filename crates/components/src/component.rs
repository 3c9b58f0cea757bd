//! Component nodes and the builders used to create them

use crate::events::{ComponentEvent, EventHandler, EventTable};
use crate::template::TemplateSpec;
use crate::NodeId;
use data_binding::{BindingPath, DataContext};
use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};

/// Text that is either fixed or read from the data context when bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindableText {
    Literal(String),
    Bound(BindingPath),
}

impl BindableText {
    /// `{{ path }}` binds; anything else is literal
    pub fn parse(text: &str) -> data_binding::Result<Self> {
        let trimmed = text.trim();
        match trimmed.strip_prefix("{{").and_then(|t| t.strip_suffix("}}")) {
            Some(expr) => Ok(BindableText::Bound(BindingPath::parse(expr)?)),
            None => Ok(BindableText::Literal(text.to_string())),
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        BindableText::Literal(text.into())
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, BindableText::Bound(_))
    }

    /// The literal text, or the bound value's display string
    pub fn resolve(&self, context: &DataContext) -> String {
        match self {
            BindableText::Literal(text) => text.clone(),
            BindableText::Bound(path) => path.evaluate(context).to_display_string(),
        }
    }

    /// The text without a context; bound text has nothing to show yet
    pub fn literal_text(&self) -> Option<&str> {
        match self {
            BindableText::Literal(text) => Some(text),
            BindableText::Bound(_) => None,
        }
    }
}

impl From<&str> for BindableText {
    fn from(text: &str) -> Self {
        BindableText::Literal(text.to_string())
    }
}

/// Text content, resolved during binding
#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    pub text: BindableText,
    pub resolved: Option<String>,
}

impl TextContent {
    pub fn new(text: BindableText) -> Self {
        Self { text, resolved: None }
    }

    /// The text to lay out
    pub fn display(&self) -> &str {
        self.resolved
            .as_deref()
            .or_else(|| self.text.literal_text())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// A named component in this document
    Destination(String),
    Uri(TextContent),
    /// A document addition, by name
    File(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageContent {
    pub source: TextContent,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Key of the shared image once the source has been loaded
    pub resource_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentContent {
    pub source: TextContent,
    pub description: Option<String>,
    pub resource_key: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ComponentKind {
    Document,
    Page,
    Panel,
    Table,
    TableRow,
    TableCell,
    Label(TextContent),
    Link(LinkTarget),
    Attachment(AttachmentContent),
    Image(ImageContent),
    Template(TemplateSpec),
}

impl ComponentKind {
    /// Whether the kind holds child components
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ComponentKind::Document
                | ComponentKind::Page
                | ComponentKind::Panel
                | ComponentKind::Table
                | ComponentKind::TableRow
                | ComponentKind::TableCell
                | ComponentKind::Link(_)
        )
    }

    /// Prefix of generated ids (`Pg1`, `Lbl3`)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ComponentKind::Document => "Doc",
            ComponentKind::Page => "Pg",
            ComponentKind::Panel => "Pnl",
            ComponentKind::Table => "Tbl",
            ComponentKind::TableRow => "Row",
            ComponentKind::TableCell => "Cell",
            ComponentKind::Label(_) => "Lbl",
            ComponentKind::Link(_) => "Lnk",
            ComponentKind::Attachment(_) => "Att",
            ComponentKind::Image(_) => "Img",
            ComponentKind::Template(_) => "Tpl",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Document => "Document",
            ComponentKind::Page => "Page",
            ComponentKind::Panel => "Panel",
            ComponentKind::Table => "Table",
            ComponentKind::TableRow => "TableRow",
            ComponentKind::TableCell => "TableCell",
            ComponentKind::Label(_) => "Label",
            ComponentKind::Link(_) => "Link",
            ComponentKind::Attachment(_) => "Attachment",
            ComponentKind::Image(_) => "Image",
            ComponentKind::Template(_) => "Template",
        }
    }
}

/// How a component came to be in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadType {
    /// Built in code
    #[default]
    Code,
    /// Read by a parser from a file
    File,
    /// Instantiated by a template while binding
    Template,
}

/// A node of the component tree
#[derive(Debug)]
pub struct Component {
    pub(crate) node_id: NodeId,
    pub(crate) id: String,
    pub(crate) kind: ComponentKind,
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) visible: bool,
    pub(crate) outline_title: Option<String>,
    pub(crate) style: Option<String>,
    pub(crate) load_type: LoadType,
    pub(crate) loaded_source: Option<PathBuf>,
    pub(crate) template_owner: Option<NodeId>,
    pub(crate) bound_items: Vec<NodeId>,
    pub(crate) events: Option<Box<EventTable>>,
    pub(crate) page_cache: Cell<Option<NodeId>>,
}

impl Component {
    pub(crate) fn new(id: String, builder: &ComponentBuilder) -> Self {
        Self {
            node_id: NodeId::new(),
            id,
            kind: builder.kind.clone(),
            name: builder.name.clone(),
            parent: None,
            children: Vec::new(),
            visible: builder.visible,
            outline_title: builder.outline_title.clone(),
            style: builder.style.clone(),
            load_type: builder.load_type,
            loaded_source: builder.loaded_source.clone(),
            template_owner: None,
            bound_items: Vec::new(),
            events: builder.events.clone().map(Box::new),
            page_cache: Cell::new(None),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Document-unique id, explicit or generated from the kind
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ComponentKind {
        &mut self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn outline_title(&self) -> Option<&str> {
        self.outline_title.as_deref().filter(|t| !t.is_empty())
    }

    pub fn set_outline_title(&mut self, title: Option<String>) {
        self.outline_title = title;
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn load_type(&self) -> LoadType {
        self.load_type
    }

    pub fn loaded_source(&self) -> Option<&Path> {
        self.loaded_source.as_deref()
    }

    /// The template that inserted this component while binding
    pub fn template_owner(&self) -> Option<NodeId> {
        self.template_owner
    }

    /// Components this template inserted on its last bind
    pub fn bound_items(&self) -> &[NodeId] {
        &self.bound_items
    }

    /// Display text of a label
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Label(content) => Some(content.display()),
            _ => None,
        }
    }

    pub fn on(&mut self, event: ComponentEvent, handler: EventHandler) {
        self.events.get_or_insert_with(Default::default).add(event, handler);
    }

    pub(crate) fn handlers(&self, event: ComponentEvent) -> Vec<EventHandler> {
        self.events
            .as_ref()
            .map(|table| table.handlers(event))
            .unwrap_or_default()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} '{}' ({})", self.kind.name(), name, self.id),
            None => write!(f, "{} {}", self.kind.name(), self.id),
        }
    }
}

/// Declarative description of a component subtree, instantiated into the tree
/// directly or once per item by a template
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    pub(crate) kind: ComponentKind,
    pub(crate) id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) visible: bool,
    pub(crate) outline_title: Option<String>,
    pub(crate) style: Option<String>,
    pub(crate) load_type: LoadType,
    pub(crate) loaded_source: Option<PathBuf>,
    pub(crate) events: Option<EventTable>,
    pub(crate) children: Vec<ComponentBuilder>,
}

impl ComponentBuilder {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            id: None,
            name: None,
            visible: true,
            outline_title: None,
            style: None,
            load_type: LoadType::Code,
            loaded_source: None,
            events: None,
            children: Vec::new(),
        }
    }

    pub fn page() -> Self {
        Self::new(ComponentKind::Page)
    }

    pub fn panel() -> Self {
        Self::new(ComponentKind::Panel)
    }

    pub fn table() -> Self {
        Self::new(ComponentKind::Table)
    }

    pub fn row() -> Self {
        Self::new(ComponentKind::TableRow)
    }

    pub fn cell() -> Self {
        Self::new(ComponentKind::TableCell)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Label(TextContent::new(BindableText::Literal(text.into()))))
    }

    /// A label showing the value at `path`
    pub fn bound_label(path: BindingPath) -> Self {
        Self::new(ComponentKind::Label(TextContent::new(BindableText::Bound(path))))
    }

    pub fn text(text: BindableText) -> Self {
        Self::new(ComponentKind::Label(TextContent::new(text)))
    }

    pub fn link(target: LinkTarget) -> Self {
        Self::new(ComponentKind::Link(target))
    }

    pub fn link_to_uri(uri: BindableText) -> Self {
        Self::link(LinkTarget::Uri(TextContent::new(uri)))
    }

    pub fn image(source: BindableText) -> Self {
        Self::new(ComponentKind::Image(ImageContent {
            source: TextContent::new(source),
            width: None,
            height: None,
            resource_key: None,
        }))
    }

    pub fn attachment(source: BindableText) -> Self {
        Self::new(ComponentKind::Attachment(AttachmentContent {
            source: TextContent::new(source),
            description: None,
            resource_key: None,
        }))
    }

    pub fn template(spec: TemplateSpec) -> Self {
        Self::new(ComponentKind::Template(spec))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn outline(mut self, title: impl Into<String>) -> Self {
        self.outline_title = Some(title.into());
        self
    }

    pub fn styled(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn loaded_from(mut self, load_type: LoadType, source: Option<PathBuf>) -> Self {
        self.load_type = load_type;
        self.loaded_source = source;
        self
    }

    /// Display size of an image, in points. Ignored for other kinds.
    pub fn sized(mut self, width: f64, height: f64) -> Self {
        if let ComponentKind::Image(image) = &mut self.kind {
            image.width = Some(width);
            image.height = Some(height);
        }
        self
    }

    /// Description of an attachment. Ignored for other kinds.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        if let ComponentKind::Attachment(attachment) = &mut self.kind {
            attachment.description = Some(description.into());
        }
        self
    }

    pub fn on(mut self, event: ComponentEvent, handler: EventHandler) -> Self {
        self.events.get_or_insert_with(Default::default).add(event, handler);
        self
    }

    pub fn child(mut self, child: ComponentBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = ComponentBuilder>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_binding::BindingValue;
    use std::collections::BTreeMap;

    #[test]
    fn test_bindable_text_parse() {
        assert_eq!(BindableText::parse("Hello").unwrap(), BindableText::literal("Hello"));
        assert!(BindableText::parse("{{ customer.name }}").unwrap().is_bound());
        assert!(BindableText::parse("{{ $nope }}").is_err());
    }

    #[test]
    fn test_bindable_text_resolve() {
        let mut ctx = DataContext::default();
        let mut row = BTreeMap::new();
        row.insert("name".to_string(), BindingValue::from("Ada"));
        ctx.data_stack_mut().push(BindingValue::Map(row), None);

        let text = BindableText::parse("{{name}}").unwrap();
        assert_eq!(text.resolve(&ctx), "Ada");
        assert_eq!(BindableText::literal("x").resolve(&ctx), "x");
    }

    #[test]
    fn test_container_kinds() {
        assert!(ComponentKind::Panel.is_container());
        assert!(!ComponentBuilder::label("x").kind().is_container());
        assert_eq!(ComponentBuilder::label("x").kind().id_prefix(), "Lbl");
    }
}
