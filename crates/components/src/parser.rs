//! Document parsing
//!
//! Documents are JSON. A file may open with a processing instruction that
//! overrides generation options for that file:
//!
//! ```text
//! <?docgen parser-mode="strict" log-level="warning" append-log="true" ?>
//! { "pages": [ { "type": "page", "children": [ ... ] } ] }
//! ```
//!
//! Nodes of type `include` splice in the nodes of another file, resolved
//! against the including file. The chain of files being parsed is tracked so
//! a file that includes itself, directly or not, is rejected.

use crate::component::{BindableText, ComponentBuilder, LinkTarget, LoadType};
use crate::config::GenerationOptions;
use crate::document::{Addition, DocumentInfo};
use crate::style::Style;
use crate::template::{Template, TemplateSpec};
use crate::trace::TraceLevel;
use crate::{GenerationError, Result};
use data_binding::{
    BindingPath, BindingValue, ConformanceMode, CsvDataSource, DataBindingBehaviour, InlineDataSource,
    JsonDataSource,
};
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component as PathPart, Path, PathBuf};

// =============================================================================
// Processing instructions
// =============================================================================

/// Option overrides declared at the top of a document file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingInstructions {
    pub conformance: Option<ConformanceMode>,
    pub trace_level: Option<TraceLevel>,
    pub append_trace_log: Option<bool>,
}

impl ProcessingInstructions {
    /// Read a leading `<?docgen ... ?>` instruction, returning it with the
    /// remaining text
    pub fn parse(text: &str) -> Result<(Self, &str)> {
        let head = Regex::new(r"^\s*<\?docgen\b((?s:.*?))\?>").map_err(|e| GenerationError::Parse(e.to_string()))?;
        let Some(found) = head.captures(text) else {
            return Ok((Self::default(), text));
        };
        let (Some(whole), Some(body)) = (found.get(0), found.get(1)) else {
            return Ok((Self::default(), text));
        };

        let attribute =
            Regex::new(r#"([A-Za-z][A-Za-z-]*)\s*=\s*"([^"]*)""#).map_err(|e| GenerationError::Parse(e.to_string()))?;
        let mut instructions = Self::default();
        for capture in attribute.captures_iter(body.as_str()) {
            let (Some(key), Some(value)) = (capture.get(1), capture.get(2)) else {
                continue;
            };
            let value = value.as_str();
            match key.as_str().to_ascii_lowercase().as_str() {
                "parser-mode" => {
                    instructions.conformance = Some(
                        ConformanceMode::from_name(value)
                            .ok_or_else(|| GenerationError::Parse(format!("unknown parser mode '{}'", value)))?,
                    )
                }
                "log-level" => {
                    instructions.trace_level = Some(
                        TraceLevel::from_name(value)
                            .ok_or_else(|| GenerationError::Parse(format!("unknown log level '{}'", value)))?,
                    )
                }
                "append-log" => {
                    instructions.append_trace_log = Some(value.parse::<bool>().map_err(|_| {
                        GenerationError::Parse(format!("append-log must be true or false, not '{}'", value))
                    })?)
                }
                other => tracing::warn!(instruction = other, "unknown processing instruction attribute"),
            }
        }
        Ok((instructions, &text[whole.end()..]))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Override the matching options
    pub fn apply(&self, options: &mut GenerationOptions) {
        if let Some(conformance) = self.conformance {
            options.conformance = conformance;
        }
        if let Some(level) = self.trace_level {
            options.trace_level = level;
        }
        if let Some(append) = self.append_trace_log {
            options.append_trace_log = append;
        }
    }
}

// =============================================================================
// Reference stack
// =============================================================================

/// The files currently being parsed, outermost first
#[derive(Debug, Default)]
pub struct ReferenceStack {
    paths: Vec<PathBuf>,
}

impl ReferenceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a file. A file already being parsed is a structural error,
    /// whatever the conformance mode.
    pub fn push(&mut self, path: &Path) -> Result<()> {
        let path = normalize(path);
        if self.paths.contains(&path) {
            let chain: Vec<String> = self
                .paths
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.display().to_string())
                .collect();
            return Err(GenerationError::structural(format!(
                "circular reference: {}",
                chain.join(" -> ")
            )));
        }
        self.paths.push(path);
        Ok(())
    }

    /// Leave a file; it must be the innermost one entered
    pub fn pop(&mut self, path: &Path) -> Result<()> {
        let path = normalize(path);
        match self.paths.last() {
            Some(top) if *top == path => {
                self.paths.pop();
                Ok(())
            }
            Some(top) => Err(GenerationError::structural(format!(
                "reference stack unbalanced: leaving {} while {} is innermost",
                path.display(),
                top.display()
            ))),
            None => Err(GenerationError::structural(format!(
                "reference stack unbalanced: leaving {} with nothing entered",
                path.display()
            ))),
        }
    }

    pub fn current(&self) -> Option<&Path> {
        self.paths.last().map(PathBuf::as_path)
    }

    pub fn depth(&self) -> usize {
        self.paths.len()
    }
}

/// Lexical normalization: the absolute form with `.` and `..` removed
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|d| d.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for part in absolute.components() {
        match part {
            PathPart::CurDir => {}
            PathPart::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// Parser output
// =============================================================================

#[derive(Debug)]
pub enum ParsedDataSource {
    Inline(InlineDataSource),
    Json(JsonDataSource),
    Csv(CsvDataSource),
}

/// Everything read from a document file, ready to build a document from
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub source: Option<PathBuf>,
    pub instructions: ProcessingInstructions,
    pub info: DocumentInfo,
    pub params: Vec<(String, BindingValue)>,
    pub data_sources: Vec<ParsedDataSource>,
    pub styles: Vec<Style>,
    pub additions: Vec<Addition>,
    pub pages: Vec<ComponentBuilder>,
}

pub trait ComponentParser {
    /// Parse document text. `source` is the file it came from, used to
    /// resolve relative references.
    fn parse_str(&self, text: &str, source: Option<&Path>) -> Result<ParsedDocument>;

    fn parse_file(&self, path: &Path) -> Result<ParsedDocument> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GenerationError::Reference(format!("{}: {}", path.display(), e)))?;
        self.parse_str(&text, Some(path))
    }

    fn parse_reader(&self, reader: &mut dyn Read, source: Option<&Path>) -> Result<ParsedDocument> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text, source)
    }
}

// =============================================================================
// JSON format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DocumentSpec {
    info: InfoSpec,
    params: BTreeMap<String, JsonValue>,
    data_sources: Vec<DataSourceSpec>,
    additions: Vec<AdditionSpec>,
    styles: Vec<StyleSpec>,
    pages: Vec<JsonValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoSpec {
    title: Option<String>,
    author: Option<String>,
    subject: Option<String>,
    keywords: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DataSourceSpec {
    Inline {
        id: String,
        value: JsonValue,
    },
    Json {
        id: String,
        path: Option<String>,
        text: Option<String>,
    },
    Csv {
        id: String,
        path: Option<String>,
        text: Option<String>,
        delimiter: Option<char>,
        #[serde(default = "default_header")]
        header: bool,
    },
}

fn default_header() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AdditionSpec {
    name: String,
    source: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StyleSpec {
    name: String,
    font: Option<String>,
    size: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NodeSpec {
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
    name: Option<String>,
    hidden: bool,
    outline: Option<String>,
    style: Option<String>,
    text: Option<String>,
    source: Option<String>,
    description: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
    uri: Option<String>,
    destination: Option<String>,
    file: Option<String>,
    behaviour: Option<String>,
    data_source: Option<String>,
    select: Option<String>,
    path: Option<String>,
    items: Vec<JsonValue>,
    children: Vec<JsonValue>,
}

/// Parser for the JSON document format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonComponentParser {
    conformance: ConformanceMode,
}

/// State of one parse: the file chain and the mode in force
struct ParseRun {
    conformance: ConformanceMode,
    references: ReferenceStack,
}

impl JsonComponentParser {
    pub fn new(conformance: ConformanceMode) -> Self {
        Self { conformance }
    }
}

impl ComponentParser for JsonComponentParser {
    fn parse_str(&self, text: &str, source: Option<&Path>) -> Result<ParsedDocument> {
        let (instructions, body) = ProcessingInstructions::parse(text)?;
        let mut run = ParseRun {
            conformance: instructions.conformance.unwrap_or(self.conformance),
            references: ReferenceStack::new(),
        };
        if let Some(path) = source {
            run.references.push(path)?;
        }

        let spec: DocumentSpec = serde_json::from_str(body).map_err(|e| parse_error(source, e))?;
        let mut parsed = run.document(spec, source)?;
        parsed.instructions = instructions;
        parsed.source = source.map(Path::to_path_buf);

        if let Some(path) = source {
            run.references.pop(path)?;
        }
        tracing::debug!(
            source = ?source,
            pages = parsed.pages.len(),
            "parsed document"
        );
        Ok(parsed)
    }
}

fn parse_error(source: Option<&Path>, err: impl std::fmt::Display) -> GenerationError {
    match source {
        Some(path) => GenerationError::Parse(format!("{}: {}", path.display(), err)),
        None => GenerationError::Parse(err.to_string()),
    }
}

fn bindable(text: &str) -> Result<BindableText> {
    Ok(BindableText::parse(text)?)
}

impl ParseRun {
    /// Lax skips what failed with a warning; Strict fails
    fn tolerate<T>(&self, outcome: Result<T>) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.always_propagates() || self.conformance == ConformanceMode::Strict => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable content");
                Ok(None)
            }
        }
    }

    fn resolve(&self, path: &str, base: Option<&Path>) -> PathBuf {
        let candidate = Path::new(path);
        match base.and_then(Path::parent) {
            Some(dir) if candidate.is_relative() => dir.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    fn document(&mut self, spec: DocumentSpec, source: Option<&Path>) -> Result<ParsedDocument> {
        let mut parsed = ParsedDocument::default();

        let mut info = DocumentInfo::default();
        let fields = [
            (spec.info.title, DocumentInfo::set_title as fn(&mut DocumentInfo, BindableText)),
            (spec.info.author, DocumentInfo::set_author),
            (spec.info.subject, DocumentInfo::set_subject),
            (spec.info.keywords, DocumentInfo::set_keywords),
        ];
        for (value, set) in fields {
            if let Some(value) = value {
                set(&mut info, bindable(&value)?);
            }
        }
        parsed.info = info;

        parsed.params = spec
            .params
            .into_iter()
            .map(|(name, value)| (name, BindingValue::from(value)))
            .collect();

        for source_spec in spec.data_sources {
            parsed.data_sources.push(self.data_source(source_spec, source)?);
        }

        parsed.additions = spec
            .additions
            .into_iter()
            .map(|a| {
                let addition = Addition::new(a.name, a.source);
                match a.description {
                    Some(d) => addition.with_description(d),
                    None => addition,
                }
            })
            .collect();

        for style in spec.styles {
            let mut parsed_style = Style::new(style.name);
            if let Some(font) = style.font {
                parsed_style = parsed_style.with_font(bindable(&font)?);
            }
            if let Some(size) = style.size {
                parsed_style = parsed_style.with_font_size(size);
            }
            parsed.styles.push(parsed_style);
        }

        parsed.pages = self.nodes(spec.pages, source)?;
        Ok(parsed)
    }

    fn data_source(&self, spec: DataSourceSpec, base: Option<&Path>) -> Result<ParsedDataSource> {
        let missing = |id: &str| GenerationError::Parse(format!("data source '{}' needs a path or text", id));
        Ok(match spec {
            DataSourceSpec::Inline { id, value } => ParsedDataSource::Inline(InlineDataSource::new(id, value)),
            DataSourceSpec::Json { id, path, text } => ParsedDataSource::Json(match (path, text) {
                (Some(path), _) => JsonDataSource::from_file(id, self.resolve(&path, base)),
                (None, Some(text)) => JsonDataSource::from_text(id, text),
                (None, None) => return Err(missing(&id)),
            }),
            DataSourceSpec::Csv {
                id,
                path,
                text,
                delimiter,
                header,
            } => {
                let source = match (path, text) {
                    (Some(path), _) => CsvDataSource::from_file(id, self.resolve(&path, base)),
                    (None, Some(text)) => CsvDataSource::from_text(id, text),
                    (None, None) => return Err(missing(&id)),
                };
                let delimiter = match delimiter {
                    Some(c) => u8::try_from(c)
                        .map_err(|_| GenerationError::Parse(format!("delimiter '{}' is not a single byte", c)))?,
                    None => b',',
                };
                ParsedDataSource::Csv(source.with_delimiter(delimiter).with_header(header))
            }
        })
    }

    fn nodes(&mut self, values: Vec<JsonValue>, source: Option<&Path>) -> Result<Vec<ComponentBuilder>> {
        let mut out = Vec::new();
        for value in values {
            let outcome = self.node(value, source);
            if let Some(builders) = self.tolerate(outcome)? {
                out.extend(builders);
            }
        }
        Ok(out)
    }

    /// One node; an include yields every node of the included file
    fn node(&mut self, value: JsonValue, source: Option<&Path>) -> Result<Vec<ComponentBuilder>> {
        let mut spec: NodeSpec = serde_json::from_value(value).map_err(|e| parse_error(source, e))?;
        if spec.kind == "include" {
            let path = spec
                .path
                .ok_or_else(|| parse_error(source, "an include needs a path"))?;
            let path = self.resolve(&path, source);
            return self.include(&path);
        }

        let text = |field: Option<String>, what: &str| {
            field.ok_or_else(|| parse_error(source, format!("a {} node needs '{}'", spec.kind, what)))
        };
        let mut builder = match spec.kind.as_str() {
            "page" => ComponentBuilder::page(),
            "panel" => ComponentBuilder::panel(),
            "table" => ComponentBuilder::table(),
            "row" => ComponentBuilder::row(),
            "cell" => ComponentBuilder::cell(),
            "label" => ComponentBuilder::text(bindable(&text(spec.text.clone(), "text")?)?),
            "image" => {
                let image = ComponentBuilder::image(bindable(&text(spec.source.clone(), "source")?)?);
                match (spec.width, spec.height) {
                    (Some(w), Some(h)) => image.sized(w, h),
                    _ => image,
                }
            }
            "attachment" => {
                let attachment = ComponentBuilder::attachment(bindable(&text(spec.source.clone(), "source")?)?);
                match spec.description.clone() {
                    Some(d) => attachment.described(d),
                    None => attachment,
                }
            }
            "link" => match (spec.uri.clone(), spec.destination.clone(), spec.file.clone()) {
                (Some(uri), _, _) => ComponentBuilder::link_to_uri(bindable(&uri)?),
                (None, Some(name), _) => ComponentBuilder::link(LinkTarget::Destination(name)),
                (None, None, Some(name)) => ComponentBuilder::link(LinkTarget::File(name)),
                _ => return Err(parse_error(source, "a link needs 'uri', 'destination' or 'file'")),
            },
            "template" => {
                let items = self.nodes(std::mem::take(&mut spec.items), source)?;
                ComponentBuilder::template(self.template(&spec, items)?)
            }
            other => return Err(parse_error(source, format!("unknown node type '{}'", other))),
        };

        builder = builder.loaded_from(LoadType::File, source.map(Path::to_path_buf));
        if let Some(id) = spec.id {
            builder = builder.with_id(id);
        }
        if let Some(name) = spec.name {
            builder = builder.named(name);
        }
        if spec.hidden {
            builder = builder.hidden();
        }
        if let Some(title) = spec.outline {
            builder = builder.outline(title);
        }
        if let Some(style) = spec.style {
            builder = builder.styled(style);
        }
        if !spec.children.is_empty() {
            let children = self.nodes(spec.children, source)?;
            builder = builder.children(children);
        }
        Ok(vec![builder])
    }

    fn template(&self, spec: &NodeSpec, items: Vec<ComponentBuilder>) -> Result<TemplateSpec> {
        let behaviour = match spec.behaviour.as_deref().unwrap_or("repeating") {
            "repeating" => DataBindingBehaviour::REPEATING,
            "expanding" => DataBindingBehaviour::EXPANDING,
            "single" => DataBindingBehaviour::SINGLE,
            other => return Err(GenerationError::Parse(format!("unknown template behaviour '{}'", other))),
        };
        let mut template = TemplateSpec::repeating(Template::new(items)).with_behaviour(behaviour);
        if let Some(id) = &spec.data_source {
            template = template.with_data_source(id.clone());
        }
        if let Some(select) = &spec.select {
            template = template.with_selector(BindingPath::parse(select)?);
        }
        Ok(template)
    }

    fn include(&mut self, path: &Path) -> Result<Vec<ComponentBuilder>> {
        self.references.push(path)?;
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| GenerationError::Reference(format!("{}: {}", path.display(), e)))
            .and_then(|text| {
                let (instructions, body) = ProcessingInstructions::parse(&text)?;
                if !instructions.is_empty() {
                    tracing::debug!(path = %path.display(), "processing instructions of included files are ignored");
                }
                serde_json::from_str::<JsonValue>(body).map_err(|e| parse_error(Some(path), e))
            });
        let nodes = loaded.and_then(|value| match value {
            JsonValue::Array(values) => self.nodes(values, Some(path)),
            value => self.node(value, Some(path)),
        });
        // Leave the file whatever happened so the chain stays balanced
        self.references.pop(path)?;
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_instructions() {
        let text = "<?docgen parser-mode=\"strict\" log-level=\"warning\" ?>\n{\"pages\": []}";
        let (instructions, rest) = ProcessingInstructions::parse(text).unwrap();
        assert_eq!(instructions.conformance, Some(ConformanceMode::Strict));
        assert_eq!(instructions.trace_level, Some(TraceLevel::Warning));
        assert_eq!(rest.trim(), "{\"pages\": []}");

        let mut options = GenerationOptions::default();
        instructions.apply(&mut options);
        assert_eq!(options.conformance, ConformanceMode::Strict);

        let (none, rest) = ProcessingInstructions::parse("{}").unwrap();
        assert!(none.is_empty());
        assert_eq!(rest, "{}");

        assert!(ProcessingInstructions::parse("<?docgen parser-mode=\"sloppy\"?>{}").is_err());
    }

    #[test]
    fn test_reference_stack() {
        let mut stack = ReferenceStack::new();
        stack.push(Path::new("/docs/a.json")).unwrap();
        stack.push(Path::new("/docs/parts/../b.json")).unwrap();
        assert!(matches!(
            stack.push(Path::new("/docs/./a.json")),
            Err(GenerationError::Structural(_))
        ));
        assert!(matches!(
            stack.pop(Path::new("/docs/a.json")),
            Err(GenerationError::Structural(_))
        ));
        stack.pop(Path::new("/docs/b.json")).unwrap();
        stack.pop(Path::new("/docs/a.json")).unwrap();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_parse_nodes() {
        let parser = JsonComponentParser::default();
        let parsed = parser
            .parse_str(
                r#"{
                    "info": { "title": "{{ @name }}" },
                    "params": { "name": "Quarterly" },
                    "dataSources": [ { "type": "inline", "id": "rows", "value": [1, 2] } ],
                    "styles": [ { "name": "heading", "font": "Helvetica,Bold", "size": 16 } ],
                    "pages": [ { "type": "page", "outline": "One", "children": [
                        { "type": "label", "text": "Hello", "style": "heading" },
                        { "type": "template", "dataSource": "rows", "items": [ { "type": "label", "text": "{{ . }}" } ] }
                    ] } ]
                }"#,
                None,
            )
            .unwrap();

        assert_eq!(parsed.pages.len(), 1);
        assert_eq!(parsed.params.len(), 1);
        assert_eq!(parsed.data_sources.len(), 1);
        assert_eq!(parsed.styles[0].font_size(), Some(16.0));
        assert!(parsed.info.title.as_ref().is_some_and(|t| t.text.is_bound()));
    }

    #[test]
    fn test_unknown_node_by_conformance() {
        let text = r#"{ "pages": [ { "type": "page" }, { "type": "hologram" } ] }"#;
        let lax = JsonComponentParser::new(ConformanceMode::Lax).parse_str(text, None).unwrap();
        assert_eq!(lax.pages.len(), 1);

        let strict = JsonComponentParser::new(ConformanceMode::Strict).parse_str(text, None);
        assert!(matches!(strict, Err(GenerationError::Parse(_))));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let parsed = JsonComponentParser::default().parse_str("{ pages: ", None);
        assert!(matches!(parsed, Err(GenerationError::Parse(_))));
    }
}
