//! Component model and document generation pipeline
//!
//! This crate provides:
//! - The component tree: pages, panels, tables, labels, links, images,
//!   attachments and templates
//! - The staged pipeline: init, load, data bind, layout, render, dispose
//! - Template expansion over data sources
//! - Fonts and shared resources resolved per document
//! - Outlines, named destinations, annotations and embedded files
//! - A flow layout engine and PDF output
//! - The JSON document format with includes and processing instructions

pub mod artefacts;
pub mod component;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod layout;
pub mod node_id;
pub mod output;
pub mod parser;
pub mod paths;
pub mod perf;
pub mod remote;
pub mod stage;
pub mod style;
pub mod template;
pub mod trace;
pub mod tree;

pub use artefacts::{
    Annotation, AnnotationAction, ArtefactCatalog, ArtefactHandle, ArtefactKind, ArtefactRegistrationSet,
    EmbeddedEntry, NamedDestination, OutlineEntry, PagePosition, PageRegion,
};
pub use component::{
    AttachmentContent, BindableText, Component, ComponentBuilder, ComponentKind, ImageContent, LinkTarget,
    LoadType, TextContent,
};
pub use config::{GenerationOptions, PageSize};
pub use document::{Addition, Document, DocumentInfo, OutputFormat};
pub use error::{GenerationError, Result};
pub use events::{ComponentEvent, EventArgs, EventHandler, EventTable};
pub use layout::{
    FlowLayoutEngine, LayoutDocument, LayoutEngine, LayoutInfo, LayoutPage, PageItem, PageNumber,
};
pub use node_id::NodeId;
pub use parser::{
    ComponentParser, JsonComponentParser, ParsedDataSource, ParsedDocument, ProcessingInstructions,
    ReferenceStack,
};
pub use paths::{MappedPath, PathMapper, RootedPathMapper};
pub use perf::{PerfMonitor, PerfTimer, StageTiming};
pub use remote::{RemoteCallback, RemoteFileRequest, RemoteOutcome, RemoteRequestQueue, RequestId};
pub use stage::GenerationStage;
pub use style::{Style, StyleCollection};
pub use template::{RepeatingTemplate, Template, TemplateSource, TemplateSpec};
pub use trace::{TraceEntry, TraceLevel, TraceLog};
pub use tree::ComponentTree;
