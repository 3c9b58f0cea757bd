//! Layout-time artefacts: outlines, named destinations, annotations and
//! embedded files
//!
//! Every registration opens an entry in the catalog and hands back a handle.
//! Handles must be closed innermost first; closing anything other than the
//! most recently opened entry is a structural error. An outline's parent is
//! the outline that was open when it was registered, so nesting in the
//! component tree becomes nesting in the outline tree.

use crate::{GenerationError, Result};
use resources::AttachmentResource;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtefactKind {
    Outlines,
    Names,
    Annotations,
    EmbeddedFiles,
}

/// Opaque reference to a registered artefact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtefactHandle {
    kind: ArtefactKind,
    index: usize,
}

impl ArtefactHandle {
    pub fn kind(&self) -> ArtefactKind {
        self.kind
    }
}

/// A position on a laid out page, in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePosition {
    /// Zero-based page index
    pub page: usize,
    pub y: f64,
}

/// A rectangle on a laid out page: `[x1, y1, x2, y2]` in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRegion {
    pub page: usize,
    pub rect: [f64; 4],
}

#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub title: String,
    pub target: PagePosition,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct NamedDestination {
    pub name: String,
    pub target: PagePosition,
}

#[derive(Debug, Clone)]
pub enum AnnotationAction {
    Uri(String),
    /// Jump to a named destination
    Destination(String),
    /// Open an embedded file
    Launch(Rc<AttachmentResource>),
    /// A file attachment icon
    Attachment(Rc<AttachmentResource>),
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub region: PageRegion,
    pub action: AnnotationAction,
}

#[derive(Debug, Clone)]
pub struct EmbeddedEntry {
    pub name: String,
    pub file: Rc<AttachmentResource>,
}

/// Every artefact registered while laying out one document
#[derive(Debug, Clone, Default)]
pub struct ArtefactCatalog {
    outlines: Vec<OutlineEntry>,
    destinations: Vec<NamedDestination>,
    annotations: Vec<Annotation>,
    embedded: Vec<EmbeddedEntry>,
    open: Vec<ArtefactHandle>,
}

impl ArtefactCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&mut self, kind: ArtefactKind, index: usize) -> ArtefactHandle {
        let handle = ArtefactHandle { kind, index };
        self.open.push(handle);
        handle
    }

    /// Open an outline entry below the innermost open outline
    pub fn open_outline(&mut self, title: impl Into<String>, target: PagePosition) -> ArtefactHandle {
        let parent = self
            .open
            .iter()
            .rev()
            .find(|h| h.kind == ArtefactKind::Outlines)
            .map(|h| h.index);
        let index = self.outlines.len();
        self.outlines.push(OutlineEntry {
            title: title.into(),
            target,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.outlines[parent].children.push(index);
        }
        self.opened(ArtefactKind::Outlines, index)
    }

    pub fn add_destination(&mut self, name: impl Into<String>, target: PagePosition) -> ArtefactHandle {
        let index = self.destinations.len();
        self.destinations.push(NamedDestination {
            name: name.into(),
            target,
        });
        self.opened(ArtefactKind::Names, index)
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> ArtefactHandle {
        let index = self.annotations.len();
        self.annotations.push(annotation);
        self.opened(ArtefactKind::Annotations, index)
    }

    pub fn add_embedded(&mut self, name: impl Into<String>, file: Rc<AttachmentResource>) -> ArtefactHandle {
        let index = self.embedded.len();
        self.embedded.push(EmbeddedEntry {
            name: name.into(),
            file,
        });
        self.opened(ArtefactKind::EmbeddedFiles, index)
    }

    /// Close a handle; it must be the innermost open one
    pub fn close(&mut self, handle: ArtefactHandle) -> Result<()> {
        match self.open.last() {
            Some(top) if *top == handle => {
                self.open.pop();
                Ok(())
            }
            Some(top) => Err(GenerationError::structural(format!(
                "artefact {:?} #{} closed out of order, {:?} #{} is still open",
                handle.kind, handle.index, top.kind, top.index
            ))),
            None => Err(GenerationError::structural(format!(
                "artefact {:?} #{} closed but nothing is open",
                handle.kind, handle.index
            ))),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Fails when a registration was never closed
    pub fn ensure_closed(&self) -> Result<()> {
        match self.open.last() {
            None => Ok(()),
            Some(top) => Err(GenerationError::structural(format!(
                "{} artefact(s) left open, innermost {:?} #{}",
                self.open.len(),
                top.kind,
                top.index
            ))),
        }
    }

    pub fn outlines(&self) -> &[OutlineEntry] {
        &self.outlines
    }

    /// Outline entries with no parent, in order
    pub fn root_outlines(&self) -> impl Iterator<Item = usize> + '_ {
        self.outlines
            .iter()
            .enumerate()
            .filter(|(_, o)| o.parent.is_none())
            .map(|(i, _)| i)
    }

    pub fn destinations(&self) -> &[NamedDestination] {
        &self.destinations
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotations_on(&self, page: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.region.page == page)
    }

    pub fn embedded(&self) -> &[EmbeddedEntry] {
        &self.embedded
    }

    /// Append another closed catalog whose pages follow `page_offset` pages of this one
    pub fn append(&mut self, other: ArtefactCatalog, page_offset: usize) -> Result<()> {
        other.ensure_closed()?;
        let outline_offset = self.outlines.len();
        let shift = |target: PagePosition| PagePosition {
            page: target.page + page_offset,
            ..target
        };

        self.outlines.extend(other.outlines.into_iter().map(|o| OutlineEntry {
            title: o.title,
            target: shift(o.target),
            parent: o.parent.map(|p| p + outline_offset),
            children: o.children.into_iter().map(|c| c + outline_offset).collect(),
        }));
        self.destinations
            .extend(other.destinations.into_iter().map(|d| NamedDestination {
                name: d.name,
                target: shift(d.target),
            }));
        self.annotations.extend(other.annotations.into_iter().map(|a| Annotation {
            region: PageRegion {
                page: a.region.page + page_offset,
                ..a.region
            },
            action: a.action,
        }));
        self.embedded.extend(other.embedded);
        Ok(())
    }
}

/// The handles one component registered during layout.
///
/// Single handles are kept per kind; list handles (one annotation per
/// region of a link, say) keep their registration order. Closing releases
/// the lists newest first, then the single handles newest first.
#[derive(Debug, Default)]
pub struct ArtefactRegistrationSet {
    single: Vec<ArtefactHandle>,
    lists: BTreeMap<ArtefactKind, Vec<ArtefactHandle>>,
    order: Vec<ArtefactKind>,
}

impl ArtefactRegistrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the handle of a standard artefact; one per kind
    pub fn register(&mut self, handle: ArtefactHandle) -> Result<()> {
        if self.single.iter().any(|h| h.kind == handle.kind) {
            return Err(GenerationError::structural(format!(
                "{:?} registered twice for one component",
                handle.kind
            )));
        }
        self.single.push(handle);
        Ok(())
    }

    /// Keep a handle of a list-valued artefact
    pub fn register_item(&mut self, handle: ArtefactHandle) {
        self.order.push(handle.kind);
        self.lists.entry(handle.kind).or_default().push(handle);
    }

    pub fn get(&self, kind: ArtefactKind) -> Option<ArtefactHandle> {
        self.single.iter().find(|h| h.kind == kind).copied()
    }

    pub fn items(&self, kind: ArtefactKind) -> &[ArtefactHandle] {
        self.lists.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.lists.is_empty()
    }

    /// Close everything in reverse registration order
    pub fn close(mut self, catalog: &mut ArtefactCatalog) -> Result<()> {
        while let Some(kind) = self.order.pop() {
            if let Some(handle) = self.lists.get_mut(&kind).and_then(Vec::pop) {
                catalog.close(handle)?;
            }
        }
        while let Some(handle) = self.single.pop() {
            catalog.close(handle)?;
        }
        Ok(())
    }
}
