//! Template binding
//!
//! A template component sits among the children of a container. Each time it
//! is bound it removes whatever it inserted on the previous bind, enumerates
//! its data and inserts one instantiated template per item just before
//! itself, binding each inserted component straight away so nested templates
//! expand before layout.

use crate::component::{ComponentBuilder, ComponentKind};
use crate::events::{ComponentEvent, EventArgs};
use crate::{Document, GenerationError, NodeId, Result, TraceLevel};
use data_binding::{BindingEnumerator, BindingPath, BindingValue, DataBindingBehaviour, DataContext};
use std::fmt;
use std::rc::Rc;

/// Components instantiated together for one data item
#[derive(Debug, Clone, Default)]
pub struct Template {
    items: Vec<ComponentBuilder>,
}

impl Template {
    pub fn new(items: impl IntoIterator<Item = ComponentBuilder>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &[ComponentBuilder] {
        &self.items
    }
}

impl From<ComponentBuilder> for Template {
    fn from(builder: ComponentBuilder) -> Self {
        Self::new([builder])
    }
}

/// Supplies the template for each enumerated item
pub trait TemplateSource {
    /// The template for the item at `index`, given how many components
    /// have been inserted so far. `None` skips the item.
    fn template_for(&self, index: usize, total_inserted: usize) -> Option<Rc<Template>>;
}

impl<F> TemplateSource for F
where
    F: Fn(usize, usize) -> Option<Rc<Template>>,
{
    fn template_for(&self, index: usize, total_inserted: usize) -> Option<Rc<Template>> {
        self(index, total_inserted)
    }
}

/// The same template for every item
#[derive(Debug, Clone)]
pub struct RepeatingTemplate(Rc<Template>);

impl RepeatingTemplate {
    pub fn new(template: impl Into<Template>) -> Self {
        Self(Rc::new(template.into()))
    }
}

impl TemplateSource for RepeatingTemplate {
    fn template_for(&self, _index: usize, _total_inserted: usize) -> Option<Rc<Template>> {
        Some(Rc::clone(&self.0))
    }
}

/// Configuration of a template component
#[derive(Clone)]
pub struct TemplateSpec {
    behaviour: DataBindingBehaviour,
    data_source: Option<String>,
    selector: Option<BindingPath>,
    source: Rc<dyn TemplateSource>,
}

impl fmt::Debug for TemplateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSpec")
            .field("behaviour", &self.behaviour)
            .field("data_source", &self.data_source)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl TemplateSpec {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            behaviour: DataBindingBehaviour::REPEATING,
            data_source: None,
            selector: None,
            source: Rc::new(source),
        }
    }

    /// Repeat `template` once per item
    pub fn repeating(template: impl Into<Template>) -> Self {
        Self::new(RepeatingTemplate::new(template))
    }

    pub fn with_behaviour(mut self, behaviour: DataBindingBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Enumerate a document data source instead of the current data
    pub fn with_data_source(mut self, id: impl Into<String>) -> Self {
        self.data_source = Some(id.into());
        self
    }

    /// Narrow the enumerated value by a path
    pub fn with_selector(mut self, selector: BindingPath) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn behaviour(&self) -> DataBindingBehaviour {
        self.behaviour
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    pub fn selector(&self) -> Option<&BindingPath> {
        self.selector.as_ref()
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }
}

impl Document {
    /// Bind a template component: tear down the previous items, fire the
    /// binding event, then (with `include_children`) enumerate and insert.
    pub(crate) fn bind_template(
        &mut self,
        node: NodeId,
        context: &mut DataContext,
        include_children: bool,
    ) -> Result<()> {
        self.clear_bound_items(node)?;
        self.fire(node, ComponentEvent::DataBinding, Some(&*context))?;
        if !include_children {
            return Ok(());
        }

        let (container, placeholder) = self.tree.container_ancestor(node).ok_or_else(|| {
            GenerationError::structural(format!(
                "template {} must be placed inside a container",
                self.describe(node)
            ))
        })?;
        let spec = match self.tree.component(node)?.kind() {
            ComponentKind::Template(spec) => spec.clone(),
            _ => return Err(GenerationError::structural(format!("{} is not a template", self.describe(node)))),
        };
        let (value, source) = self.template_data(&spec, context)?;

        let mut added = Vec::new();
        let outcome = context.scoped(|context| -> Result<usize> {
            let base = self.tree.index_of(placeholder).unwrap_or(0);
            let enumerator = BindingEnumerator::select(value, spec.behaviour())?;
            let mut total = 0;

            enumerator.drive(
                context,
                spec.behaviour(),
                source.as_deref(),
                |context: &mut DataContext, ordinal: usize| -> Result<()> {
                    let Some(template) = spec.source().template_for(ordinal, total) else {
                        tracing::trace!(ordinal, "template skipped item");
                        return Ok(());
                    };
                    for builder in template.items() {
                        let item = self.tree.create_detached(builder, Some(node));
                        if let Err(e) = self.init_subtree(item) {
                            self.tree.discard_detached(item);
                            return Err(e);
                        }
                        // Nested templates insert ahead of themselves, so the
                        // slot in front of the placeholder moves with them.
                        let at = self.tree.index_of(placeholder).unwrap_or(base + total);
                        if let Err(e) = self.tree.attach(container, Some(at), item) {
                            self.tree.discard_detached(item);
                            return Err(e);
                        }
                        added.push(item);
                        total += 1;

                        self.load_subtree(item)?;
                        self.data_bind_component(item, context, true)?;
                        self.fire_item_bound(node, item, context)?;
                    }
                    Ok(())
                },
            )
        });

        let inserted = added.len();
        self.tree.component_mut(node)?.bound_items = added;
        let count = outcome?;
        self.trace.add(
            TraceLevel::Debug,
            "Binding",
            format!("{} bound {} item(s), inserted {} component(s)", self.describe(node), count, inserted),
        );
        Ok(())
    }

    /// The value to enumerate and the id of the source it came from
    fn template_data(
        &self,
        spec: &TemplateSpec,
        context: &DataContext,
    ) -> Result<(Option<Rc<BindingValue>>, Option<String>)> {
        if let Some(id) = spec.data_source() {
            let value = self.data_sources.select(id, spec.selector())?;
            return Ok((Some(value), Some(id.to_string())));
        }

        let source = context.data_stack().source().map(str::to_string);
        Ok(match spec.selector() {
            Some(path) => (Some(Rc::new(path.evaluate(context))), source),
            None => (context.data_stack().current().cloned(), source),
        })
    }

    /// Remove and dispose everything the template inserted on its last bind
    fn clear_bound_items(&mut self, node: NodeId) -> Result<()> {
        let previous = std::mem::take(&mut self.tree.component_mut(node)?.bound_items);
        for item in previous {
            if self.tree.contains(item) {
                self.dispose_subtree(item)?;
            }
        }
        Ok(())
    }

    fn fire_item_bound(&mut self, owner: NodeId, item: NodeId, context: &DataContext) -> Result<()> {
        let handlers = self.tree.component(owner)?.handlers(ComponentEvent::ItemDataBound);
        for handler in handlers {
            let mut args = EventArgs {
                event: ComponentEvent::ItemDataBound,
                source: owner,
                context: Some(context),
                item: self.tree.get_mut(item),
            };
            handler(&mut args)?;
        }
        Ok(())
    }
}
