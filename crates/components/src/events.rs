//! Component lifecycle events
//!
//! A component only allocates its [`EventTable`] once a handler is attached.

use crate::component::Component;
use crate::{NodeId, Result};
use data_binding::DataContext;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEvent {
    Init,
    Loaded,
    DataBinding,
    DataBound,
    /// A template inserted and bound one item; `EventArgs::item` holds it
    ItemDataBound,
    ContentChanged,
    Disposed,
}

/// What a handler receives
pub struct EventArgs<'a> {
    pub event: ComponentEvent,
    /// The component the handler is attached to
    pub source: NodeId,
    /// The binding context, for binding events
    pub context: Option<&'a DataContext>,
    /// The inserted component, for `ItemDataBound`
    pub item: Option<&'a mut Component>,
}

pub type EventHandler = Rc<dyn Fn(&mut EventArgs<'_>) -> Result<()>>;

#[derive(Default, Clone)]
pub struct EventTable {
    handlers: HashMap<ComponentEvent, Vec<EventHandler>>,
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(event, list)| (event, list.len())))
            .finish()
    }
}

impl EventTable {
    pub fn add(&mut self, event: ComponentEvent, handler: EventHandler) {
        self.handlers.entry(event).or_default().push(handler);
    }

    /// Handlers for `event`, cloned so they can run while the tree is borrowed mutably
    pub fn handlers(&self, event: ComponentEvent) -> Vec<EventHandler> {
        self.handlers.get(&event).cloned().unwrap_or_default()
    }

    pub fn has(&self, event: ComponentEvent) -> bool {
        self.handlers.get(&event).is_some_and(|list| !list.is_empty())
    }
}
