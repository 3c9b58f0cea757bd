//! Data context passed through a binding pass

use crate::{BindingValue, DataStack};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How failures inside a component's binding are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConformanceMode {
    /// Log the failure and continue
    #[default]
    Lax,
    /// Abort the pass with an error
    Strict,
}

impl ConformanceMode {
    /// Parse a mode name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lax" => Some(ConformanceMode::Lax),
            "strict" => Some(ConformanceMode::Strict),
            _ => None,
        }
    }
}

/// Named values visible to binding expressions (`@name`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCollection {
    items: BTreeMap<String, BindingValue>,
}

impl ItemCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named value, returning any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<BindingValue>) -> Option<BindingValue> {
        self.items.insert(name.into(), value.into())
    }

    /// Get a named value
    pub fn get(&self, name: &str) -> Option<&BindingValue> {
        self.items.get(name)
    }

    /// Check if a name is present
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Remove a named value
    pub fn remove(&mut self, name: &str) -> Option<BindingValue> {
        self.items.remove(name)
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the values
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BindingValue)> {
        self.items.iter()
    }
}

/// Saved index/key cursor, restored after nested enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    index: usize,
    key: Option<String>,
}

/// State threaded through a data binding pass
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    current_index: usize,
    current_key: Option<String>,
    stack: DataStack,
    items: ItemCollection,
    conformance: ConformanceMode,
}

impl DataContext {
    /// Create a context over the given items
    pub fn new(items: ItemCollection, conformance: ConformanceMode) -> Self {
        Self {
            items,
            conformance,
            ..Default::default()
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    pub fn set_current_key(&mut self, key: Option<String>) {
        self.current_key = key;
    }

    pub fn data_stack(&self) -> &DataStack {
        &self.stack
    }

    pub fn data_stack_mut(&mut self) -> &mut DataStack {
        &mut self.stack
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut ItemCollection {
        &mut self.items
    }

    pub fn conformance(&self) -> ConformanceMode {
        self.conformance
    }

    pub fn set_conformance(&mut self, mode: ConformanceMode) {
        self.conformance = mode;
    }

    /// Capture the index/key cursor
    pub fn snapshot(&self) -> CursorSnapshot {
        CursorSnapshot {
            index: self.current_index,
            key: self.current_key.clone(),
        }
    }

    /// Put back a cursor captured by [`DataContext::snapshot`]
    pub fn restore(&mut self, snapshot: CursorSnapshot) {
        self.current_index = snapshot.index;
        self.current_key = snapshot.key;
    }

    /// Run `f` and restore the index/key cursor afterwards, whatever `f` returned
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let snapshot = self.snapshot();
        let result = f(self);
        self.restore(snapshot);
        result
    }
}
