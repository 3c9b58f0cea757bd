//! Scoping stack of bound data

use crate::BindingValue;
use std::rc::Rc;

/// One frame on the data stack: the current value and the id of the
/// data source it was read from, if any.
#[derive(Debug, Clone)]
pub struct DataFrame {
    value: Rc<BindingValue>,
    source: Option<String>,
}

impl DataFrame {
    /// The value held by this frame
    pub fn value(&self) -> &Rc<BindingValue> {
        &self.value
    }

    /// The data source id the value came from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Stack of (value, source) frames pushed as binding descends into
/// templates and popped as it returns.
#[derive(Debug, Clone, Default)]
pub struct DataStack {
    frames: Vec<DataFrame>,
}

impl DataStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new current value
    pub fn push(&mut self, value: impl Into<Rc<BindingValue>>, source: Option<String>) {
        self.frames.push(DataFrame {
            value: value.into(),
            source,
        });
    }

    /// Pop the current value
    pub fn pop(&mut self) -> Option<DataFrame> {
        self.frames.pop()
    }

    /// Whether any value has been pushed
    pub fn has_data(&self) -> bool {
        !self.frames.is_empty()
    }

    /// The current (top of stack) value
    pub fn current(&self) -> Option<&Rc<BindingValue>> {
        self.frames.last().map(|f| &f.value)
    }

    /// The data source id of the current frame
    pub fn source(&self) -> Option<&str> {
        self.frames.last().and_then(|f| f.source())
    }

    /// Number of frames on the stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop frames until the stack is back to `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = DataStack::new();
        assert!(!stack.has_data());

        stack.push(BindingValue::from("outer"), Some("src".into()));
        stack.push(BindingValue::from("inner"), None);

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current().unwrap().as_text(), Some("inner"));
        assert_eq!(stack.source(), None);

        stack.pop();
        assert_eq!(stack.current().unwrap().as_text(), Some("outer"));
        assert_eq!(stack.source(), Some("src"));
    }

    #[test]
    fn test_truncate() {
        let mut stack = DataStack::new();
        stack.push(BindingValue::from(1), None);
        stack.push(BindingValue::from(2), None);
        stack.push(BindingValue::from(3), None);
        stack.truncate(1);
        assert_eq!(stack.depth(), 1);
    }
}
