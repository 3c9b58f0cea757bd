//! How a template component enumerates and exposes its bound data

/// Immutable descriptor chosen when a template component is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataBindingBehaviour {
    enumerate_through_data: bool,
    set_context_data: bool,
    expand_object_properties: bool,
    increment_context_index: bool,
}

impl DataBindingBehaviour {
    /// Repeat the template once per item of the bound sequence
    pub const REPEATING: Self = Self::new(true, true, false, true);

    /// Repeat the template once per field or entry of the bound object
    pub const EXPANDING: Self = Self::new(true, true, true, true);

    /// Instantiate the template once, with the bound value as the current data
    pub const SINGLE: Self = Self::new(false, true, false, false);

    pub const fn new(
        enumerate_through_data: bool,
        set_context_data: bool,
        expand_object_properties: bool,
        increment_context_index: bool,
    ) -> Self {
        Self {
            enumerate_through_data,
            set_context_data,
            expand_object_properties,
            increment_context_index,
        }
    }

    /// Walk the bound value rather than treating it as one item
    pub const fn enumerate_through_data(&self) -> bool {
        self.enumerate_through_data
    }

    /// Push each item onto the data stack for descendants
    pub const fn set_context_data(&self) -> bool {
        self.set_context_data
    }

    /// Walk the fields of a map or structured value
    pub const fn expand_object_properties(&self) -> bool {
        self.expand_object_properties
    }

    /// Expose a zero-based item counter through the context index
    pub const fn increment_context_index(&self) -> bool {
        self.increment_context_index
    }
}

impl Default for DataBindingBehaviour {
    fn default() -> Self {
        Self::REPEATING
    }
}
