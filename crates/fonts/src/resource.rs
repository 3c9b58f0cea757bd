//! Shared font resources registered with a document

use crate::{FontDefinition, FontStyle, FontWeight};
use std::collections::HashMap;
use std::rc::Rc;

/// One font written to the output, shared by every font request that
/// resolved to it
#[derive(Debug)]
pub struct FontResource {
    resource_name: String,
    definition: FontDefinition,
}

impl FontResource {
    /// Name used in content streams and page resources (`F1`, `F2`, ...)
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn definition(&self) -> &FontDefinition {
        &self.definition
    }

    /// `Family,Weight,Style` of the resolved face
    pub fn full_name(&self) -> String {
        self.definition.full_name()
    }
}

/// The font resources of a document, in registration order.
///
/// Besides the resources themselves the set remembers which logical font keys
/// were satisfied by substitution or by the Courier fallback, so a repeated
/// request for a missing face returns the same resource without searching again.
#[derive(Debug, Default)]
pub struct FontResourceSet {
    resources: Vec<Rc<FontResource>>,
    substitutions: HashMap<String, Rc<FontResource>>,
    fallbacks: HashMap<String, Rc<FontResource>>,
}

impl FontResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registered resource whose face is exactly (family, weight, style)
    pub fn find_exact(&self, family: &str, weight: FontWeight, style: FontStyle) -> Option<Rc<FontResource>> {
        self.resources
            .iter()
            .find(|r| r.definition.matches(family, weight, style))
            .cloned()
    }

    /// The resource remembered as the substitute for a logical key
    pub fn find_substitute(&self, key: &str) -> Option<Rc<FontResource>> {
        self.substitutions.get(key).cloned()
    }

    /// The Courier resource remembered for a logical key nothing else could serve
    pub fn find_fallback(&self, key: &str) -> Option<Rc<FontResource>> {
        self.fallbacks.get(key).cloned()
    }

    /// Register a definition, or return the resource already registered for it
    pub fn register(&mut self, definition: FontDefinition) -> Rc<FontResource> {
        let name = definition.full_name();
        if let Some(existing) = self.resources.iter().find(|r| r.full_name() == name) {
            return Rc::clone(existing);
        }

        let resource = Rc::new(FontResource {
            resource_name: format!("F{}", self.resources.len() + 1),
            definition,
        });
        self.resources.push(Rc::clone(&resource));
        resource
    }

    /// Remember that `key` is served by `resource`
    pub fn remember_substitution(&mut self, key: impl Into<String>, resource: Rc<FontResource>) {
        self.substitutions.insert(key.into(), resource);
    }

    /// Remember that `key` fell back to `resource`
    pub fn remember_fallback(&mut self, key: impl Into<String>, resource: Rc<FontResource>) {
        self.fallbacks.insert(key.into(), resource);
    }

    /// Registered resources whose family matches
    pub fn family(&self, family: &str) -> impl Iterator<Item = &Rc<FontResource>> + '_ {
        let family = family.to_string();
        self.resources
            .iter()
            .filter(move |r| r.definition.family().eq_ignore_ascii_case(&family))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<FontResource>> {
        self.resources.iter()
    }

    pub fn get_by_name(&self, resource_name: &str) -> Option<&Rc<FontResource>> {
        self.resources.iter().find(|r| r.resource_name == resource_name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn substitution_count(&self) -> usize {
        self.substitutions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StandardFont;

    #[test]
    fn test_register_dedups() {
        let mut set = FontResourceSet::new();
        let a = set.register(FontDefinition::standard(StandardFont::Helvetica));
        let b = set.register(FontDefinition::standard(StandardFont::Helvetica));
        let c = set.register(FontDefinition::standard(StandardFont::TimesBold));

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.resource_name(), "F1");
        assert_eq!(c.resource_name(), "F2");
        assert_eq!(set.len(), 2);
        assert!(set.get_by_name("F2").is_some());
    }

    #[test]
    fn test_fallbacks_are_kept_apart_from_substitutions() {
        let mut set = FontResourceSet::new();
        let courier = set.register(FontDefinition::standard(StandardFont::Courier));
        set.remember_fallback("Nope,Regular,Regular", Rc::clone(&courier));

        assert!(set.find_substitute("Nope,Regular,Regular").is_none());
        assert!(Rc::ptr_eq(&set.find_fallback("Nope,Regular,Regular").unwrap(), &courier));
        assert_eq!(set.substitution_count(), 0);
    }

    #[test]
    fn test_substitution_memory() {
        let mut set = FontResourceSet::new();
        let helvetica = set.register(FontDefinition::standard(StandardFont::Helvetica));
        set.remember_substitution("Helvetica,Bold,Italic", Rc::clone(&helvetica));

        let found = set.find_substitute("Helvetica,Bold,Italic").unwrap();
        assert!(Rc::ptr_eq(&found, &helvetica));
        assert!(set.find_substitute("Helvetica,Bold,Regular").is_none());
        assert_eq!(set.family("helvetica").count(), 1);
    }
}
