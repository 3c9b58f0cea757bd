//! Font definitions and the factory that loads them

use crate::{font_key, FontStyle, FontWeight, StandardFont};

/// A loadable font face
#[derive(Debug, Clone, PartialEq)]
pub struct FontDefinition {
    family: String,
    weight: FontWeight,
    style: FontStyle,
    base_font: String,
    standard: Option<StandardFont>,
    average_width: f32,
    ascent: f32,
    descent: f32,
}

impl FontDefinition {
    /// Definition of a standard 14 font
    pub fn standard(font: StandardFont) -> Self {
        Self {
            family: font.family().to_string(),
            weight: font.weight(),
            style: font.style(),
            base_font: font.pdf_name().to_string(),
            standard: Some(font),
            average_width: font.average_width(),
            ascent: 0.75,
            descent: 0.25,
        }
    }

    /// Definition of a face known only by metrics; written out as a Helvetica
    /// based Type1 font with its own base name.
    pub fn custom(family: impl Into<String>, weight: FontWeight, style: FontStyle) -> Self {
        let family = family.into();
        let base_font = format!("{}-{}{}", family.replace(' ', ""), weight, style);
        Self {
            family,
            weight,
            style,
            base_font,
            standard: None,
            average_width: 0.5,
            ascent: 0.75,
            descent: 0.25,
        }
    }

    pub fn with_average_width(mut self, width: f32) -> Self {
        self.average_width = width;
        self
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    pub fn standard_font(&self) -> Option<StandardFont> {
        self.standard
    }

    /// `Family,Weight,Style`
    pub fn full_name(&self) -> String {
        font_key(&self.family, self.weight, self.style)
    }

    pub fn matches(&self, family: &str, weight: FontWeight, style: FontStyle) -> bool {
        self.family.eq_ignore_ascii_case(family) && self.weight == weight && self.style == style
    }

    /// Approximate advance width of `text` at `size`
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * self.average_width * size
    }

    /// Line height at `size`
    pub fn line_height(&self, size: f32) -> f32 {
        (self.ascent + self.descent) * size * 1.2
    }

    pub fn ascent(&self, size: f32) -> f32 {
        self.ascent * size
    }
}

/// Loads font definitions by family, weight and style
pub trait FontFactory {
    /// A definition matching exactly, if the factory has one
    fn load_exact(&self, family: &str, weight: FontWeight, style: FontStyle) -> Option<FontDefinition>;

    /// Every definition available for a family
    fn family_definitions(&self, family: &str) -> Vec<FontDefinition>;
}

/// A factory over a fixed list of definitions
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    definitions: Vec<FontDefinition>,
}

impl FontRegistry {
    /// A registry with no fonts
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the standard 14 fonts
    pub fn standard() -> Self {
        Self {
            definitions: StandardFont::ALL.into_iter().map(FontDefinition::standard).collect(),
        }
    }

    /// Add a definition, replacing one with the same full name
    pub fn register(&mut self, definition: FontDefinition) {
        let name = definition.full_name();
        self.definitions.retain(|d| d.full_name() != name);
        self.definitions.push(definition);
    }

    pub fn with(mut self, definition: FontDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl FontFactory for FontRegistry {
    fn load_exact(&self, family: &str, weight: FontWeight, style: FontStyle) -> Option<FontDefinition> {
        self.definitions
            .iter()
            .find(|d| d.matches(family, weight, style))
            .cloned()
    }

    fn family_definitions(&self, family: &str) -> Vec<FontDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.family.eq_ignore_ascii_case(family))
            .cloned()
            .collect()
    }
}
