//! Named styles
//!
//! A style carries a font request, written as `family[,weight[,style]]`,
//! and an optional size. The font may be bound to data, in which case it is
//! parsed when the document is bound.

use crate::component::BindableText;
use crate::{GenerationError, Result};
use data_binding::DataContext;
use fonts::Font;

#[derive(Debug, Clone)]
pub struct Style {
    name: String,
    font: Option<BindableText>,
    font_size: Option<f32>,
    resolved_font: Option<Font>,
}

impl Style {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            font: None,
            font_size: None,
            resolved_font: None,
        }
    }

    /// Font request, literal or `{{ path }}`
    pub fn with_font(mut self, font: BindableText) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn font_text(&self) -> Option<&BindableText> {
        self.font.as_ref()
    }

    pub fn font_size(&self) -> Option<f32> {
        self.font_size
    }

    /// The parsed font, available after validation (literal fonts) or binding
    pub fn resolved_font(&self) -> Option<&Font> {
        self.resolved_font.as_ref()
    }

    /// Parse a literal font request so a malformed name fails at init
    pub(crate) fn validate(&mut self) -> Result<()> {
        if let Some(BindableText::Literal(text)) = &self.font {
            self.resolved_font = Some(self.parse_font(text)?);
        }
        Ok(())
    }

    pub(crate) fn bind(&mut self, context: &DataContext) -> Result<()> {
        if let Some(text @ BindableText::Bound(_)) = &self.font {
            let value = text.resolve(context);
            if value.trim().is_empty() {
                tracing::debug!(style = %self.name, "bound font resolved to nothing, keeping the default");
                self.resolved_font = None;
                return Ok(());
            }
            self.resolved_font = Some(self.parse_font(&value)?);
        }
        Ok(())
    }

    fn parse_font(&self, text: &str) -> Result<Font> {
        let font = Font::parse(text).map_err(GenerationError::from)?;
        Ok(match self.font_size {
            Some(size) => font.with_size(size),
            None => font,
        })
    }
}

/// The styles of a document, by name
#[derive(Debug, Clone, Default)]
pub struct StyleCollection {
    styles: Vec<Style>,
}

impl StyleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a style, replacing one with the same name
    pub fn add(&mut self, style: Style) {
        self.styles.retain(|s| s.name != style.name);
        self.styles.push(style);
    }

    pub fn get(&self, name: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Style> {
        self.styles.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Style> {
        self.styles.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
