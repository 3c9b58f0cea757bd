//! Font requests: family chain, weight, style and size

use crate::{FontError, FontResource, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Font weight on the usual 100..=900 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: Self = Self(100);
    pub const LIGHT: Self = Self(300);
    pub const REGULAR: Self = Self(400);
    pub const MEDIUM: Self = Self(500);
    pub const SEMI_BOLD: Self = Self(600);
    pub const BOLD: Self = Self(700);
    pub const BLACK: Self = Self(900);

    pub fn value(self) -> u16 {
        self.0
    }

    /// At or above semi-bold
    pub fn is_bold(self) -> bool {
        self >= Self::SEMI_BOLD
    }

    /// Absolute weight distance
    pub fn distance(self, other: Self) -> u32 {
        u32::from(self.0.abs_diff(other.0))
    }

    fn name(self) -> Option<&'static str> {
        match self.0 {
            100 => Some("Thin"),
            300 => Some("Light"),
            400 => Some("Regular"),
            500 => Some("Medium"),
            600 => Some("SemiBold"),
            700 => Some("Bold"),
            900 => Some("Black"),
            _ => None,
        }
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::REGULAR
    }
}

impl FromStr for FontWeight {
    type Err = FontError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u16>() {
            return Ok(Self(n));
        }
        match trimmed.to_ascii_lowercase().replace(['-', ' '], "").as_str() {
            "thin" => Ok(Self::THIN),
            "light" => Ok(Self::LIGHT),
            "regular" | "normal" => Ok(Self::REGULAR),
            "medium" => Ok(Self::MEDIUM),
            "semibold" => Ok(Self::SEMI_BOLD),
            "bold" => Ok(Self::BOLD),
            "black" => Ok(Self::BLACK),
            _ => Err(FontError::UnknownWeight(s.to_string())),
        }
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Font style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Regular,
    Italic,
}

impl FromStr for FontStyle {
    type Err = FontError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" | "normal" => Ok(FontStyle::Regular),
            "italic" | "oblique" => Ok(FontStyle::Italic),
            _ => Err(FontError::UnknownStyle(s.to_string())),
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontStyle::Regular => write!(f, "Regular"),
            FontStyle::Italic => write!(f, "Italic"),
        }
    }
}

/// Ordered chain of family names, tried first to last. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontSelector {
    families: Vec<String>,
}

impl FontSelector {
    /// Build a selector from family names; blank names are dropped
    pub fn new<I, S>(families: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let families: Vec<String> = families
            .into_iter()
            .map(|f| f.as_ref().trim().trim_matches(['"', '\'']).to_string())
            .filter(|f| !f.is_empty())
            .collect();

        if families.is_empty() {
            return Err(FontError::EmptySelector);
        }
        Ok(Self { families })
    }

    /// A selector with a single family
    pub fn family(name: impl Into<String>) -> Self {
        Self {
            families: vec![name.into()],
        }
    }

    /// Parse a comma separated chain such as `"Segoe UI", Helvetica`
    pub fn parse(chain: &str) -> Result<Self> {
        Self::new(chain.split(','))
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(String::as_str)
    }

    /// The first family in the chain
    pub fn primary(&self) -> &str {
        &self.families[0]
    }
}

impl fmt::Display for FontSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.families.join(", "))
    }
}

/// The logical key of a (family, weight, style) request, `Family,Weight,Style`
pub fn font_key(family: &str, weight: FontWeight, style: FontStyle) -> String {
    format!("{},{},{}", family, weight, style)
}

/// A font request plus the resource it resolved to
#[derive(Debug, Clone)]
pub struct Font {
    selector: FontSelector,
    weight: FontWeight,
    style: FontStyle,
    size: f32,
    resource: Option<Rc<FontResource>>,
}

impl Font {
    pub const DEFAULT_SIZE: f32 = 12.0;

    pub fn new(selector: FontSelector, weight: FontWeight, style: FontStyle) -> Self {
        Self {
            selector,
            weight,
            style,
            size: Self::DEFAULT_SIZE,
            resource: None,
        }
    }

    /// Parse `family[,weight[,style]]`, e.g. `Helvetica,Bold,Italic`
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split(',').map(str::trim);
        let family = parts
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| FontError::InvalidFontName(text.to_string()))?;

        let weight = parts.next().map(str::parse::<FontWeight>).transpose()?.unwrap_or_default();
        let style = parts.next().map(str::parse::<FontStyle>).transpose()?.unwrap_or_default();

        if parts.next().is_some() {
            return Err(FontError::InvalidFontName(text.to_string()));
        }

        Ok(Self::new(FontSelector::family(family), weight, style))
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn selector(&self) -> &FontSelector {
        &self.selector
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// The resource this font resolved to, if any
    pub fn resource(&self) -> Option<&Rc<FontResource>> {
        self.resource.as_ref()
    }

    pub fn set_resource(&mut self, resource: Rc<FontResource>) {
        self.resource = Some(resource);
    }

    pub fn clear_resource(&mut self) {
        self.resource = None;
    }

    /// Logical key for the given family of the chain
    pub fn key_for(&self, family: &str) -> String {
        font_key(family, self.weight, self.style)
    }
}

impl fmt::Display for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.selector, self.weight, self.style)
    }
}
