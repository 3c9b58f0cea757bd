//! The standard 14 PDF fonts (built into every PDF viewer)

use crate::{FontStyle, FontWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl StandardFont {
    pub const ALL: [StandardFont; 14] = [
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
        StandardFont::Symbol,
        StandardFont::ZapfDingbats,
    ];

    /// The PDF BaseFont name
    pub fn pdf_name(&self) -> &'static str {
        match self {
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Family name used when matching requests
    pub fn family(&self) -> &'static str {
        match self {
            StandardFont::TimesRoman
            | StandardFont::TimesBold
            | StandardFont::TimesItalic
            | StandardFont::TimesBoldItalic => "Times",
            StandardFont::Helvetica
            | StandardFont::HelveticaBold
            | StandardFont::HelveticaOblique
            | StandardFont::HelveticaBoldOblique => "Helvetica",
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => "Courier",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    pub fn weight(&self) -> FontWeight {
        match self {
            StandardFont::TimesBold
            | StandardFont::TimesBoldItalic
            | StandardFont::HelveticaBold
            | StandardFont::HelveticaBoldOblique
            | StandardFont::CourierBold
            | StandardFont::CourierBoldOblique => FontWeight::BOLD,
            _ => FontWeight::REGULAR,
        }
    }

    pub fn style(&self) -> FontStyle {
        match self {
            StandardFont::TimesItalic
            | StandardFont::TimesBoldItalic
            | StandardFont::HelveticaOblique
            | StandardFont::HelveticaBoldOblique
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => FontStyle::Italic,
            _ => FontStyle::Regular,
        }
    }

    /// Encoding entry for the font dictionary
    pub fn encoding(&self) -> Option<&'static str> {
        match self {
            StandardFont::Symbol | StandardFont::ZapfDingbats => None,
            _ => Some("WinAnsiEncoding"),
        }
    }

    /// Courier variant for the final fallback: bold at or above semi-bold
    pub fn courier(weight: FontWeight, style: FontStyle) -> Self {
        match (weight.is_bold(), style == FontStyle::Italic) {
            (false, false) => StandardFont::Courier,
            (true, false) => StandardFont::CourierBold,
            (false, true) => StandardFont::CourierOblique,
            (true, true) => StandardFont::CourierBoldOblique,
        }
    }

    /// Average glyph width as a fraction of the em
    pub fn average_width(&self) -> f32 {
        match self {
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => 0.6,
            StandardFont::Helvetica | StandardFont::HelveticaOblique => 0.5,
            StandardFont::HelveticaBold | StandardFont::HelveticaBoldOblique => 0.52,
            StandardFont::TimesRoman | StandardFont::TimesItalic => 0.45,
            StandardFont::TimesBold | StandardFont::TimesBoldItalic => 0.48,
            StandardFont::Symbol | StandardFont::ZapfDingbats => 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courier_mapping() {
        assert_eq!(StandardFont::courier(FontWeight::MEDIUM, FontStyle::Regular), StandardFont::Courier);
        assert_eq!(StandardFont::courier(FontWeight::SEMI_BOLD, FontStyle::Regular), StandardFont::CourierBold);
        assert_eq!(StandardFont::courier(FontWeight::BLACK, FontStyle::Italic), StandardFont::CourierBoldOblique);
    }

    #[test]
    fn test_parts_round_trip() {
        for font in StandardFont::ALL {
            if font.family() == "Courier" {
                assert_eq!(StandardFont::courier(font.weight(), font.style()), font);
            }
        }
        assert_eq!(StandardFont::HelveticaBoldOblique.pdf_name(), "Helvetica-BoldOblique");
        assert_eq!(StandardFont::Symbol.encoding(), None);
    }
}
