//! Page content streams
//!
//! A builder for the operators the generator draws with: text objects,
//! images placed through XObjects, and filled or stroked rectangles.

use std::io::Write;

/// Content stream builder
#[derive(Debug, Default, Clone)]
pub struct ContentStream {
    data: Vec<u8>,
}

impl ContentStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// q
    pub fn save_state(&mut self) -> &mut Self {
        self.write_line("q");
        self
    }

    /// Q
    pub fn restore_state(&mut self) -> &mut Self {
        self.write_line("Q");
        self
    }

    /// Concatenate the transformation matrix (cm)
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        self.write_fmt(format_args!(
            "{} {} {} {} {} {} cm\n",
            fmt_num(a),
            fmt_num(b),
            fmt_num(c),
            fmt_num(d),
            fmt_num(e),
            fmt_num(f)
        ));
        self
    }

    /// g
    pub fn set_fill_gray(&mut self, gray: f64) -> &mut Self {
        self.write_fmt(format_args!("{} g\n", fmt_num(gray)));
        self
    }

    /// G
    pub fn set_stroke_gray(&mut self, gray: f64) -> &mut Self {
        self.write_fmt(format_args!("{} G\n", fmt_num(gray)));
        self
    }

    /// re
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.write_fmt(format_args!(
            "{} {} {} {} re\n",
            fmt_num(x),
            fmt_num(y),
            fmt_num(width),
            fmt_num(height)
        ));
        self
    }

    /// f
    pub fn fill(&mut self) -> &mut Self {
        self.write_line("f");
        self
    }

    /// S
    pub fn stroke(&mut self) -> &mut Self {
        self.write_line("S");
        self
    }

    /// BT
    pub fn begin_text(&mut self) -> &mut Self {
        self.write_line("BT");
        self
    }

    /// ET
    pub fn end_text(&mut self) -> &mut Self {
        self.write_line("ET");
        self
    }

    /// Tf
    pub fn set_font(&mut self, resource_name: &str, size: f64) -> &mut Self {
        self.write_fmt(format_args!("/{} {} Tf\n", resource_name, fmt_num(size)));
        self
    }

    /// Td
    pub fn move_text(&mut self, tx: f64, ty: f64) -> &mut Self {
        self.write_fmt(format_args!("{} {} Td\n", fmt_num(tx), fmt_num(ty)));
        self
    }

    /// Tj, encoding the text for a single-byte standard font.
    /// Characters outside Latin-1 are written as `?`.
    pub fn show_text(&mut self, text: &str) -> &mut Self {
        self.data.push(b'(');
        for ch in text.chars() {
            let byte = u8::try_from(u32::from(ch)).unwrap_or(b'?');
            match byte {
                b'(' | b')' | b'\\' => {
                    self.data.push(b'\\');
                    self.data.push(byte);
                }
                b'\n' => self.data.extend_from_slice(b"\\n"),
                b'\r' => self.data.extend_from_slice(b"\\r"),
                b'\t' => self.data.extend_from_slice(b"\\t"),
                0x20..=0x7E => self.data.push(byte),
                _ => self.write_fmt(format_args!("\\{:03o}", byte)),
            }
        }
        self.write_line(") Tj");
        self
    }

    /// Paint an XObject (Do)
    pub fn draw_xobject(&mut self, name: &str) -> &mut Self {
        self.write_fmt(format_args!("/{} Do\n", name));
        self
    }

    /// Draw an image XObject into the rectangle with its lower-left corner at (x, y)
    pub fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.save_state()
            .transform(width, 0.0, 0.0, height, x, y)
            .draw_xobject(name)
            .restore_state()
    }

    fn write_line(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(b'\n');
    }

    fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.data.write_fmt(args);
    }
}

/// Format a number for content stream output
pub fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        let s = format!("{:.3}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(cs: ContentStream) -> String {
        String::from_utf8(cs.into_bytes()).unwrap()
    }

    #[test]
    fn test_text_object() {
        let mut cs = ContentStream::new();
        cs.begin_text()
            .set_font("F1", 12.0)
            .move_text(72.0, 700.5)
            .show_text("Hello (world)")
            .end_text();

        assert_eq!(
            text(cs),
            "BT\n/F1 12 Tf\n72 700.5 Td\n(Hello \\(world\\)) Tj\nET\n"
        );
    }

    #[test]
    fn test_latin1_and_unmapped_characters() {
        let mut cs = ContentStream::new();
        cs.show_text("é€");
        assert_eq!(text(cs), "(\\351?) Tj\n");
    }

    #[test]
    fn test_draw_image() {
        let mut cs = ContentStream::new();
        cs.draw_image("Img1", 10.0, 20.0, 100.0, 50.0);
        assert_eq!(text(cs), "q\n100 0 0 50 10 20 cm\n/Img1 Do\nQ\n");
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(1.0), "1");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(1.23456), "1.235");
    }
}
