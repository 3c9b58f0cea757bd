//! PDF object model and serializer

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

/// Number of an indirect object (generation is always 0 for new files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef(pub u32);

impl ObjectRef {
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// How string objects are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMode {
    /// `(escaped text)`
    #[default]
    Literal,
    /// `<48656C6C6F>`
    Hex,
}

/// A string object. `hex` forces hexadecimal output whatever the writer mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString {
    bytes: Vec<u8>,
    hex: bool,
}

impl PdfString {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: false,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: true,
        }
    }

    /// A text string: ASCII as is, anything else as UTF-16BE with a byte order mark
    pub fn text(text: &str) -> Self {
        if text.is_ascii() {
            return Self::literal(text.as_bytes());
        }
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Self::literal(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// PDF object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(String),
    Array(Vec<PdfObject>),
    Dictionary(PdfDictionary),
    Reference(ObjectRef),
}

impl PdfObject {
    pub fn name(s: impl Into<String>) -> Self {
        PdfObject::Name(s.into())
    }

    pub fn text(s: &str) -> Self {
        PdfObject::String(PdfString::text(s))
    }

    /// `[x1 y1 x2 y2]`
    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        PdfObject::Array(vec![x1.into(), y1.into(), x2.into(), y2.into()])
    }

    pub fn refs(refs: impl IntoIterator<Item = ObjectRef>) -> Self {
        PdfObject::Array(refs.into_iter().map(PdfObject::Reference).collect())
    }
}

/// PDF dictionary, written with keys in sorted order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfDictionary {
    entries: BTreeMap<String, PdfObject>,
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dictionary with its `/Type` set
    pub fn typed(type_name: &str) -> Self {
        let mut dict = Self::new();
        dict.insert("Type", PdfObject::name(type_name));
        dict
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PdfObject>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PdfObject>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PdfObject)> {
        self.entries.iter()
    }
}

/// Writes objects in PDF syntax
pub struct PdfSerializer<W: Write> {
    writer: W,
    string_mode: StringMode,
}

impl<W: Write> PdfSerializer<W> {
    pub fn new(writer: W, string_mode: StringMode) -> Self {
        Self { writer, string_mode }
    }

    pub fn write_object(&mut self, obj: &PdfObject) -> io::Result<()> {
        match obj {
            PdfObject::Null => write!(self.writer, "null"),
            PdfObject::Boolean(b) => write!(self.writer, "{}", b),
            PdfObject::Integer(n) => write!(self.writer, "{}", n),
            PdfObject::Real(n) => self.write_real(*n),
            PdfObject::String(s) => self.write_string(s),
            PdfObject::Name(name) => self.write_name(name),
            PdfObject::Array(items) => {
                write!(self.writer, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(self.writer, " ")?;
                    }
                    self.write_object(item)?;
                }
                write!(self.writer, "]")
            }
            PdfObject::Dictionary(dict) => {
                write!(self.writer, "<<")?;
                for (key, value) in dict.iter() {
                    self.write_entry(key, value)?;
                }
                write!(self.writer, " >>")
            }
            PdfObject::Reference(r) => write!(self.writer, "{}", r),
        }
    }

    /// ` /Key value`
    pub fn write_entry(&mut self, key: &str, value: &PdfObject) -> io::Result<()> {
        write!(self.writer, " ")?;
        self.write_name(key)?;
        write!(self.writer, " ")?;
        self.write_object(value)
    }

    fn write_real(&mut self, n: f64) -> io::Result<()> {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            return write!(self.writer, "{}", n as i64);
        }
        let s = format!("{:.4}", n);
        write!(self.writer, "{}", s.trim_end_matches('0').trim_end_matches('.'))
    }

    fn write_string(&mut self, s: &PdfString) -> io::Result<()> {
        if s.hex || self.string_mode == StringMode::Hex {
            write!(self.writer, "<")?;
            for byte in &s.bytes {
                write!(self.writer, "{:02X}", byte)?;
            }
            return write!(self.writer, ">");
        }

        write!(self.writer, "(")?;
        for &byte in &s.bytes {
            match byte {
                b'(' | b')' | b'\\' => write!(self.writer, "\\{}", byte as char)?,
                b'\n' => write!(self.writer, "\\n")?,
                b'\r' => write!(self.writer, "\\r")?,
                b'\t' => write!(self.writer, "\\t")?,
                0x20..=0x7E => self.writer.write_all(&[byte])?,
                _ => write!(self.writer, "\\{:03o}", byte)?,
            }
        }
        write!(self.writer, ")")
    }

    fn write_name(&mut self, name: &str) -> io::Result<()> {
        write!(self.writer, "/")?;
        for byte in name.bytes() {
            match byte {
                b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' => {
                    write!(self.writer, "#{:02X}", byte)?
                }
                0x21..=0x7E => self.writer.write_all(&[byte])?,
                _ => write!(self.writer, "#{:02X}", byte)?,
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Serialize one object to bytes
pub fn to_bytes(obj: &PdfObject, string_mode: StringMode) -> Vec<u8> {
    let mut serializer = PdfSerializer::new(Vec::new(), string_mode);
    // Writing into a Vec cannot fail
    let _ = serializer.write_object(obj);
    serializer.into_inner()
}

impl From<bool> for PdfObject {
    fn from(b: bool) -> Self {
        PdfObject::Boolean(b)
    }
}

impl From<i32> for PdfObject {
    fn from(n: i32) -> Self {
        PdfObject::Integer(n as i64)
    }
}

impl From<i64> for PdfObject {
    fn from(n: i64) -> Self {
        PdfObject::Integer(n)
    }
}

impl From<usize> for PdfObject {
    fn from(n: usize) -> Self {
        PdfObject::Integer(n as i64)
    }
}

impl From<u32> for PdfObject {
    fn from(n: u32) -> Self {
        PdfObject::Integer(n as i64)
    }
}

impl From<f64> for PdfObject {
    fn from(n: f64) -> Self {
        PdfObject::Real(n)
    }
}

impl From<f32> for PdfObject {
    fn from(n: f32) -> Self {
        PdfObject::Real(n as f64)
    }
}

impl From<PdfString> for PdfObject {
    fn from(s: PdfString) -> Self {
        PdfObject::String(s)
    }
}

impl From<ObjectRef> for PdfObject {
    fn from(r: ObjectRef) -> Self {
        PdfObject::Reference(r)
    }
}

impl From<PdfDictionary> for PdfObject {
    fn from(dict: PdfDictionary) -> Self {
        PdfObject::Dictionary(dict)
    }
}

impl From<Vec<PdfObject>> for PdfObject {
    fn from(items: Vec<PdfObject>) -> Self {
        PdfObject::Array(items)
    }
}
