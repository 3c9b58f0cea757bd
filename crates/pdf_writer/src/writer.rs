//! Low-level object writer
//!
//! Tracks byte offsets for the cross-reference table and checks that every
//! `begin_*` call is closed by the matching `end_*` call in reverse order.

use crate::objects::{to_bytes, ObjectRef, PdfDictionary, PdfObject, PdfString, StringMode};
use crate::{FilterPipeline, PdfError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Object(ObjectRef),
    Dictionary,
    Array,
}

impl fmt::Display for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Open::Object(r) => write!(f, "object {}", r.0),
            Open::Dictionary => write!(f, "dictionary"),
            Open::Array => write!(f, "array"),
        }
    }
}

/// Entries of the file trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub root: ObjectRef,
    pub info: Option<ObjectRef>,
    /// File identifier, written twice as the `/ID` pair
    pub id: Option<[u8; 16]>,
}

/// Writes a PDF file object by object
pub struct PdfObjectWriter<W: Write> {
    writer: W,
    position: u64,
    offsets: BTreeMap<u32, u64>,
    next_object: u32,
    open: Vec<Open>,
    string_mode: StringMode,
}

impl<W: Write> PdfObjectWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
            offsets: BTreeMap::new(),
            next_object: 1,
            open: Vec::new(),
            string_mode: StringMode::Literal,
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn string_mode(&self) -> StringMode {
        self.string_mode
    }

    /// Switch between literal and hexadecimal string output
    pub fn set_string_mode(&mut self, mode: StringMode) -> StringMode {
        std::mem::replace(&mut self.string_mode, mode)
    }

    /// Reserve the next object number
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef(self.next_object);
        self.next_object += 1;
        r
    }

    /// Number of objects written
    pub fn object_count(&self) -> usize {
        self.offsets.len()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn close(&mut self, expected: Open) -> Result<()> {
        match self.open.pop() {
            Some(found) if same_kind(found, expected) => Ok(()),
            found => {
                if let Some(found) = found {
                    self.open.push(found);
                }
                Err(PdfError::Unbalanced {
                    expected: expected.to_string(),
                    found: found.map_or_else(|| "nothing open".to_string(), |f| f.to_string()),
                })
            }
        }
    }

    /// `%PDF-x.y` and a binary marker comment
    pub fn write_header(&mut self, version: &str) -> Result<()> {
        self.write_str(&format!("%PDF-{}\n", version))?;
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    pub fn begin_object(&mut self, r: ObjectRef) -> Result<()> {
        if self.offsets.contains_key(&r.0) {
            return Err(PdfError::DuplicateObject(r.0));
        }
        if r.0 >= self.next_object {
            self.next_object = r.0 + 1;
        }
        self.offsets.insert(r.0, self.position);
        self.open.push(Open::Object(r));
        self.write_str(&format!("{} 0 obj\n", r.0))
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.close(Open::Object(ObjectRef(0)))?;
        self.write_str("\nendobj\n")
    }

    pub fn begin_dictionary(&mut self) -> Result<()> {
        let separator = if self.in_container() { " " } else { "" };
        self.open.push(Open::Dictionary);
        self.write_str(&format!("{}<<", separator))
    }

    pub fn end_dictionary(&mut self) -> Result<()> {
        self.close(Open::Dictionary)?;
        self.write_str(" >>")
    }

    pub fn begin_array(&mut self) -> Result<()> {
        let separator = if self.in_container() { " " } else { "" };
        self.open.push(Open::Array);
        self.write_str(&format!("{}[", separator))
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.close(Open::Array)?;
        self.write_str(" ]")
    }

    /// ` /Key`, to be followed by a value or a nested begin call
    pub fn write_key(&mut self, key: &str) -> Result<()> {
        if self.open.last() != Some(&Open::Dictionary) {
            return Err(PdfError::Unbalanced {
                expected: "dictionary".to_string(),
                found: self.open.last().map_or_else(|| "nothing open".to_string(), |f| f.to_string()),
            });
        }
        self.write_str(" ")?;
        let name = to_bytes(&PdfObject::name(key), self.string_mode);
        self.write_bytes(&name)
    }

    /// ` /Key value` inside the open dictionary
    pub fn write_entry(&mut self, key: &str, value: impl Into<PdfObject>) -> Result<()> {
        self.write_key(key)?;
        self.write_value(&value.into())
    }

    /// A value, separated from what precedes it
    pub fn write_value(&mut self, value: &PdfObject) -> Result<()> {
        if self.in_container() {
            self.write_str(" ")?;
        }
        let bytes = to_bytes(value, self.string_mode);
        self.write_bytes(&bytes)
    }

    /// A whole indirect object in one call
    pub fn write_object(&mut self, r: ObjectRef, value: &PdfObject) -> Result<()> {
        self.begin_object(r)?;
        self.write_value(value)?;
        self.end_object()
    }

    /// A stream object; `/Length` and `/Filter` are filled in from the pipeline output
    pub fn write_stream(
        &mut self,
        r: ObjectRef,
        mut dict: PdfDictionary,
        data: &[u8],
        filters: &FilterPipeline,
    ) -> Result<()> {
        let encoded = filters.encode(data)?;
        match filters.names().as_slice() {
            [] => {}
            [single] => dict.insert("Filter", PdfObject::name(*single)),
            names => dict.insert(
                "Filter",
                PdfObject::Array(names.iter().map(|n| PdfObject::name(*n)).collect()),
            ),
        }
        dict.insert("Length", encoded.len());

        self.begin_object(r)?;
        self.write_value(&dict.into())?;
        self.write_str("\nstream\n")?;
        self.write_bytes(&encoded)?;
        self.write_str("\nendstream")?;
        self.end_object()?;

        tracing::trace!(target: "pdf", object = r.0, raw = data.len(), encoded = encoded.len(), "wrote stream");
        Ok(())
    }

    /// Cross-reference table, trailer and `%%EOF`
    pub fn write_xref_and_trailer(&mut self, trailer: &Trailer) -> Result<()> {
        if let Some(open) = self.open.last() {
            return Err(PdfError::Unbalanced {
                expected: "nothing open".to_string(),
                found: open.to_string(),
            });
        }

        let xref_offset = self.position;
        let size = self.next_object;

        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        for number in 1..size {
            match self.offsets.get(&number) {
                Some(offset) => table.push_str(&format!("{:010} 00000 n \n", offset)),
                None => table.push_str("0000000000 65535 f \n"),
            }
        }
        self.write_str(&table)?;

        let mut dict = PdfDictionary::new().with("Size", size).with("Root", trailer.root);
        if let Some(info) = trailer.info {
            dict.insert("Info", info);
        }
        if let Some(id) = trailer.id {
            dict.insert(
                "ID",
                PdfObject::Array(vec![PdfString::hex(id.to_vec()).into(), PdfString::hex(id.to_vec()).into()]),
            );
        }

        self.write_str("trailer\n")?;
        let bytes = to_bytes(&dict.into(), self.string_mode);
        self.write_bytes(&bytes)?;
        self.write_str(&format!("\nstartxref\n{}\n%%EOF\n", xref_offset))
    }

    /// Flush and return the inner writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn in_container(&self) -> bool {
        matches!(self.open.last(), Some(Open::Dictionary) | Some(Open::Array))
    }
}

fn same_kind(a: Open, b: Open) -> bool {
    std::mem::discriminant(&a) == std::mem::discriminant(&b)
}
