//! Data sources addressable by id from templates

use crate::{BindingError, BindingPath, BindingValue, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where a data source reads its content from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOrigin {
    /// Content held in memory
    Text(String),
    /// Content read from a file when the source is loaded
    File(PathBuf),
}

impl DataOrigin {
    fn read_to_string(&self) -> Result<String> {
        match self {
            DataOrigin::Text(text) => Ok(text.clone()),
            DataOrigin::File(path) => Ok(std::fs::read_to_string(path)?),
        }
    }
}

/// A named provider of bound data
pub trait DataSource: fmt::Debug {
    /// Identifier templates use to reference this source
    fn id(&self) -> &str;

    /// Read the content. Called during the load stage; calling again reloads.
    fn load(&mut self) -> Result<()>;

    /// Whether [`DataSource::load`] has completed
    fn is_loaded(&self) -> bool;

    /// The loaded data
    fn data(&self) -> Result<Rc<BindingValue>>;

    /// The loaded data narrowed by a selector path
    fn select(&self, selector: Option<&BindingPath>) -> Result<Rc<BindingValue>> {
        let data = self.data()?;
        Ok(match selector {
            Some(path) => Rc::new(path.evaluate_on(&data)),
            None => data,
        })
    }
}

/// A data source holding a value built in code
#[derive(Debug, Clone)]
pub struct InlineDataSource {
    id: String,
    value: Rc<BindingValue>,
}

impl InlineDataSource {
    pub fn new(id: impl Into<String>, value: impl Into<BindingValue>) -> Self {
        Self {
            id: id.into(),
            value: Rc::new(value.into()),
        }
    }
}

impl DataSource for InlineDataSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn data(&self) -> Result<Rc<BindingValue>> {
        Ok(Rc::clone(&self.value))
    }
}

/// A data source parsed from JSON text
#[derive(Debug, Clone)]
pub struct JsonDataSource {
    id: String,
    origin: DataOrigin,
    data: Option<Rc<BindingValue>>,
}

impl JsonDataSource {
    pub fn from_text(id: impl Into<String>, json: impl Into<String>) -> Self {
        Self::new(id, DataOrigin::Text(json.into()))
    }

    pub fn from_file(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(id, DataOrigin::File(path.as_ref().to_path_buf()))
    }

    pub fn new(id: impl Into<String>, origin: DataOrigin) -> Self {
        Self {
            id: id.into(),
            origin,
            data: None,
        }
    }
}

impl DataSource for JsonDataSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&mut self) -> Result<()> {
        let text = self.origin.read_to_string()?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        self.data = Some(Rc::new(BindingValue::from(json)));
        tracing::debug!(source = %self.id, "loaded JSON data source");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    fn data(&self) -> Result<Rc<BindingValue>> {
        self.data
            .clone()
            .ok_or_else(|| BindingError::DataSourceNotLoaded(self.id.clone()))
    }
}

/// A data source parsed from delimited text.
///
/// Loads as a sequence with one map per row, keyed by the header names
/// (`Column1`, `Column2`, ... without a header row). Cells are typed with
/// [`BindingValue::parse_auto`].
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    id: String,
    origin: DataOrigin,
    delimiter: u8,
    has_header: bool,
    data: Option<Rc<BindingValue>>,
}

impl CsvDataSource {
    pub fn from_text(id: impl Into<String>, csv: impl Into<String>) -> Self {
        Self::new(id, DataOrigin::Text(csv.into()))
    }

    pub fn from_file(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(id, DataOrigin::File(path.as_ref().to_path_buf()))
    }

    pub fn new(id: impl Into<String>, origin: DataOrigin) -> Self {
        Self {
            id: id.into(),
            origin,
            delimiter: b',',
            has_header: true,
            data: None,
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether the first row holds column names
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    fn parse_reader<R: Read>(&self, reader: R) -> Result<BindingValue> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut headers: Vec<String> = if self.has_header {
            csv_reader.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header) {
                tracing::warn!(source = %self.id, column = %header, "duplicate CSV column, later values win");
            }
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            while headers.len() < record.len() {
                headers.push(format!("Column{}", headers.len() + 1));
            }

            let row: BTreeMap<String, BindingValue> = record
                .iter()
                .zip(&headers)
                .map(|(field, header)| (header.clone(), BindingValue::parse_auto(field)))
                .collect();
            rows.push(BindingValue::Map(row));
        }

        Ok(BindingValue::Sequence(rows))
    }
}

impl DataSource for CsvDataSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&mut self) -> Result<()> {
        let value = match &self.origin {
            DataOrigin::File(path) => self.parse_reader(std::fs::File::open(path)?)?,
            DataOrigin::Text(text) => self.parse_reader(text.as_bytes())?,
        };
        tracing::debug!(source = %self.id, rows = value.len(), "loaded CSV data source");
        self.data = Some(Rc::new(value));
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    fn data(&self) -> Result<Rc<BindingValue>> {
        self.data
            .clone()
            .ok_or_else(|| BindingError::DataSourceNotLoaded(self.id.clone()))
    }
}

/// The data sources registered with a document
#[derive(Debug, Default)]
pub struct DataSourceCollection {
    sources: Vec<Box<dyn DataSource>>,
}

impl DataSourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any source with the same id
    pub fn add(&mut self, source: impl DataSource + 'static) {
        let id = source.id().to_string();
        self.sources.retain(|s| s.id() != id);
        self.sources.push(Box::new(source));
    }

    pub fn get(&self, id: &str) -> Option<&dyn DataSource> {
        self.sources.iter().find(|s| s.id() == id).map(|s| s.as_ref())
    }

    /// Load every source in registration order
    pub fn load_all(&mut self) -> Result<()> {
        for source in &mut self.sources {
            source.load()?;
        }
        Ok(())
    }

    /// Every source, for loading one at a time
    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut (dyn DataSource + 'static)> {
        self.sources.iter_mut().map(|s| s.as_mut())
    }

    /// The data of a source, narrowed by an optional selector
    pub fn select(&self, id: &str, selector: Option<&BindingPath>) -> Result<Rc<BindingValue>> {
        self.get(id)
            .ok_or_else(|| BindingError::DataSourceNotFound(id.to_string()))?
            .select(selector)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_json_source() {
        let mut source = JsonDataSource::from_text("orders", r#"{"orders": [{"id": 1}, {"id": 2}]}"#);
        assert!(matches!(source.data(), Err(BindingError::DataSourceNotLoaded(_))));

        source.load().unwrap();
        let path = BindingPath::parse("orders").unwrap();
        let orders = source.select(Some(&path)).unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn test_csv_source_rows() {
        let mut source = CsvDataSource::from_text("people", "name,age\nAlice,30\nBob,25\n");
        source.load().unwrap();

        let data = source.data().unwrap();
        assert_eq!(data.len(), 2);
        let first = data.item(0).unwrap();
        assert_eq!(first.member("name"), Some(BindingValue::from("Alice")));
        assert_eq!(first.member("age"), Some(BindingValue::Number(30.0)));
    }

    #[test]
    fn test_csv_without_header() {
        let mut source = CsvDataSource::from_text("raw", "a;b\nc;d").with_delimiter(b';').with_header(false);
        source.load().unwrap();
        let data = source.data().unwrap();
        assert_eq!(data.item(1).unwrap().member("Column2"), Some(BindingValue::from("d")));
    }

    #[test]
    fn test_csv_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "city,total").unwrap();
        writeln!(file, "Boston,12").unwrap();

        let mut source = CsvDataSource::from_file("cities", file.path());
        source.load().unwrap();
        assert_eq!(source.data().unwrap().len(), 1);
    }

    #[test]
    fn test_collection() {
        let mut sources = DataSourceCollection::new();
        sources.add(InlineDataSource::new("inline", vec![1, 2, 3]));
        sources.add(JsonDataSource::from_text("json", "[true]"));
        sources.load_all().unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources.select("inline", None).unwrap().len(), 3);
        assert!(matches!(
            sources.select("missing", None),
            Err(BindingError::DataSourceNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_json_fails_load() {
        let mut source = JsonDataSource::from_text("bad", "{not json");
        assert!(matches!(source.load(), Err(BindingError::JsonParse(_))));
    }
}
