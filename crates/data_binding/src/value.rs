//! Bound values and their enumeration shape

use chrono::NaiveDate;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

/// A value that can sit on the data stack and be bound into components.
///
/// `Map` holds dictionary-like data built in code or read from a CSV row,
/// `Object` holds a structured value parsed from JSON and kept in its
/// original form so property expansion walks the fields as they were written.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BindingValue {
    /// No value
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// Numeric value
    Number(f64),
    /// Date value
    Date(NaiveDate),
    /// Text value
    Text(String),
    /// Ordered sequence of values
    Sequence(Vec<BindingValue>),
    /// Key/value map
    Map(BTreeMap<String, BindingValue>),
    /// Structured object (parsed JSON)
    Object(JsonMap<String, JsonValue>),
}

/// The shape a bound value presents to the enumerator selection.
///
/// Resolved once per value; the variants are listed in dispatch precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// Nothing bound
    Empty,
    /// A text value, never walked character by character
    Text,
    /// Dictionary-like value
    Map,
    /// Structured object value
    Structured,
    /// Generic sequence
    Sequence,
    /// Any other single value (number, boolean, date)
    Scalar,
}

impl BindingValue {
    /// Resolve the enumeration shape of this value
    pub fn shape(&self) -> ValueShape {
        match self {
            BindingValue::Null => ValueShape::Empty,
            BindingValue::Text(_) => ValueShape::Text,
            BindingValue::Map(_) => ValueShape::Map,
            BindingValue::Object(_) => ValueShape::Structured,
            BindingValue::Sequence(_) => ValueShape::Sequence,
            BindingValue::Boolean(_) | BindingValue::Number(_) | BindingValue::Date(_) => {
                ValueShape::Scalar
            }
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, BindingValue::Null)
    }

    /// Convert to the text shown when the value is bound into content
    pub fn to_display_string(&self) -> String {
        match self {
            BindingValue::Null => String::new(),
            BindingValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            BindingValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            BindingValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            BindingValue::Text(s) => s.clone(),
            BindingValue::Sequence(items) => items
                .iter()
                .map(|v| v.to_display_string())
                .collect::<Vec<_>>()
                .join(", "),
            BindingValue::Map(map) => format!("{{{} entries}}", map.len()),
            BindingValue::Object(map) => JsonValue::Object(map.clone()).to_string(),
        }
    }

    /// Try to get as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BindingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            BindingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            BindingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a named member of a map or structured object
    pub fn member(&self, name: &str) -> Option<BindingValue> {
        match self {
            BindingValue::Map(map) => map.get(name).cloned(),
            BindingValue::Object(map) => map.get(name).cloned().map(BindingValue::from),
            _ => None,
        }
    }

    /// Look up an item of a sequence by position
    pub fn item(&self, index: usize) -> Option<BindingValue> {
        match self {
            BindingValue::Sequence(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    /// Number of items, entries or fields held by the value
    pub fn len(&self) -> usize {
        match self {
            BindingValue::Null => 0,
            BindingValue::Sequence(items) => items.len(),
            BindingValue::Map(map) => map.len(),
            BindingValue::Object(map) => map.len(),
            _ => 1,
        }
    }

    /// Check if the value holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a raw text cell with automatic type detection
    pub fn parse_auto(s: &str) -> BindingValue {
        let trimmed = s.trim();

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            return BindingValue::Null;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return BindingValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return BindingValue::Boolean(false);
        }

        if let Some(date) = try_parse_date(trimmed) {
            return BindingValue::Date(date);
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            return BindingValue::Number(n);
        }

        BindingValue::Text(s.to_string())
    }
}

fn try_parse_date(s: &str) -> Option<NaiveDate> {
    let formats = ["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%d %b %Y", "%B %d, %Y"];

    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

impl std::fmt::Display for BindingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<JsonValue> for BindingValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => BindingValue::Null,
            JsonValue::Bool(b) => BindingValue::Boolean(b),
            JsonValue::Number(n) => n.as_f64().map(BindingValue::Number).unwrap_or_default(),
            JsonValue::String(s) => BindingValue::Text(s),
            JsonValue::Array(items) => {
                BindingValue::Sequence(items.into_iter().map(BindingValue::from).collect())
            }
            JsonValue::Object(map) => BindingValue::Object(map),
        }
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        BindingValue::Text(s)
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        BindingValue::Text(s.to_string())
    }
}

impl From<f64> for BindingValue {
    fn from(n: f64) -> Self {
        BindingValue::Number(n)
    }
}

impl From<i32> for BindingValue {
    fn from(n: i32) -> Self {
        BindingValue::Number(n as f64)
    }
}

impl From<i64> for BindingValue {
    fn from(n: i64) -> Self {
        BindingValue::Number(n as f64)
    }
}

impl From<usize> for BindingValue {
    fn from(n: usize) -> Self {
        BindingValue::Number(n as f64)
    }
}

impl From<bool> for BindingValue {
    fn from(b: bool) -> Self {
        BindingValue::Boolean(b)
    }
}

impl From<NaiveDate> for BindingValue {
    fn from(d: NaiveDate) -> Self {
        BindingValue::Date(d)
    }
}

impl<T: Into<BindingValue>> From<Vec<T>> for BindingValue {
    fn from(items: Vec<T>) -> Self {
        BindingValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, BindingValue>> for BindingValue {
    fn from(map: BTreeMap<String, BindingValue>) -> Self {
        BindingValue::Map(map)
    }
}

impl<T: Into<BindingValue>> From<Option<T>> for BindingValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => BindingValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_precedence() {
        assert_eq!(BindingValue::Null.shape(), ValueShape::Empty);
        assert_eq!(BindingValue::from("abc").shape(), ValueShape::Text);
        assert_eq!(BindingValue::from(vec![1, 2]).shape(), ValueShape::Sequence);
        assert_eq!(BindingValue::from(json!({"a": 1})).shape(), ValueShape::Structured);
        assert_eq!(BindingValue::Map(BTreeMap::new()).shape(), ValueShape::Map);
        assert_eq!(BindingValue::from(3.5).shape(), ValueShape::Scalar);
    }

    #[test]
    fn test_json_conversion_keeps_objects_structured() {
        let value = BindingValue::from(json!([{"name": "Alice"}, {"name": "Bob"}]));
        let first = value.item(0).unwrap();
        assert_eq!(first.shape(), ValueShape::Structured);
        assert_eq!(first.member("name"), Some(BindingValue::from("Alice")));
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(BindingValue::from(42).to_display_string(), "42");
        assert_eq!(BindingValue::from(2.5).to_display_string(), "2.5");
        assert_eq!(BindingValue::Null.to_display_string(), "");
        assert_eq!(BindingValue::from(vec!["a", "b"]).to_display_string(), "a, b");
    }

    #[test]
    fn test_parse_auto() {
        assert_eq!(BindingValue::parse_auto("12"), BindingValue::Number(12.0));
        assert_eq!(BindingValue::parse_auto("TRUE"), BindingValue::Boolean(true));
        assert!(matches!(BindingValue::parse_auto("2024-01-15"), BindingValue::Date(_)));
        assert_eq!(BindingValue::parse_auto(""), BindingValue::Null);
        assert_eq!(BindingValue::parse_auto("Boston"), BindingValue::from("Boston"));
    }
}
