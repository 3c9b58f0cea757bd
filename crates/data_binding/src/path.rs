//! Binding paths resolved against the data context
//!
//! Supported forms:
//! - `.` or empty: the current value on the data stack
//! - `name.child[2].leaf`: members and positions below the current value
//! - `$index` / `$key`: the enumeration cursor
//! - `@item.child`: a named value from the item collection, then members below it

use crate::{BindingError, BindingValue, DataContext, Result};
use std::fmt;
use std::str::FromStr;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Named member of a map or structured object
    Member(String),
    /// Position in a sequence
    Index(usize),
}

/// A parsed binding path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingPath {
    /// Walk from the current data value
    Data(Vec<PathSegment>),
    /// Walk from a named item
    Item { name: String, segments: Vec<PathSegment> },
    /// The current enumeration index
    CurrentIndex,
    /// The current enumeration key
    CurrentKey,
}

impl BindingPath {
    /// The path naming the current value
    pub fn current() -> Self {
        BindingPath::Data(Vec::new())
    }

    /// Parse a path expression
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();

        if trimmed.is_empty() || trimmed == "." {
            return Ok(BindingPath::current());
        }

        if let Some(cursor) = trimmed.strip_prefix('$') {
            return match cursor {
                "index" => Ok(BindingPath::CurrentIndex),
                "key" => Ok(BindingPath::CurrentKey),
                _ => Err(invalid(text, "unknown cursor name")),
            };
        }

        if let Some(rest) = trimmed.strip_prefix('@') {
            let mut segments = parse_segments(text, rest)?.into_iter();
            return match segments.next() {
                Some(PathSegment::Member(name)) => Ok(BindingPath::Item {
                    name,
                    segments: segments.collect(),
                }),
                _ => Err(invalid(text, "an item path must start with a name")),
            };
        }

        let rest = trimmed.strip_prefix('.').unwrap_or(trimmed);
        Ok(BindingPath::Data(parse_segments(text, rest)?))
    }

    /// Resolve the path. Missing members resolve to `Null`.
    pub fn evaluate(&self, context: &DataContext) -> BindingValue {
        match self {
            BindingPath::CurrentIndex => BindingValue::from(context.current_index()),
            BindingPath::CurrentKey => BindingValue::from(context.current_key().map(str::to_string)),
            BindingPath::Data(segments) => match context.data_stack().current() {
                Some(current) => walk(current, segments),
                None => BindingValue::Null,
            },
            BindingPath::Item { name, segments } => match context.items().get(name) {
                Some(value) => walk(value, segments),
                None => BindingValue::Null,
            },
        }
    }

    /// Resolve a data path below an explicit value rather than the data stack.
    /// Cursor and item paths have nothing to walk and resolve to `Null`.
    pub fn evaluate_on(&self, value: &BindingValue) -> BindingValue {
        match self {
            BindingPath::Data(segments) => walk(value, segments),
            _ => BindingValue::Null,
        }
    }
}

fn walk(start: &BindingValue, segments: &[PathSegment]) -> BindingValue {
    let Some((first, rest)) = segments.split_first() else {
        return start.clone();
    };

    let next = match first {
        PathSegment::Member(name) => start.member(name),
        PathSegment::Index(index) => start.item(*index),
    };

    match next {
        Some(value) => walk(&value, rest),
        None => BindingValue::Null,
    }
}

fn parse_segments(original: &str, text: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    if text.is_empty() {
        return Ok(segments);
    }

    for part in text.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if name.is_empty() && rest.is_empty() {
            return Err(invalid(original, "empty path segment"));
        }

        if !name.is_empty() {
            if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                return Err(invalid(original, "member names may only contain letters, digits, '_' and '-'"));
            }
            segments.push(PathSegment::Member(name.to_string()));
        }

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .filter(|_| rest.starts_with('['))
                .ok_or_else(|| invalid(original, "unbalanced index brackets"))?;
            let index = rest[1..close]
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(original, "index must be a non-negative integer"))?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
        }
    }

    Ok(segments)
}

fn invalid(path: &str, reason: &str) -> BindingError {
    BindingError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for BindingPath {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self> {
        BindingPath::parse(s)
    }
}

impl fmt::Display for BindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[PathSegment], mut first: bool) -> fmt::Result {
            for segment in segments {
                match segment {
                    PathSegment::Member(name) => {
                        if !first {
                            write!(f, ".")?;
                        }
                        write!(f, "{}", name)?;
                    }
                    PathSegment::Index(i) => write!(f, "[{}]", i)?,
                }
                first = false;
            }
            Ok(())
        }

        match self {
            BindingPath::CurrentIndex => write!(f, "$index"),
            BindingPath::CurrentKey => write!(f, "$key"),
            BindingPath::Data(segments) if segments.is_empty() => write!(f, "."),
            BindingPath::Data(segments) => write_segments(f, segments, true),
            BindingPath::Item { name, segments } => {
                write!(f, "@{}", name)?;
                write_segments(f, segments, false)
            }
        }
    }
}
