//! Collected trace log
//!
//! Every entry is forwarded to `tracing` and, when at or above the record
//! level, kept so it can be inspected after generation or appended to the
//! output as a second document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Debug,
    Verbose,
    #[default]
    Message,
    Warning,
    Error,
}

impl TraceLevel {
    /// Parse a level name, case-insensitively. `diagnostic` is accepted for `Debug`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" | "diagnostic" => Some(TraceLevel::Debug),
            "verbose" => Some(TraceLevel::Verbose),
            "message" | "info" => Some(TraceLevel::Message),
            "warning" | "warn" => Some(TraceLevel::Warning),
            "error" | "errors" => Some(TraceLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceLevel::Debug => "Debug",
            TraceLevel::Verbose => "Verbose",
            TraceLevel::Message => "Message",
            TraceLevel::Warning => "Warning",
            TraceLevel::Error => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub level: TraceLevel,
    pub category: String,
    pub message: String,
    /// Nesting of begin/end scopes when the entry was added
    pub depth: usize,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} [{}] {}: {}",
            "  ".repeat(self.depth),
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.category,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    record_level: TraceLevel,
    entries: Vec<TraceEntry>,
    depth: usize,
}

impl TraceLog {
    pub fn new(record_level: TraceLevel) -> Self {
        Self {
            record_level,
            ..Default::default()
        }
    }

    pub fn record_level(&self) -> TraceLevel {
        self.record_level
    }

    pub fn set_record_level(&mut self, level: TraceLevel) {
        self.record_level = level;
    }

    pub fn should_record(&self, level: TraceLevel) -> bool {
        level >= self.record_level
    }

    pub fn add(&mut self, level: TraceLevel, category: &str, message: impl Into<String>) {
        let message = message.into();
        match level {
            TraceLevel::Debug => tracing::trace!(category, "{}", message),
            TraceLevel::Verbose => tracing::debug!(category, "{}", message),
            TraceLevel::Message => tracing::info!(category, "{}", message),
            TraceLevel::Warning => tracing::warn!(category, "{}", message),
            TraceLevel::Error => tracing::error!(category, "{}", message),
        }
        self.record(level, category, message);
    }

    /// Keep an entry without forwarding it, for events already logged where they happened
    pub fn record(&mut self, level: TraceLevel, category: &str, message: impl Into<String>) {
        let message = message.into();
        if self.should_record(level) {
            self.entries.push(TraceEntry {
                level,
                category: category.to_string(),
                message,
                depth: self.depth,
                timestamp: Utc::now(),
            });
        }
    }

    /// Open a nested scope; entries added until the matching [`TraceLog::end`] are indented
    pub fn begin(&mut self, level: TraceLevel, category: &str, message: impl Into<String>) {
        self.add(level, category, message);
        self.depth += 1;
    }

    pub fn end(&mut self, level: TraceLevel, category: &str, message: impl Into<String>) {
        self.depth = self.depth.saturating_sub(1);
        self.add(level, category, message);
    }

    pub fn warn(&mut self, category: &str, message: impl Into<String>) {
        self.add(TraceLevel::Warning, category, message);
    }

    pub fn error(&mut self, category: &str, message: impl Into<String>) {
        self.add(TraceLevel::Error, category, message);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn entries_at(&self, level: TraceLevel) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.level == level)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_below_record_level_are_not_kept() {
        let mut log = TraceLog::new(TraceLevel::Warning);
        log.add(TraceLevel::Message, "Binding", "bound 3 items");
        log.warn("Fonts", "substituted Helvetica");
        log.error("Fonts", "fell back to Courier");

        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries_at(TraceLevel::Error).count(), 1);
    }

    #[test]
    fn test_scopes_indent_entries() {
        let mut log = TraceLog::new(TraceLevel::Debug);
        log.begin(TraceLevel::Verbose, "Document", "init");
        log.add(TraceLevel::Debug, "Document", "page 1");
        log.end(TraceLevel::Verbose, "Document", "init done");

        let depths: Vec<_> = log.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 0]);
    }

    #[test]
    fn test_level_names() {
        assert_eq!(TraceLevel::from_name("Diagnostic"), Some(TraceLevel::Debug));
        assert_eq!(TraceLevel::from_name("WARNING"), Some(TraceLevel::Warning));
        assert_eq!(TraceLevel::from_name("loud"), None);
    }
}
