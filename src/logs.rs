use crate::time_util::{now_display_time, now_ms};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

/// A single diagnostic record. Entries are built once and never mutated after they enter a
/// [`LogBuffer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    id: String,
    timestamp: String,
    level: LogLevel,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            timestamp: now_display_time(),
            level,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = if details.is_null() { None } else { Some(details) };
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn from_payload(payload: &Value) -> Option<Self> {
        let message = payload.get("message").and_then(|v| v.as_str())?;
        let id = match payload.get("id") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let timestamp = payload
            .get("timestamp")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(now_display_time);
        let level = payload
            .get("level")
            .and_then(|v| v.as_str())
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info);
        let details = payload.get("details").cloned().filter(|v| !v.is_null());
        Some(Self {
            id,
            timestamp,
            level,
            message: message.to_string(),
            details,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

/// Insertion-ordered history bounded to the most recent `capacity` entries.
///
/// Every stored entry has an id distinct from all others in the buffer: entries arriving
/// without an id, or with one already present, are re-keyed from a sequence that is never reset.
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    ids: HashSet<String>,
    capacity: usize,
    next_seq: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            ids: HashSet::with_capacity(capacity + 1),
            capacity,
            next_seq: 0,
        }
    }

    pub fn append(&mut self, mut entry: LogEntry) -> &LogEntry {
        if entry.id.is_empty() || self.ids.contains(&entry.id) {
            entry.id = self.fresh_id();
        }
        self.ids.insert(entry.id.clone());
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
        &self.entries[self.entries.len() - 1]
    }

    pub fn append_synthesized(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> &LogEntry {
        let mut entry = LogEntry::new(level, message);
        if let Some(details) = details {
            entry = entry.with_details(details);
        }
        self.append(entry)
    }

    pub fn clear(&mut self) -> &LogEntry {
        self.entries.clear();
        self.ids.clear();
        self.append_synthesized(LogLevel::Info, "Logs cleared", None)
    }

    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn fresh_id(&mut self) -> String {
        loop {
            self.next_seq += 1;
            let id = format!("{}-{}", now_ms(), self.next_seq);
            if !self.ids.contains(&id) {
                return id;
            }
        }
    }
}
