/// Type definitions and readers for the Granola desktop cache.
///
/// Storage format: a single JSON file whose `cache` property is itself a
/// JSON document serialised into a string. It has to be decoded twice:
///
/// ```json
/// { "cache": "{\"version\":3,\"state\":{\"documents\":{...},\"transcripts\":{...},\"meetingsMetadata\":{...}}}" }
/// ```
///
/// All three record sets inside `state` are keyed by document id.
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, ParseStage, Result};

/// Location of the cache file relative to the user's home directory.
pub const DEFAULT_CACHE_PATH: &str = "Library/Application Support/Granola/cache-v3.json";

pub fn default_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(DEFAULT_CACHE_PATH))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One meeting record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Document {
    /// Filled from the mapping key when the record itself has no id.
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub valid_meeting: Option<bool>,
    #[serde(default)]
    pub notes_plain: Option<String>,
    #[serde(default)]
    pub notes_markdown: Option<String>,
    #[serde(default)]
    pub google_calendar_event: Option<CalendarEvent>,
}

impl Document {
    /// The stored title, or `Untitled Meeting <id>` when it is missing or blank.
    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("Untitled Meeting {}", self.id),
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_valid(&self) -> bool {
        self.valid_meeting == Some(true)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    /// Markdown notes win over plain notes; blank notes count as absent.
    pub fn notes(&self) -> Option<&str> {
        [self.notes_markdown.as_deref(), self.notes_plain.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
    }
}

/// Snapshot of the Google Calendar event a document was created from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default, deserialize_with = "nullable")]
    pub attendees: Vec<CalendarAttendee>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,
    /// Set instead of `dateTime` for all-day events.
    #[serde(default)]
    pub date: Option<String>,
}

impl EventTime {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.date.as_deref().and_then(parse_timestamp))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CalendarAttendee {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One utterance in a meeting transcript.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sequence_number: i64,
}

/// Creator and attendee information kept apart from the calendar snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub creator: Option<Person>,
    #[serde(default, deserialize_with = "nullable")]
    pub attendees: Vec<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The three record sets pulled out of the cache.
#[derive(Debug, Clone, Default)]
pub struct ParsedCache {
    pub version: Option<u64>,
    pub documents: HashMap<String, Document>,
    pub transcripts: HashMap<String, Vec<TranscriptEntry>>,
    pub metadata: HashMap<String, Metadata>,
}

/// Treat an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

// ---------------------------------------------------------------------------
// Loading and parsing
// ---------------------------------------------------------------------------

/// Read the whole cache file.
pub fn load_cache(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            debug!(path = %path.display(), bytes = raw.len(), "read cache file");
            Ok(raw)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(Error::ReadFailure {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Decode the file text, then decode the string held in its `cache` property.
pub fn parse_cache(raw: &str) -> Result<ParsedCache> {
    let outer: Value = serde_json::from_str(raw).map_err(|source| Error::ParseError {
        stage: ParseStage::Outer,
        source,
    })?;
    let payload = outer
        .get("cache")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidFormat("missing cache property".into()))?;

    let inner: Value = serde_json::from_str(payload).map_err(|source| Error::ParseError {
        stage: ParseStage::Inner,
        source,
    })?;
    let state = inner
        .get("state")
        .filter(|s| s.get("documents").is_some_and(Value::is_object))
        .ok_or_else(|| Error::InvalidFormat("missing state.documents".into()))?;

    let mut documents = HashMap::new();
    for (key, value) in record_map(state, "documents") {
        if let Some(mut doc) = decode_record::<Document>("document", key, value) {
            if doc.id.is_empty() {
                doc.id = key.clone();
            }
            documents.insert(key.clone(), doc);
        }
    }

    let mut transcripts = HashMap::new();
    for (id, value) in record_map(state, "transcripts").filter(|(_, v)| !v.is_null()) {
        let Some(items) = value.as_array() else {
            warn!(id = %id, "transcript is not a list of entries, skipping");
            continue;
        };
        let entries: Vec<TranscriptEntry> = items
            .iter()
            .filter_map(|item| decode_record("transcript entry", id, item))
            .collect();
        transcripts.insert(id.clone(), entries);
    }

    let metadata = record_map(state, "meetingsMetadata")
        .filter(|(_, v)| !v.is_null())
        .filter_map(|(id, value)| {
            decode_record::<Metadata>("metadata", id, value).map(|m| (id.clone(), m))
        })
        .collect();

    Ok(ParsedCache {
        version: inner.get("version").and_then(Value::as_u64),
        documents,
        transcripts,
        metadata,
    })
}

/// Entries of one record set under `state`; anything but an object counts as empty.
fn record_map<'a>(state: &'a Value, key: &str) -> impl Iterator<Item = (&'a String, &'a Value)> {
    state.get(key).and_then(Value::as_object).into_iter().flatten()
}

/// Records are decoded one at a time: a record of the wrong shape is
/// dropped with a warning and the rest of the cache is still exported.
fn decode_record<T: DeserializeOwned>(kind: &str, id: &str, value: &Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(kind, id, error = %e, "skipping unreadable record");
            None
        }
    }
}

/// Load and parse in one step.
pub fn read_cache(path: &Path) -> Result<ParsedCache> {
    let raw = load_cache(path)?;
    let cache = parse_cache(&raw)?;
    info!(
        documents = cache.documents.len(),
        transcripts = cache.transcripts.len(),
        metadata = cache.metadata.len(),
        version = ?cache.version,
        "parsed cache"
    );
    Ok(cache)
}
