//! Highlight Notebook
//!
//! Persists user-saved highlights as one ordered list inside a key-value
//! record store. Two writers share the list: single appends from the
//! selection router and full replacement from the notebook editor.

use crate::error::{PanelError, PanelResult};
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Record key holding the highlight list
pub const HIGHLIGHTS_KEY: &str = "highlights";

/// Shown instead of the editor when nothing has been saved
pub const EMPTY_PLACEHOLDER: &str = "No saved highlights yet.";

/// Separator between highlights in the editable block
const BLOCK_SEPARATOR: &str = "\n\n";

lazy_static! {
    static ref BLOCK_SPLIT: Regex = Regex::new(r"\n{2,}").expect("valid block regex");
}

/// A saved excerpt of page text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// ISO-8601 timestamp assigned at write time
    pub date: String,
}

impl Highlight {
    /// Build a highlight from a page selection. Returns `None` when the
    /// selection is blank.
    pub fn from_selection(
        text: &str,
        url: Option<&str>,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            url: url.map(str::to_string),
            title: title.map(str::to_string),
            date: iso_timestamp(now),
        })
    }
}

/// Format a timestamp like `2024-05-01T12:00:00.000Z`
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Key-value storage for named JSON records
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> PanelResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> PanelResult<()>;
}

/// All records in one pretty-printed JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> PanelResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(PanelError::Storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, key: &str) -> PanelResult<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> PanelResult<()> {
        let mut records = self.read_all()?;
        records.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(records))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> PanelResult<Option<Value>> {
        Ok(self.records.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> PanelResult<()> {
        self.records.lock()?.insert(key.to_string(), value);
        Ok(())
    }
}

/// What the notebook editor should show
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightsView {
    /// Nothing saved: show the placeholder, editing and export disabled
    Empty(&'static str),
    /// All highlight texts joined by blank lines, editable and exportable
    Editable(String),
}

impl HighlightsView {
    pub fn text(&self) -> &str {
        match self {
            HighlightsView::Empty(placeholder) => placeholder,
            HighlightsView::Editable(text) => text,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, HighlightsView::Editable(_))
    }
}

/// Read/write access to the persisted highlight list
#[derive(Debug)]
pub struct HighlightNotebook<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> HighlightNotebook<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full list, oldest first. A missing record reads as empty.
    pub fn load(&self) -> PanelResult<Vec<Highlight>> {
        match self.store.get(HIGHLIGHTS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, highlights: &[Highlight]) -> PanelResult<()> {
        self.store
            .set(HIGHLIGHTS_KEY, serde_json::to_value(highlights)?)
    }

    /// Read-modify-write append of one highlight
    pub fn append(&self, highlight: Highlight) -> PanelResult<usize> {
        let mut highlights = self.load()?;
        highlights.push(highlight);
        self.write(&highlights)?;
        info!("✅ Highlight saved ({} total)", highlights.len());
        Ok(highlights.len())
    }

    /// Replace the whole list with the blocks of an edited text.
    ///
    /// Blocks are separated by two or more consecutive newlines. Every
    /// entry gets the same `now` timestamp and loses its url/title.
    pub fn replace_from_text(&self, text: &str, now: DateTime<Utc>) -> PanelResult<Vec<Highlight>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PanelError::EmptyInput("Text cannot be empty.".to_string()));
        }

        let date = iso_timestamp(now);
        let highlights: Vec<Highlight> = split_blocks(text)
            .into_iter()
            .map(|block| Highlight {
                text: block,
                url: None,
                title: None,
                date: date.clone(),
            })
            .collect();

        self.write(&highlights)?;
        info!("✅ Highlights updated ({} entries)", highlights.len());
        Ok(highlights)
    }

    /// Current list rendered for the editor
    pub fn display(&self) -> PanelResult<HighlightsView> {
        let highlights = self.load()?;
        debug!("📖 Rendering {} highlights", highlights.len());
        if highlights.is_empty() {
            return Ok(HighlightsView::Empty(EMPTY_PLACEHOLDER));
        }
        Ok(HighlightsView::Editable(join_blocks(&highlights)))
    }
}

/// Split edited text into trimmed, non-empty blocks
pub fn split_blocks(text: &str) -> Vec<String> {
    // Tolerate CRLF from pasted text
    let normalized = text.replace("\r\n", "\n");
    BLOCK_SPLIT
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_blocks(highlights: &[Highlight]) -> String {
    highlights
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn notebook() -> HighlightNotebook<MemoryStore> {
        HighlightNotebook::new(MemoryStore::new())
    }

    #[test]
    fn test_iso_timestamp_format() {
        assert_eq!(iso_timestamp(at(0)), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_from_selection_trims_and_rejects_blank() {
        let h = Highlight::from_selection("  Quote me \n", Some("https://x.test"), None, at(0))
            .unwrap();
        assert_eq!(h.text, "Quote me");
        assert!(Highlight::from_selection(" \n\t", None, None, at(0)).is_none());
    }

    #[test]
    fn test_append_preserves_order() {
        let nb = notebook();
        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            let h = Highlight::from_selection(text, None, None, at(i as i64)).unwrap();
            assert_eq!(nb.append(h).unwrap(), i + 1);
        }
        let texts: Vec<_> = nb.load().unwrap().into_iter().map(|h| h.text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_serialized_highlight_omits_absent_fields() {
        let h = Highlight::from_selection("x", None, None, at(0)).unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert!(!json.contains("url"));
        assert!(!json.contains("title"));
    }

    #[test]
    fn test_split_blocks() {
        let blocks = split_blocks("one\nstill one\n\ntwo\n\n\n\nthree\r\n\r\nfour");
        assert_eq!(blocks, vec!["one\nstill one", "two", "three", "four"]);
    }

    #[test]
    fn test_replace_from_text_overwrites() {
        let nb = notebook();
        let h = Highlight::from_selection("old", Some("https://x.test"), Some("Old"), at(0))
            .unwrap();
        nb.append(h).unwrap();

        let saved = nb.replace_from_text("alpha\n\nbeta\n\n\ngamma", at(60)).unwrap();
        assert_eq!(saved.len(), 3);

        let stored = nb.load().unwrap();
        assert_eq!(stored, saved);
        assert!(stored.iter().all(|h| h.date == iso_timestamp(at(60))));
        assert!(stored.iter().all(|h| h.url.is_none() && h.title.is_none()));
    }

    #[test]
    fn test_replace_rejects_empty_without_touching_store() {
        let nb = notebook();
        nb.append(Highlight::from_selection("keep", None, None, at(0)).unwrap())
            .unwrap();

        let err = nb.replace_from_text("  \n\n ", at(1)).unwrap_err();
        assert!(matches!(err, PanelError::EmptyInput(_)));
        assert_eq!(nb.load().unwrap().len(), 1);
    }

    #[test]
    fn test_display_empty_and_editable() {
        let nb = notebook();
        let view = nb.display().unwrap();
        assert_eq!(view, HighlightsView::Empty(EMPTY_PLACEHOLDER));
        assert!(!view.is_editable());

        nb.append(Highlight::from_selection("a", None, None, at(0)).unwrap())
            .unwrap();
        nb.append(Highlight::from_selection("b", None, None, at(1)).unwrap())
            .unwrap();
        let view = nb.display().unwrap();
        assert_eq!(view.text(), "a\n\nb");
        assert!(view.is_editable());
    }

    #[test]
    fn test_display_round_trips_through_save() {
        let nb = notebook();
        let saved = nb.replace_from_text("  single block  ", at(0)).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].text, "single block");

        let exported = nb.display().unwrap().text().to_string();
        let resaved = nb.replace_from_text(&exported, at(5)).unwrap();
        assert_eq!(resaved.len(), 1);
        assert_eq!(resaved[0].text, "single block");
    }

    #[test]
    fn test_json_file_store_preserves_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/storage.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let nb = HighlightNotebook::new(JsonFileStore::new(&path));
        nb.append(Highlight::from_selection("persisted", None, None, at(0)).unwrap())
            .unwrap();

        let reopened = HighlightNotebook::new(JsonFileStore::new(&path));
        assert_eq!(reopened.load().unwrap()[0].text, "persisted");
        assert_eq!(
            reopened.store().get("theme").unwrap(),
            Some(Value::String("dark".to_string()))
        );
    }

    #[test]
    fn test_json_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let nb = HighlightNotebook::new(JsonFileStore::new(dir.path().join("none.json")));
        assert!(nb.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get(HIGHLIGHTS_KEY), Err(PanelError::Storage(_))));
    }
}
