//! JSON Lines history log.
//!
//! One event per line:
//!
//! ```text
//! {"kind":"visit","time":1700000000000,"page":"https://example.org/"}
//! {"kind":"bookmark","time":1700000100000,"page":"https://example.org/"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. A later bookmark of
//! the same page replaces the earlier one.

use std::path::Path;

use hl_core::event::{PageId, Timestamp};
use hl_core::store::MemoryEventStore;
use orion_error::prelude::*;
use orion_error::{ErrorOwe, ErrorOweBase};
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeReason, RuntimeResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HistoryEvent {
    Visit { time: Timestamp, page: PageId },
    Bookmark { time: Timestamp, page: PageId },
}

/// A line that is not a valid history event.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct HistoryFormatError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// Parse every event in `text`, in file order.
pub fn parse_history(text: &str) -> Result<Vec<HistoryEvent>, HistoryFormatError> {
    let mut events = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| HistoryFormatError {
            line: idx + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Replay parsed events into a fresh in-memory store.
pub fn build_store(events: Vec<HistoryEvent>) -> RuntimeResult<MemoryEventStore> {
    let store = MemoryEventStore::new();
    for event in events {
        let recorded = match event {
            HistoryEvent::Visit { time, page } => store.record_visit(time, page),
            HistoryEvent::Bookmark { time, page } => store.record_bookmark(time, page),
        };
        recorded.err_conv()?;
    }
    Ok(store)
}

/// Read the history file at `path` into a [`MemoryEventStore`].
pub fn load_history(path: &Path) -> RuntimeResult<MemoryEventStore> {
    let location = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .owe_sys()
        .position(location.clone())?;
    let events = parse_history(&text)
        .owe(RuntimeReason::Bootstrap)
        .position(location)?;
    let store = build_store(events)?;
    let visits = store.visit_count().err_conv()?;
    let bookmarks = store.bookmark_count().err_conv()?;
    hl_info!(
        store,
        path = %path.display(),
        visits,
        bookmarks,
        "history loaded"
    );
    Ok(store)
}
