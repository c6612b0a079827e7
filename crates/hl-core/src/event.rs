use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

// ---------------------------------------------------------------------------
// PageId
// ---------------------------------------------------------------------------

/// Stable identity of a browsed resource, typically its normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for PageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

/// One entry of either log: a page and the time it was visited or
/// bookmarked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: Timestamp,
    pub page: PageId,
}

impl EventRecord {
    pub fn new(time: Timestamp, page: impl Into<PageId>) -> Self {
        Self {
            time,
            page: page.into(),
        }
    }
}

/// A page visit. Any number per page.
pub type VisitRecord = EventRecord;
/// A bookmark. At most one current bookmark time per page.
pub type BookmarkRecord = EventRecord;

// ---------------------------------------------------------------------------
// EventKey: composite (time, page) ordering key
// ---------------------------------------------------------------------------

/// Identity component of an [`EventKey`]. `Min` and `Max` sort below and
/// above every real page, so `(t, Min)..=(t, Max)` covers all events at `t`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageBound {
    Min,
    Id(PageId),
    Max,
}

/// Composite `(time, page)` key used by the time-ordered indexes.
///
/// Ordered by time first, then by page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Timestamp,
    pub page: PageBound,
}

impl EventKey {
    /// Lowest key at `time`.
    pub fn lowest(time: Timestamp) -> Self {
        Self {
            time,
            page: PageBound::Min,
        }
    }

    /// Highest key at `time`.
    pub fn highest(time: Timestamp) -> Self {
        Self {
            time,
            page: PageBound::Max,
        }
    }

    pub fn exact(time: Timestamp, page: PageId) -> Self {
        Self {
            time,
            page: PageBound::Id(page),
        }
    }

    /// Converts back to a record. `None` for sentinel keys.
    pub fn to_record(&self) -> Option<EventRecord> {
        match &self.page {
            PageBound::Id(page) => Some(EventRecord {
                time: self.time,
                page: page.clone(),
            }),
            PageBound::Min | PageBound::Max => None,
        }
    }
}
