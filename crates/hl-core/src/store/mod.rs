mod memory;

pub use memory::{MemoryEventStore, StatsSnapshot};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::event::{EventKey, EventRecord, PageId, Timestamp};

// ---------------------------------------------------------------------------
// EventCursor: lazy, one-record-per-await sequence
// ---------------------------------------------------------------------------

/// A lazy sequence of records produced by one store scan.
///
/// Every call to [`advance`](Self::advance) reads at most one record.
#[async_trait]
pub trait EventCursor: Send {
    async fn advance(&mut self) -> CoreResult<Option<EventRecord>>;
}

pub type BoxCursor = Box<dyn EventCursor>;

// ---------------------------------------------------------------------------
// OrderedEventStore
// ---------------------------------------------------------------------------

/// Read access to the two time-ordered logs (visits and bookmarks).
///
/// Every scan returns a fresh cursor. Failures are reported as
/// [`CoreReason::StoreUnavailable`](crate::error::CoreReason::StoreUnavailable).
#[async_trait]
pub trait OrderedEventStore: Send + Sync {
    /// Visits of one page, most recent first.
    async fn scan_visits_by_page(&self, page: &PageId) -> CoreResult<BoxCursor>;

    /// Visits with keys in `[low, high]`, ascending or (`reverse`) descending.
    async fn scan_visits_by_time(
        &self,
        low: EventKey,
        high: EventKey,
        reverse: bool,
    ) -> CoreResult<BoxCursor>;

    /// Bookmarks with times in `[low, high]`, ascending or (`reverse`)
    /// descending.
    async fn scan_bookmarks_by_time(
        &self,
        low: Timestamp,
        high: Timestamp,
        reverse: bool,
    ) -> CoreResult<BoxCursor>;

    /// Current bookmarks of the given pages. Pages without a bookmark are
    /// skipped.
    async fn scan_bookmarks_by_pages(&self, pages: &HashSet<PageId>) -> CoreResult<BoxCursor>;
}

// ---------------------------------------------------------------------------
// Scan: cursor with a cooperative stop predicate
// ---------------------------------------------------------------------------

/// Wraps a cursor with a stop predicate that is checked before each read.
///
/// Once the predicate returns `false` nothing more is read from the store.
pub struct Scan {
    cursor: BoxCursor,
    reads: usize,
}

impl Scan {
    pub fn new(cursor: BoxCursor) -> Self {
        Self { cursor, reads: 0 }
    }

    /// Read the next record if `proceed()` holds.
    ///
    /// Returns `Ok(None)` either when the predicate stops the scan or when
    /// the cursor is exhausted.
    pub async fn next_if<P>(&mut self, proceed: P) -> CoreResult<Option<EventRecord>>
    where
        P: FnOnce() -> bool + Send,
    {
        if !proceed() {
            return Ok(None);
        }
        let record = self.cursor.advance().await?;
        if record.is_some() {
            self.reads += 1;
        }
        Ok(record)
    }

    pub async fn next(&mut self) -> CoreResult<Option<EventRecord>> {
        self.next_if(|| true).await
    }

    /// Records read through this scan so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}
