use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{CoreResult, store_unavailable};
use crate::event::{EventKey, EventRecord, PageId, Timestamp};

use super::{BoxCursor, EventCursor, OrderedEventStore};

// ---------------------------------------------------------------------------
// Logs: the two ordered indexes plus per-page lookups
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Logs {
    visits: BTreeSet<EventKey>,
    visits_by_page: HashMap<PageId, BTreeSet<Timestamp>>,
    bookmarks: BTreeSet<EventKey>,
    /// Current bookmark time per page.
    bookmark_of: HashMap<PageId, Timestamp>,
}

impl Logs {
    fn insert_visit(&mut self, time: Timestamp, page: PageId) {
        self.visits_by_page
            .entry(page.clone())
            .or_default()
            .insert(time);
        self.visits.insert(EventKey::exact(time, page));
    }

    fn insert_bookmark(&mut self, time: Timestamp, page: PageId) {
        if let Some(old) = self.bookmark_of.insert(page.clone(), time) {
            self.bookmarks.remove(&EventKey::exact(old, page.clone()));
        }
        self.bookmarks.insert(EventKey::exact(time, page));
    }

    fn remove_bookmark(&mut self, page: &PageId) -> Option<Timestamp> {
        let old = self.bookmark_of.remove(page)?;
        self.bookmarks.remove(&EventKey::exact(old, page.clone()));
        Some(old)
    }
}

struct Shared {
    logs: RwLock<Logs>,
    available: AtomicBool,
    scans_opened: AtomicUsize,
    records_read: AtomicUsize,
}

impl Shared {
    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Logs>> {
        if !self.available.load(Ordering::Acquire) {
            return Err(store_unavailable("memory store is offline"));
        }
        self.inspect()
    }

    /// Read access for diagnostics; ignores the offline switch.
    fn inspect(&self) -> CoreResult<RwLockReadGuard<'_, Logs>> {
        self.logs
            .read()
            .map_err(|_| store_unavailable("history lock poisoned"))
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Logs>> {
        self.logs
            .write()
            .map_err(|_| store_unavailable("history lock poisoned"))
    }

    /// Called on every scan open; fails fast when the store is offline.
    fn open_scan(&self) -> CoreResult<()> {
        drop(self.read()?);
        self.scans_opened.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn count_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// MemoryEventStore
// ---------------------------------------------------------------------------

/// Point-in-time counters of store activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub scans_opened: usize,
    pub records_read: usize,
}

/// In-process [`OrderedEventStore`] backed by ordered `BTreeSet` indexes.
///
/// Cursors never copy a log: each `advance()` re-seeks from the last key it
/// returned, so a scan costs one `O(log n)` lookup per record read.
/// Cloning the store is cheap and shares the underlying logs.
#[derive(Clone)]
pub struct MemoryEventStore {
    shared: Arc<Shared>,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventStore")
            .field("visits", &self.visit_count().ok())
            .field("bookmarks", &self.bookmark_count().ok())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::from_logs(Logs::default())
    }

    fn from_logs(logs: Logs) -> Self {
        Self {
            shared: Arc::new(Shared {
                logs: RwLock::new(logs),
                available: AtomicBool::new(true),
                scans_opened: AtomicUsize::new(0),
                records_read: AtomicUsize::new(0),
            }),
        }
    }

    /// Build a store from literal `(time, page)` pairs.
    pub fn with_events<'a>(
        visits: impl IntoIterator<Item = (Timestamp, &'a str)>,
        bookmarks: impl IntoIterator<Item = (Timestamp, &'a str)>,
    ) -> Self {
        let mut logs = Logs::default();
        for (time, page) in visits {
            logs.insert_visit(time, PageId::from(page));
        }
        for (time, page) in bookmarks {
            logs.insert_bookmark(time, PageId::from(page));
        }
        Self::from_logs(logs)
    }

    pub fn record_visit(&self, time: Timestamp, page: PageId) -> CoreResult<()> {
        self.shared.write()?.insert_visit(time, page);
        Ok(())
    }

    /// Set the page's bookmark time, replacing any earlier bookmark.
    pub fn record_bookmark(&self, time: Timestamp, page: PageId) -> CoreResult<()> {
        self.shared.write()?.insert_bookmark(time, page);
        Ok(())
    }

    pub fn remove_bookmark(&self, page: &PageId) -> CoreResult<Option<Timestamp>> {
        Ok(self.shared.write()?.remove_bookmark(page))
    }

    pub fn visit_count(&self) -> CoreResult<usize> {
        Ok(self.shared.inspect()?.visits.len())
    }

    pub fn bookmark_count(&self) -> CoreResult<usize> {
        Ok(self.shared.inspect()?.bookmarks.len())
    }

    pub fn bookmark_time(&self, page: &PageId) -> CoreResult<Option<Timestamp>> {
        Ok(self.shared.inspect()?.bookmark_of.get(page).copied())
    }

    /// Take the store offline (`false`) or back online. While offline every
    /// scan open and every cursor read fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::Release);
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            scans_opened: self.shared.scans_opened.load(Ordering::Relaxed),
            records_read: self.shared.records_read.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.shared.scans_opened.store(0, Ordering::Relaxed);
        self.shared.records_read.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl OrderedEventStore for MemoryEventStore {
    async fn scan_visits_by_page(&self, page: &PageId) -> CoreResult<BoxCursor> {
        self.shared.open_scan()?;
        Ok(Box::new(PageVisitsCursor {
            shared: Arc::clone(&self.shared),
            page: page.clone(),
            upper: Bound::Unbounded,
            done: false,
        }))
    }

    async fn scan_visits_by_time(
        &self,
        low: EventKey,
        high: EventKey,
        reverse: bool,
    ) -> CoreResult<BoxCursor> {
        self.shared.open_scan()?;
        Ok(Box::new(KeyRangeCursor::new(
            Arc::clone(&self.shared),
            Index::Visits,
            low,
            high,
            reverse,
        )))
    }

    async fn scan_bookmarks_by_time(
        &self,
        low: Timestamp,
        high: Timestamp,
        reverse: bool,
    ) -> CoreResult<BoxCursor> {
        self.shared.open_scan()?;
        Ok(Box::new(KeyRangeCursor::new(
            Arc::clone(&self.shared),
            Index::Bookmarks,
            EventKey::lowest(low),
            EventKey::highest(high),
            reverse,
        )))
    }

    async fn scan_bookmarks_by_pages(&self, pages: &HashSet<PageId>) -> CoreResult<BoxCursor> {
        self.shared.open_scan()?;
        let mut pending: Vec<PageId> = pages.iter().cloned().collect();
        pending.sort();
        Ok(Box::new(PageBookmarksCursor {
            shared: Arc::clone(&self.shared),
            pending: pending.into(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Index {
    Visits,
    Bookmarks,
}

/// Range scan over one of the `(time, page)` indexes.
struct KeyRangeCursor {
    shared: Arc<Shared>,
    index: Index,
    low: Bound<EventKey>,
    high: Bound<EventKey>,
    reverse: bool,
    done: bool,
}

impl KeyRangeCursor {
    fn new(
        shared: Arc<Shared>,
        index: Index,
        low: EventKey,
        high: EventKey,
        reverse: bool,
    ) -> Self {
        // BTreeSet::range panics on an inverted range.
        let done = low > high;
        Self {
            shared,
            index,
            low: Bound::Included(low),
            high: Bound::Included(high),
            reverse,
            done,
        }
    }
}

#[async_trait]
impl EventCursor for KeyRangeCursor {
    async fn advance(&mut self) -> CoreResult<Option<EventRecord>> {
        if self.done {
            return Ok(None);
        }
        let next = {
            let logs = self.shared.read()?;
            let set = match self.index {
                Index::Visits => &logs.visits,
                Index::Bookmarks => &logs.bookmarks,
            };
            let mut range = set.range((self.low.clone(), self.high.clone()));
            if self.reverse {
                range.next_back().cloned()
            } else {
                range.next().cloned()
            }
        };
        let Some(key) = next else {
            self.done = true;
            return Ok(None);
        };
        if self.reverse {
            self.high = Bound::Excluded(key.clone());
        } else {
            self.low = Bound::Excluded(key.clone());
        }
        self.shared.count_read();
        Ok(key.to_record())
    }
}

/// Visits of a single page, most recent first.
struct PageVisitsCursor {
    shared: Arc<Shared>,
    page: PageId,
    upper: Bound<Timestamp>,
    done: bool,
}

#[async_trait]
impl EventCursor for PageVisitsCursor {
    async fn advance(&mut self) -> CoreResult<Option<EventRecord>> {
        if self.done {
            return Ok(None);
        }
        let next = {
            let logs = self.shared.read()?;
            logs.visits_by_page
                .get(&self.page)
                .and_then(|times| times.range((Bound::Unbounded, self.upper)).next_back().copied())
        };
        let Some(time) = next else {
            self.done = true;
            return Ok(None);
        };
        self.upper = Bound::Excluded(time);
        self.shared.count_read();
        Ok(Some(EventRecord {
            time,
            page: self.page.clone(),
        }))
    }
}

/// Bookmark lookups for an explicit page set, in page order.
struct PageBookmarksCursor {
    shared: Arc<Shared>,
    pending: VecDeque<PageId>,
}

#[async_trait]
impl EventCursor for PageBookmarksCursor {
    async fn advance(&mut self) -> CoreResult<Option<EventRecord>> {
        let logs = self.shared.read()?;
        while let Some(page) = self.pending.pop_front() {
            if let Some(&time) = logs.bookmark_of.get(&page) {
                self.shared.count_read();
                return Ok(Some(EventRecord { time, page }));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
