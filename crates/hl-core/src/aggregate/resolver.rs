use std::collections::HashSet;
use std::sync::Arc;

use orion_error::prelude::*;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{CoreReason, CoreResult};
use crate::event::{PageId, Timestamp};
use crate::query::{ResultMapping, TimeWindow};
use crate::store::{OrderedEventStore, Scan};

use super::admission::attempt_add;
use super::latest_visit_until;

/// Default bound on concurrent per-page visit scans.
pub const DEFAULT_FANOUT: usize = 16;

// ---------------------------------------------------------------------------
// LatestEventResolver
// ---------------------------------------------------------------------------

/// Computes the latest qualifying event time for each page of a known set,
/// across both logs.
pub struct LatestEventResolver {
    store: Arc<dyn OrderedEventStore>,
    fanout: usize,
}

impl LatestEventResolver {
    pub fn new(store: Arc<dyn OrderedEventStore>) -> Self {
        Self {
            store,
            fanout: DEFAULT_FANOUT,
        }
    }

    /// Limit the number of visit scans in flight at once (minimum 1).
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    /// Resolve the latest event time per page in `pages`.
    ///
    /// With `bookmarks_only`, bookmark times count regardless of `window`
    /// and only bookmarked pages are checked for visits. Pages with no
    /// qualifying event are absent from the result.
    pub async fn resolve(
        &self,
        window: TimeWindow,
        bookmarks_only: bool,
        pages: &HashSet<PageId>,
    ) -> CoreResult<ResultMapping> {
        if pages.is_empty() || window.is_inverted() {
            return Ok(ResultMapping::new());
        }

        // Phase 1: bookmarks of the requested pages.
        let mut bookmarks = ResultMapping::new();
        let mut scan = Scan::new(self.store.scan_bookmarks_by_pages(pages).await?);
        while let Some(record) = scan.next().await? {
            attempt_add(
                &mut bookmarks,
                record.time,
                &record.page,
                &window,
                bookmarks_only,
            );
        }

        // Phase 2: latest in-window visit per candidate page.
        let candidates: Vec<PageId> = if bookmarks_only {
            bookmarks.keys().cloned().collect()
        } else {
            pages.iter().cloned().collect()
        };
        let candidate_count = candidates.len();
        let mut merged = self.latest_visits(window, candidates).await?;

        // Phase 3: bookmark times win ties and override older visits.
        for (page, time) in &bookmarks {
            attempt_add(&mut merged, *time, page, &window, true);
        }

        log::debug!(
            "resolve: pages={} bookmarks={} visit_scans={} resolved={}",
            pages.len(),
            bookmarks.len(),
            candidate_count,
            merged.len()
        );
        Ok(merged)
    }

    /// One scan task per page, at most `fanout` running at a time. Each task
    /// returns its own result; the first failure aborts the rest.
    async fn latest_visits(
        &self,
        window: TimeWindow,
        candidates: Vec<PageId>,
    ) -> CoreResult<ResultMapping> {
        let permits = Arc::new(Semaphore::new(self.fanout));
        let mut join_set: JoinSet<CoreResult<Option<(PageId, Timestamp)>>> = JoinSet::new();

        for page in candidates {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            join_set.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|e| {
                    StructError::from(CoreReason::ScanTask).with_detail(e.to_string())
                })?;
                let latest = latest_visit_until(store.as_ref(), &page, window.end).await?;
                Ok(latest
                    .filter(|time| window.contains(*time))
                    .map(|time| (page, time)))
            });
        }

        let mut visits = ResultMapping::new();
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined.map_err(|e| {
                StructError::from(CoreReason::ScanTask)
                    .with_detail(format!("visit scan task failed: {e}"))
            })?;
            if let Some((page, time)) = outcome? {
                attempt_add(&mut visits, time, &page, &window, false);
            }
        }
        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::store_unavailable;
    use crate::event::EventKey;
    use crate::store::{BoxCursor, MemoryEventStore};
    use orion_error::ErrorCode;

    fn pages(ids: &[&str]) -> HashSet<PageId> {
        ids.iter().map(|id| PageId::from(*id)).collect()
    }

    fn resolver(store: &MemoryEventStore) -> LatestEventResolver {
        LatestEventResolver::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn latest_visit_within_window() {
        let store = MemoryEventStore::with_events([(100, "a"), (50, "a"), (200, "b")], []);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 150), false, &pages(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(out, ResultMapping::from([("a".into(), 100)]));
    }

    #[tokio::test]
    async fn bookmark_beats_older_visit_and_wins_ties() {
        let store = MemoryEventStore::with_events(
            [(40, "a"), (70, "b")],
            [(60, "a"), (70, "b")],
        );
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &pages(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(out.get("a"), Some(&60));
        assert_eq!(out.get("b"), Some(&70));
    }

    #[tokio::test]
    async fn window_filters_bookmarks_in_default_mode() {
        let store = MemoryEventStore::with_events([(20, "a")], [(500, "a")]);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &pages(&["a"]))
            .await
            .unwrap();
        assert_eq!(out.get("a"), Some(&20));
    }

    #[tokio::test]
    async fn bookmarks_only_keeps_out_of_window_bookmark() {
        let store = MemoryEventStore::with_events([(20, "a")], [(500, "a")]);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), true, &pages(&["a"]))
            .await
            .unwrap();
        assert_eq!(out.get("a"), Some(&500));
    }

    #[tokio::test]
    async fn bookmarks_only_skips_unbookmarked_pages() {
        let store = MemoryEventStore::with_events([(20, "a"), (30, "b")], [(10, "a")]);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), true, &pages(&["a", "b"]))
            .await
            .unwrap();
        // `a` is bookmarked; its later in-window visit wins. `b` is never checked.
        assert_eq!(out, ResultMapping::from([("a".into(), 20)]));
    }

    #[tokio::test]
    async fn unknown_pages_are_absent() {
        let store = MemoryEventStore::with_events([(20, "a")], []);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &pages(&["ghost"]))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn empty_page_set_touches_nothing() {
        let store = MemoryEventStore::with_events([(20, "a")], [(10, "a")]);
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &HashSet::new())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(store.stats().scans_opened, 0);
    }

    #[tokio::test]
    async fn visit_scan_stops_at_first_qualifying_record() {
        let store = MemoryEventStore::with_events(
            [(10, "a"), (20, "a"), (30, "a"), (400, "a"), (500, "a")],
            [],
        );
        let out = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &pages(&["a"]))
            .await
            .unwrap();
        assert_eq!(out.get("a"), Some(&30));
        // 500 and 400 skipped, 30 admitted, 20 and 10 never read.
        assert_eq!(store.stats().records_read, 3);
    }

    #[tokio::test]
    async fn fan_out_covers_every_page_with_narrow_parallelism() {
        let visits: Vec<(i64, String)> = (0..40).map(|i| (i as i64 * 10, format!("p{i}"))).collect();
        let store = MemoryEventStore::new();
        for (time, page) in &visits {
            store.record_visit(*time, page.as_str().into()).unwrap();
        }
        let requested: HashSet<PageId> = visits.iter().map(|(_, p)| p.as_str().into()).collect();
        let out = LatestEventResolver::new(Arc::new(store.clone()))
            .with_fanout(3)
            .resolve(TimeWindow::new(0, 1000), false, &requested)
            .await
            .unwrap();
        assert_eq!(out.len(), 40);
        assert_eq!(out.get("p7"), Some(&70));
    }

    #[tokio::test]
    async fn store_failure_fails_the_whole_resolution() {
        let store = MemoryEventStore::with_events([(20, "a"), (30, "b")], []);
        store.set_available(false);
        let err = resolver(&store)
            .resolve(TimeWindow::new(0, 100), false, &pages(&["a", "b"]))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), 1001);
    }

    /// Store whose per-page visit scan fails for a single page.
    struct FailingPage {
        inner: MemoryEventStore,
        broken: PageId,
    }

    #[async_trait::async_trait]
    impl OrderedEventStore for FailingPage {
        async fn scan_visits_by_page(&self, page: &PageId) -> CoreResult<BoxCursor> {
            if *page == self.broken {
                return Err(store_unavailable(format!("visits of {page} unreadable")));
            }
            self.inner.scan_visits_by_page(page).await
        }

        async fn scan_visits_by_time(
            &self,
            low: EventKey,
            high: EventKey,
            reverse: bool,
        ) -> CoreResult<BoxCursor> {
            self.inner.scan_visits_by_time(low, high, reverse).await
        }

        async fn scan_bookmarks_by_time(
            &self,
            low: Timestamp,
            high: Timestamp,
            reverse: bool,
        ) -> CoreResult<BoxCursor> {
            self.inner.scan_bookmarks_by_time(low, high, reverse).await
        }

        async fn scan_bookmarks_by_pages(&self, pages: &HashSet<PageId>) -> CoreResult<BoxCursor> {
            self.inner.scan_bookmarks_by_pages(pages).await
        }
    }

    #[tokio::test]
    async fn one_failed_visit_scan_fails_the_whole_resolution() {
        let inner = MemoryEventStore::with_events(
            [(20, "a"), (30, "bad"), (40, "c")],
            [(50, "a")],
        );
        for fanout in [1, 16] {
            let store = FailingPage {
                inner: inner.clone(),
                broken: "bad".into(),
            };
            let result = LatestEventResolver::new(Arc::new(store))
                .with_fanout(fanout)
                .resolve(TimeWindow::new(0, 100), false, &pages(&["a", "bad", "c"]))
                .await;
            let err = result.unwrap_err();
            assert_eq!(err.error_code(), 1001, "fanout {fanout}");
        }
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let store = MemoryEventStore::with_events(
            [(100, "a"), (50, "a"), (200, "b"), (90, "c")],
            [(120, "b"), (300, "c")],
        );
        let r = resolver(&store);
        let requested = pages(&["a", "b", "c", "d"]);
        let first = r.resolve(TimeWindow::new(0, 150), false, &requested).await.unwrap();
        let second = r.resolve(TimeWindow::new(0, 150), false, &requested).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            ResultMapping::from([("a".into(), 100), ("b".into(), 120), ("c".into(), 90)])
        );
    }
}
