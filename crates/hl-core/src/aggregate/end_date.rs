use std::sync::Arc;

use crate::allow::PageAllowList;
use crate::error::CoreResult;
use crate::event::EventKey;
use crate::query::{ResultMapping, TimeWindow, fetch_target};
use crate::store::{OrderedEventStore, Scan};

/// Paginated lookback anchored at the window end.
///
/// Both logs are read newest first from `window.end`. Each source stops once
/// it has `skip + limit` distinct pages, so the merged mapping can hold up
/// to twice that many entries. Callers re-slice the result.
pub struct EndDateLookback {
    store: Arc<dyn OrderedEventStore>,
}

impl EndDateLookback {
    pub fn new(store: Arc<dyn OrderedEventStore>) -> Self {
        Self { store }
    }

    pub async fn run(
        &self,
        window: TimeWindow,
        skip: usize,
        limit: usize,
        allow_list: &dyn PageAllowList,
    ) -> CoreResult<ResultMapping> {
        let target = fetch_target(skip, limit)?;
        if window.is_inverted() {
            return Ok(ResultMapping::new());
        }

        let mut visits = ResultMapping::new();
        let mut scan = Scan::new(
            self.store
                .scan_visits_by_time(
                    EventKey::lowest(window.start),
                    EventKey::highest(window.end),
                    true,
                )
                .await?,
        );
        loop {
            let Some(record) = scan.next_if(|| visits.len() < target).await? else {
                break;
            };
            // Reverse order: the first sighting of a page is its latest visit.
            if !visits.contains_key(&record.page) && allow_list.is_allowed(&record.page) {
                visits.insert(record.page, record.time);
            }
        }
        let visit_reads = scan.reads();

        let mut bookmarks = ResultMapping::new();
        let mut scan = Scan::new(
            self.store
                .scan_bookmarks_by_time(window.start, window.end, true)
                .await?,
        );
        loop {
            let Some(record) = scan.next_if(|| bookmarks.len() < target).await? else {
                break;
            };
            if allow_list.is_allowed(&record.page) {
                bookmarks.insert(record.page, record.time);
            }
        }
        let bookmark_reads = scan.reads();

        let visit_pages = visits.len();
        let bookmark_pages = bookmarks.len();
        let mut merged = visits;
        for (page, time) in bookmarks {
            merged
                .entry(page)
                .and_modify(|existing| {
                    if time > *existing {
                        *existing = time;
                    }
                })
                .or_insert(time);
        }

        log::debug!(
            "end-date lookback [{}, {}] target={}: visits {} pages/{} reads, bookmarks {} pages/{} reads, merged {}",
            window.start,
            window.end,
            target,
            visit_pages,
            visit_reads,
            bookmark_pages,
            bookmark_reads,
            merged.len()
        );
        Ok(merged)
    }
}
