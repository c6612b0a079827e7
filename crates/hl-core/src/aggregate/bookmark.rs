use std::sync::Arc;

use crate::allow::PageAllowList;
use crate::clock::Clock;
use crate::error::CoreResult;
use crate::event::Timestamp;
use crate::query::{ResultMapping, TimeWindow, fetch_target};
use crate::store::{OrderedEventStore, Scan};

use super::admission::attempt_add;
use super::latest_visit_until;

/// Upper bounds used by each iteration of a [`BookmarkLookback`] run, in
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookbackTrace {
    pub upper_bounds: Vec<Timestamp>,
}

impl LookbackTrace {
    pub fn iterations(&self) -> usize {
        self.upper_bounds.len()
    }
}

/// Paginated lookback over bookmarked pages.
///
/// Bookmarks are read newest first from "now" in batches of `skip + limit`.
/// A bookmark newer than the window end is replaced by that page's latest
/// visit at or before the end, so a page bookmarked later still shows up
/// with its in-window activity. Each iteration moves the upper bound below
/// everything already collected.
pub struct BookmarkLookback {
    store: Arc<dyn OrderedEventStore>,
    clock: Arc<dyn Clock>,
}

impl BookmarkLookback {
    pub fn new(store: Arc<dyn OrderedEventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn run(
        &self,
        window: TimeWindow,
        skip: usize,
        limit: usize,
        allow_list: &dyn PageAllowList,
    ) -> CoreResult<ResultMapping> {
        let (results, _) = self.run_traced(window, skip, limit, allow_list).await?;
        Ok(results)
    }

    /// Same as [`run`](Self::run), also reporting the upper bound of every
    /// iteration.
    pub async fn run_traced(
        &self,
        window: TimeWindow,
        skip: usize,
        limit: usize,
        allow_list: &dyn PageAllowList,
    ) -> CoreResult<(ResultMapping, LookbackTrace)> {
        let target = fetch_target(skip, limit)?;
        let mut results = ResultMapping::new();
        let mut trace = LookbackTrace::default();
        if window.is_inverted() {
            return Ok((results, trace));
        }

        let mut upper_bound = self.clock.now();
        while upper_bound >= window.start {
            trace.upper_bounds.push(upper_bound);

            let mut batch = ResultMapping::new();
            let mut scan = Scan::new(
                self.store
                    .scan_bookmarks_by_time(window.start, upper_bound, true)
                    .await?,
            );
            loop {
                let Some(record) = scan.next_if(|| batch.len() < target).await? else {
                    break;
                };
                if allow_list.is_allowed(&record.page) {
                    batch.entry(record.page).or_insert(record.time);
                }
            }
            let exhausted = batch.len() < target;
            let oldest_bookmark = batch.values().min().copied();

            for (page, time) in batch.iter_mut() {
                if *time > window.end {
                    if let Some(visit) =
                        latest_visit_until(self.store.as_ref(), page, window.end).await?
                    {
                        *time = visit;
                    }
                }
            }
            for (page, time) in &batch {
                attempt_add(&mut results, *time, page, &window, false);
            }

            log::debug!(
                "bookmark lookback iteration {}: upper_bound={} batch={} results={} exhausted={}",
                trace.iterations(),
                upper_bound,
                batch.len(),
                results.len(),
                exhausted
            );

            if results.len() >= limit || exhausted {
                break;
            }
            let floor = match results.values().min() {
                Some(&min) => min,
                None => match oldest_bookmark {
                    Some(min) => min,
                    None => break,
                },
            };
            upper_bound = floor.saturating_sub(1);
        }
        Ok((results, trace))
    }
}
