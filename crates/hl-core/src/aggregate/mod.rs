//! Time-windowed "latest activity per page" aggregation.
//!
//! Two query strategies walk the visit and bookmark logs backward from a
//! bound and stop once enough distinct pages are found:
//!
//! - [`EndDateLookback`] scans both logs from the window end.
//! - [`BookmarkLookback`] is driven by bookmark recency and substitutes an
//!   in-window visit for bookmarks newer than the window.
//!
//! [`AggregationDispatcher`] picks between them. [`LatestEventResolver`]
//! refreshes a known page set instead of paginating.

mod admission;
mod bookmark;
mod dispatch;
mod end_date;
mod resolver;

#[cfg(test)]
mod tests;

pub use admission::attempt_add;
pub use bookmark::{BookmarkLookback, LookbackTrace};
pub use dispatch::AggregationDispatcher;
pub use end_date::EndDateLookback;
pub use resolver::{DEFAULT_FANOUT, LatestEventResolver};

use crate::error::CoreResult;
use crate::event::{PageId, Timestamp};
use crate::store::{OrderedEventStore, Scan};

/// Most recent visit of `page` at or before `end`.
///
/// Reads the page's visits newest first and stops at the first qualifying
/// record.
pub(crate) async fn latest_visit_until(
    store: &dyn OrderedEventStore,
    page: &PageId,
    end: Timestamp,
) -> CoreResult<Option<Timestamp>> {
    let mut scan = Scan::new(store.scan_visits_by_page(page).await?);
    while let Some(record) = scan.next().await? {
        if record.time <= end {
            return Ok(Some(record.time));
        }
    }
    Ok(None)
}
