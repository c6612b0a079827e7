use std::sync::Arc;

use crate::allow::PageAllowList;
use crate::clock::Clock;
use crate::error::CoreResult;
use crate::query::{PageQuerySpec, ResultMapping};
use crate::store::OrderedEventStore;

use super::bookmark::BookmarkLookback;
use super::end_date::EndDateLookback;

/// Routes a [`PageQuerySpec`] to the lookback that serves it.
pub struct AggregationDispatcher {
    end_date: EndDateLookback,
    bookmark: BookmarkLookback,
}

impl AggregationDispatcher {
    pub fn new(store: Arc<dyn OrderedEventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            end_date: EndDateLookback::new(Arc::clone(&store)),
            bookmark: BookmarkLookback::new(store, clock),
        }
    }

    /// Validate `spec`, then run the bookmark lookback for bookmarks-only
    /// queries and the end-date lookback otherwise.
    pub async fn aggregate(
        &self,
        spec: &PageQuerySpec,
        allow_list: &dyn PageAllowList,
    ) -> CoreResult<ResultMapping> {
        spec.fetch_target()?;
        let PageQuerySpec {
            window,
            skip,
            limit,
            bookmarks_only,
        } = *spec;
        if bookmarks_only {
            self.bookmark.run(window, skip, limit, allow_list).await
        } else {
            self.end_date.run(window, skip, limit, allow_list).await
        }
    }
}
