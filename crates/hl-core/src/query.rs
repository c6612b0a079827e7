use std::collections::HashMap;

use orion_error::prelude::*;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CoreReason, CoreResult};
use crate::event::{PageId, Timestamp};

/// Latest qualifying event time per page. The only output type of the
/// aggregation engine.
pub type ResultMapping = HashMap<PageId, Timestamp>;

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Inclusive `[start, end]` range bounding which events qualify.
///
/// A window with `start > end` is inverted: it is accepted and matches
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Everything from the epoch up to and including `end`.
    pub fn until(end: Timestamp) -> Self {
        Self { start: 0, end }
    }

    /// Fill in missing bounds: `start` defaults to 0, `end` to the clock's
    /// current time.
    pub fn with_defaults(
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            start: start.unwrap_or(0),
            end: end.unwrap_or_else(|| clock.now()),
        }
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

// ---------------------------------------------------------------------------
// PageQuerySpec
// ---------------------------------------------------------------------------

/// One page of a "most recent activity per page" query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuerySpec {
    pub window: TimeWindow,
    pub skip: usize,
    pub limit: usize,
    pub bookmarks_only: bool,
}

impl PageQuerySpec {
    pub fn new(window: TimeWindow, limit: usize) -> Self {
        Self {
            window,
            skip: 0,
            limit,
            bookmarks_only: false,
        }
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn bookmarks_only(mut self, bookmarks_only: bool) -> Self {
        self.bookmarks_only = bookmarks_only;
        self
    }

    /// Number of distinct pages the scans must gather: `skip + limit`.
    pub fn fetch_target(&self) -> CoreResult<usize> {
        fetch_target(self.skip, self.limit)
    }
}

/// Validate `skip`/`limit` and return `skip + limit`.
///
/// Fails with [`CoreReason::InvalidPageSpec`] when `limit` is zero or the sum
/// overflows.
pub fn fetch_target(skip: usize, limit: usize) -> CoreResult<usize> {
    if limit == 0 {
        return StructError::from(CoreReason::InvalidPageSpec)
            .with_detail("limit must be positive")
            .err();
    }
    match skip.checked_add(limit) {
        Some(target) => Ok(target),
        None => StructError::from(CoreReason::InvalidPageSpec)
            .with_detail(format!("skip ({skip}) + limit ({limit}) overflows"))
            .err(),
    }
}
