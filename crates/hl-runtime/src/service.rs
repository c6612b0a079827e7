use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use hl_config::{LookbackConfig, QueryConfig};
use hl_core::aggregate::{AggregationDispatcher, LatestEventResolver};
use hl_core::allow::PageAllowList;
use hl_core::clock::{Clock, SystemClock};
use hl_core::error::{CoreReason, CoreResult};
use hl_core::event::{PageId, Timestamp};
use hl_core::query::{PageQuerySpec, ResultMapping, TimeWindow};
use hl_core::store::OrderedEventStore;
use orion_error::op_context;
use orion_error::prelude::*;
use serde::Serialize;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::history_file::load_history;

/// One row of a sliced result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageHit {
    pub page: PageId,
    pub time: Timestamp,
}

/// Order hits newest first, breaking ties by page id.
pub fn sort_hits(mapping: ResultMapping) -> Vec<PageHit> {
    let mut hits: Vec<PageHit> = mapping
        .into_iter()
        .map(|(page, time)| PageHit { page, time })
        .collect();
    hits.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.page.cmp(&b.page)));
    hits
}

// ---------------------------------------------------------------------------
// HistoryService
// ---------------------------------------------------------------------------

/// Entry point for history queries: window defaults, page-size bounds and
/// the per-call deadline around the aggregation engine.
pub struct HistoryService {
    allow_list: Arc<dyn PageAllowList>,
    clock: Arc<dyn Clock>,
    dispatcher: AggregationDispatcher,
    resolver: LatestEventResolver,
    config: QueryConfig,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn OrderedEventStore>,
        allow_list: Arc<dyn PageAllowList>,
        clock: Arc<dyn Clock>,
        config: QueryConfig,
    ) -> Self {
        let dispatcher = AggregationDispatcher::new(Arc::clone(&store), Arc::clone(&clock));
        let resolver = LatestEventResolver::new(store).with_fanout(config.fanout_parallelism);
        Self {
            allow_list,
            clock,
            dispatcher,
            resolver,
            config,
        }
    }

    /// Build a service from `lookback.toml`: load the history file, compile
    /// the deny list, use the system clock.
    #[tracing::instrument(name = "service.bootstrap", skip_all)]
    pub fn from_config(config: &LookbackConfig, base_dir: &Path) -> RuntimeResult<Self> {
        let mut op = op_context!("history-bootstrap").with_auto_log();
        let history = config.store.history_path(base_dir);
        op.record("history", history.display().to_string().as_str());

        let store = match load_history(&history) {
            Ok(store) => store,
            Err(e) => {
                hl_error!(sys, history = %history.display(), error = %e, "bootstrap failed");
                return Err(e);
            }
        };
        let deny = config.allow_list.compile();
        hl_info!(
            conf,
            deny_patterns = deny.raw_patterns().len(),
            default_limit = config.query.default_limit,
            max_limit = config.query.max_limit,
            timeout = %config.query.timeout,
            "history service configured"
        );

        let service = Self::new(
            Arc::new(store),
            Arc::new(deny),
            Arc::new(SystemClock),
            config.query.clone(),
        );
        hl_info!(sys, history = %history.display(), "history service ready");
        op.mark_suc();
        Ok(service)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Fill a missing start with 0 and a missing end with the current time.
    pub fn window(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> TimeWindow {
        TimeWindow::with_defaults(start, end, self.clock.as_ref())
    }

    /// Build a query spec, using `default_limit` when `limit` is absent.
    pub fn spec(
        &self,
        window: TimeWindow,
        skip: usize,
        limit: Option<usize>,
        bookmarks_only: bool,
    ) -> PageQuerySpec {
        PageQuerySpec::new(window, limit.unwrap_or(self.config.default_limit))
            .with_skip(skip)
            .bookmarks_only(bookmarks_only)
    }

    /// Latest activity per page for `spec`. The mapping may hold more than
    /// `skip + limit` pages; [`page`](Self::page) returns the exact slice.
    #[tracing::instrument(
        name = "query.aggregate",
        skip_all,
        fields(skip = spec.skip, limit = spec.limit, bookmarks_only = spec.bookmarks_only)
    )]
    pub async fn aggregate(&self, spec: &PageQuerySpec) -> RuntimeResult<ResultMapping> {
        if spec.limit > self.config.max_limit {
            return StructError::from(RuntimeReason::from(CoreReason::InvalidPageSpec))
                .with_detail(format!(
                    "limit {} exceeds query.max_limit {}",
                    spec.limit, self.config.max_limit
                ))
                .err();
        }
        let mapping = self
            .with_deadline(
                "aggregate",
                self.dispatcher.aggregate(spec, self.allow_list.as_ref()),
            )
            .await?;
        hl_debug!(
            query,
            start = spec.window.start,
            end = spec.window.end,
            pages = mapping.len(),
            "aggregation complete"
        );
        Ok(mapping)
    }

    /// The `spec.skip..spec.skip + spec.limit` slice of the aggregated
    /// result, newest first.
    pub async fn page(&self, spec: &PageQuerySpec) -> RuntimeResult<Vec<PageHit>> {
        let mapping = self.aggregate(spec).await?;
        Ok(sort_hits(mapping)
            .into_iter()
            .skip(spec.skip)
            .take(spec.limit)
            .collect())
    }

    /// Latest activity of each page in `pages`.
    #[tracing::instrument(
        name = "query.refresh",
        skip_all,
        fields(pages = pages.len(), bookmarks_only = bookmarks_only)
    )]
    pub async fn refresh(
        &self,
        window: TimeWindow,
        bookmarks_only: bool,
        pages: &HashSet<PageId>,
    ) -> RuntimeResult<ResultMapping> {
        let mapping = self
            .with_deadline(
                "refresh",
                self.resolver.resolve(window, bookmarks_only, pages),
            )
            .await?;
        hl_debug!(query, resolved = mapping.len(), "refresh complete");
        Ok(mapping)
    }

    async fn with_deadline<F>(&self, what: &str, fut: F) -> RuntimeResult<ResultMapping>
    where
        F: Future<Output = CoreResult<ResultMapping>>,
    {
        let limit = self.config.timeout.as_duration();
        hl_trace!(query, call = what, timeout = %self.config.timeout, "deadline armed");
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.err_conv(),
            Err(_) => {
                hl_warn!(query, call = what, timeout = %self.config.timeout, "deadline exceeded");
                StructError::from(RuntimeReason::Timeout)
                    .with_detail(format!("{what} exceeded {}", self.config.timeout))
                    .err()
            }
        }
    }
}
