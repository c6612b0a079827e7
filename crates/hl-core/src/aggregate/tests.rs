use std::collections::HashSet;
use std::sync::Arc;

use orion_error::ErrorCode;

use super::*;
use crate::allow::AllowAll;
use crate::clock::FixedClock;
use crate::event::PageId;
use crate::query::{PageQuerySpec, ResultMapping, TimeWindow};
use crate::store::MemoryEventStore;

const NOW: i64 = 1_000_000;

fn dispatcher(store: &MemoryEventStore) -> AggregationDispatcher {
    AggregationDispatcher::new(Arc::new(store.clone()), Arc::new(FixedClock(NOW)))
}

fn pages(ids: &[&str]) -> HashSet<PageId> {
    ids.iter().map(|id| PageId::from(*id)).collect()
}

/// A store with a little of everything: repeat visits, late bookmarks,
/// pages that exist in only one log.
fn mixed_store() -> MemoryEventStore {
    MemoryEventStore::with_events(
        [
            (100, "a"),
            (50, "a"),
            (200, "b"),
            (120, "c"),
            (30, "d"),
            (140, "x"),
            (10, "x"),
        ],
        [(130, "a"), (900, "b"), (60, "e"), (300, "x")],
    )
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_keeps_latest_in_window_visit() {
    let store = MemoryEventStore::with_events([(100, "a"), (50, "a"), (200, "b")], []);
    let out = LatestEventResolver::new(Arc::new(store.clone()))
        .resolve(TimeWindow::new(0, 150), false, &pages(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(out, ResultMapping::from([("a".into(), 100)]));
}

#[tokio::test]
async fn bookmarks_only_backfills_late_bookmark() {
    let store = MemoryEventStore::with_events([(90, "x"), (250, "x")], [(300, "x")]);
    let spec = PageQuerySpec::new(TimeWindow::new(0, 200), 1).bookmarks_only(true);
    let out = dispatcher(&store).aggregate(&spec, &AllowAll).await.unwrap();
    assert_eq!(out, ResultMapping::from([("x".into(), 90)]));
}

#[tokio::test]
async fn empty_store_reads_nothing() {
    let store = MemoryEventStore::new();
    let d = dispatcher(&store);
    for bookmarks_only in [false, true] {
        let spec = PageQuerySpec::new(TimeWindow::until(NOW), 5).bookmarks_only(bookmarks_only);
        let out = d.aggregate(&spec, &AllowAll).await.unwrap();
        assert!(out.is_empty());
    }
    assert_eq!(store.stats().records_read, 0);
}

#[tokio::test]
async fn inverted_window_is_empty_without_store_access() {
    let store = mixed_store();
    let window = TimeWindow::new(100, 50);
    let d = dispatcher(&store);
    for bookmarks_only in [false, true] {
        let spec = PageQuerySpec::new(window, 10).bookmarks_only(bookmarks_only);
        assert!(d.aggregate(&spec, &AllowAll).await.unwrap().is_empty());
    }
    let out = LatestEventResolver::new(Arc::new(store.clone()))
        .resolve(window, false, &pages(&["a", "b"]))
        .await
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(store.stats().scans_opened, 0);
}

// ---------------------------------------------------------------------------
// Validation and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_limit_is_rejected_before_any_scan() {
    let store = mixed_store();
    let d = dispatcher(&store);
    for bookmarks_only in [false, true] {
        let spec = PageQuerySpec::new(TimeWindow::until(NOW), 0).bookmarks_only(bookmarks_only);
        let err = d.aggregate(&spec, &AllowAll).await.unwrap_err();
        assert_eq!(err.error_code(), 1002);
    }
    assert_eq!(store.stats().scans_opened, 0);
}

#[tokio::test]
async fn overflowing_skip_is_rejected() {
    let store = mixed_store();
    let spec = PageQuerySpec::new(TimeWindow::until(NOW), 1).with_skip(usize::MAX);
    let err = dispatcher(&store).aggregate(&spec, &AllowAll).await.unwrap_err();
    assert_eq!(err.error_code(), 1002);
    assert_eq!(store.stats().scans_opened, 0);
}

#[tokio::test]
async fn unavailable_store_fails_every_entry_point() {
    let store = mixed_store();
    store.set_available(false);
    let d = dispatcher(&store);
    for bookmarks_only in [false, true] {
        let spec = PageQuerySpec::new(TimeWindow::until(NOW), 3).bookmarks_only(bookmarks_only);
        let err = d.aggregate(&spec, &AllowAll).await.unwrap_err();
        assert_eq!(err.error_code(), 1001);
    }
    let err = LatestEventResolver::new(Arc::new(store.clone()))
        .resolve(TimeWindow::until(NOW), true, &pages(&["a"]))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), 1001);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aggregate_values_stay_inside_window() {
    let store = mixed_store();
    let window = TimeWindow::new(40, 150);
    let d = dispatcher(&store);
    for bookmarks_only in [false, true] {
        for limit in 1..6 {
            let spec = PageQuerySpec::new(window, limit).bookmarks_only(bookmarks_only);
            let out = d.aggregate(&spec, &AllowAll).await.unwrap();
            assert!(
                out.values().all(|t| window.contains(*t)),
                "bookmarks_only={bookmarks_only} limit={limit}: {out:?}"
            );
        }
    }
}

#[tokio::test]
async fn end_date_merges_both_logs() {
    let store = mixed_store();
    let spec = PageQuerySpec::new(TimeWindow::new(0, 150), 10);
    let out = dispatcher(&store).aggregate(&spec, &AllowAll).await.unwrap();
    assert_eq!(
        out,
        ResultMapping::from([
            ("a".into(), 130),
            ("c".into(), 120),
            ("d".into(), 30),
            ("e".into(), 60),
            ("x".into(), 140),
        ])
    );
}

#[tokio::test]
async fn end_date_over_fetch_is_bounded_per_source() {
    let store = mixed_store();
    let (skip, limit) = (0, 2);
    let spec = PageQuerySpec::new(TimeWindow::new(0, 150), limit).with_skip(skip);
    let out = dispatcher(&store).aggregate(&spec, &AllowAll).await.unwrap();
    // Visits contribute {x, c}, bookmarks {a, e}.
    assert_eq!(
        out,
        ResultMapping::from([
            ("x".into(), 140),
            ("c".into(), 120),
            ("a".into(), 130),
            ("e".into(), 60),
        ])
    );
    assert!(out.len() > skip + limit);
    assert!(out.len() <= 2 * (skip + limit));
}

#[tokio::test]
async fn resolve_is_idempotent_on_an_unchanged_store() {
    let store = mixed_store();
    let resolver = LatestEventResolver::new(Arc::new(store.clone())).with_fanout(2);
    let requested = pages(&["a", "b", "c", "d", "e", "x", "missing"]);
    for bookmarks_only in [false, true] {
        let first = resolver
            .resolve(TimeWindow::new(0, 150), bookmarks_only, &requested)
            .await
            .unwrap();
        let second = resolver
            .resolve(TimeWindow::new(0, 150), bookmarks_only, &requested)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn resolve_bookmarks_only_admits_out_of_window_bookmark_times() {
    let store = mixed_store();
    let out = LatestEventResolver::new(Arc::new(store.clone()))
        .resolve(TimeWindow::new(0, 150), true, &pages(&["a", "b", "c", "x"]))
        .await
        .unwrap();
    // `c` has no bookmark; `b` and `x` keep their bookmark times.
    assert_eq!(
        out,
        ResultMapping::from([("a".into(), 130), ("b".into(), 900), ("x".into(), 300)])
    );
}

#[tokio::test]
async fn allow_list_applies_to_both_lookbacks() {
    let store = MemoryEventStore::with_events(
        [(90, "chrome://newtab"), (80, "https://a")],
        [(95, "chrome://bookmarks"), (70, "https://b")],
    );
    let allow = hl_config::DenyPatterns::new(&["chrome://*".to_string()]);
    let d = dispatcher(&store);

    let spec = PageQuerySpec::new(TimeWindow::new(0, 100), 5);
    let out = d.aggregate(&spec, &allow).await.unwrap();
    assert_eq!(
        out,
        ResultMapping::from([("https://a".into(), 80), ("https://b".into(), 70)])
    );

    let out = d.aggregate(&spec.bookmarks_only(true), &allow).await.unwrap();
    assert_eq!(out, ResultMapping::from([("https://b".into(), 70)]));
}

#[tokio::test]
async fn admission_reduces_to_per_page_maximum() {
    let window = TimeWindow::new(0, 100);
    let offers = [(40, "a"), (90, "b"), (70, "a"), (95, "a"), (120, "b"), (10, "b")];
    let mut map = ResultMapping::new();
    for (time, page) in offers {
        attempt_add(&mut map, time, &page.into(), &window, false);
    }
    assert_eq!(map, ResultMapping::from([("a".into(), 95), ("b".into(), 90)]));
}
