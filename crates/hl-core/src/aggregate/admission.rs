use crate::event::{PageId, Timestamp};
use crate::query::{ResultMapping, TimeWindow};

/// Record `time` for `page` if it improves on what `map` already holds.
///
/// The update happens iff no entry for `page` has a time `>= time` and
/// either `skip_window_check` is set or `time` lies inside `window`.
/// Returns whether `map` changed. A stored time never decreases.
pub fn attempt_add(
    map: &mut ResultMapping,
    time: Timestamp,
    page: &PageId,
    window: &TimeWindow,
    skip_window_check: bool,
) -> bool {
    if map.get(page).is_some_and(|&existing| existing >= time) {
        return false;
    }
    if !skip_window_check && !window.contains(time) {
        return false;
    }
    map.insert(page.clone(), time);
    true
}
