use hl_config::DenyPatterns;

use crate::event::PageId;

/// Decides whether a page may appear in query results.
///
/// Consulted once per candidate record during scans. Implementations must
/// be pure.
pub trait PageAllowList: Send + Sync {
    fn is_allowed(&self, page: &PageId) -> bool;
}

/// Admits every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PageAllowList for AllowAll {
    fn is_allowed(&self, _page: &PageId) -> bool {
        true
    }
}

impl<F> PageAllowList for F
where
    F: Fn(&PageId) -> bool + Send + Sync,
{
    fn is_allowed(&self, page: &PageId) -> bool {
        self(page)
    }
}

/// Rejects pages matching any configured `allow_list.deny` pattern.
impl PageAllowList for DenyPatterns {
    fn is_allowed(&self, page: &PageId) -> bool {
        !self.is_denied(page.as_str())
    }
}
