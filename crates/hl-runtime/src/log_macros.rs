//! Logging macros that tag every event with a `domain` field.
//!
//! Domains used by the lookback service:
//!
//! - `sys`: service bootstrap
//! - `store`: loading the history log
//! - `query`: aggregation and resolution calls
//! - `conf`: configuration loading
//!
//! ```ignore
//! hl_info!(store, visits = 120, bookmarks = 8, "history loaded");
//! hl_warn!(query, error = %e, "aggregation failed");
//! ```
//!
//! The domain is written as a bare identifier and turned into a string
//! literal by the macro. Everything after it is passed to `tracing` as is.

#[doc(hidden)]
macro_rules! hl_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! hl_error {
    ($domain:ident, $($rest:tt)*) => {
        hl_log!(error, $domain, $($rest)*)
    };
}

macro_rules! hl_warn {
    ($domain:ident, $($rest:tt)*) => {
        hl_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! hl_info {
    ($domain:ident, $($rest:tt)*) => {
        hl_log!(info, $domain, $($rest)*)
    };
}

macro_rules! hl_debug {
    ($domain:ident, $($rest:tt)*) => {
        hl_log!(debug, $domain, $($rest)*)
    };
}

macro_rules! hl_trace {
    ($domain:ident, $($rest:tt)*) => {
        hl_log!(trace, $domain, $($rest)*)
    };
}
