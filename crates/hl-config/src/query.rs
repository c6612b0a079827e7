use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// Query defaults and resource bounds, deserialized from `[query]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when a caller does not pass one.
    pub default_limit: usize,
    /// Largest page size a caller may request.
    pub max_limit: usize,
    /// Upper bound on concurrent per-page visit scans during resolution.
    pub fanout_parallelism: usize,
    /// Deadline wrapped around each aggregation or resolution call.
    pub timeout: HumanDuration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 1000,
            fanout_parallelism: 16,
            timeout: Duration::from_secs(5).into(),
        }
    }
}
