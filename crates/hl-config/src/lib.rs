pub mod allow_list;
pub mod logging;
pub mod lookback;
pub mod query;
pub mod store;
pub mod types;
mod validate;

pub use allow_list::{AllowListConfig, DenyPatterns};
pub use logging::{LogFormat, LoggingConfig};
pub use lookback::LookbackConfig;
pub use query::QueryConfig;
pub use store::StoreConfig;
pub use types::HumanDuration;
