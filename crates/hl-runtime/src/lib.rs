#[macro_use]
mod log_macros;

pub mod error;
pub mod history_file;
pub mod service;
pub mod tracing_init;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use service::{HistoryService, PageHit};
