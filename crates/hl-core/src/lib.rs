pub mod aggregate;
pub mod allow;
pub mod clock;
pub mod error;
pub mod event;
pub mod query;
pub mod store;

pub use aggregate::{AggregationDispatcher, BookmarkLookback, EndDateLookback, LatestEventResolver};
pub use allow::{AllowAll, PageAllowList};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreReason, CoreResult};
pub use event::{EventRecord, PageId, Timestamp};
pub use query::{PageQuerySpec, ResultMapping, TimeWindow};
pub use store::{MemoryEventStore, OrderedEventStore};
