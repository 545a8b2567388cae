//! In-memory cache with fixed TTL expiration
//!
//! Every value stored in a [`TtlCache`] lives for the same duration from the
//! moment it was last set. Expired entries are dropped lazily when a read
//! observes them, and eagerly by a [`Sweeper`] task running on a fixed period.

mod cache;
mod clock;
mod sweeper;
mod types;

pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use sweeper::Sweeper;
pub use types::CacheStats;
