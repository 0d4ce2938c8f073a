pub mod activity;
pub mod cache;
pub mod janitor;

pub use activity::{ActivityCaches, JoinCache, MessageCache};
pub use cache::*;
pub use janitor::{CacheJanitor, CacheStats, SweepReport};
