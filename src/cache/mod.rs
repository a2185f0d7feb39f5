pub mod entry;
pub mod fetcher;
pub mod store;
pub mod subscription;

pub use entry::{CacheEntry, QueryStatus};
pub use fetcher::{FnFetcher, QueryFetcher};
pub use store::{CacheStats, QueryCache};
pub use subscription::Subscription;
