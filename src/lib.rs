// ============================================================================
// recordsync Library
// ============================================================================

pub mod cache;
pub mod config;
pub mod core;
pub mod facade;
pub mod mutation;
pub mod reactor;
pub mod result;
pub mod storage;

// Re-export main types for convenience
pub use cache::{CacheEntry, CacheStats, QueryCache, QueryStatus, Subscription};
pub use config::SyncConfig;
pub use core::{Record, Result, SyncError, line_total};
pub use facade::{RecordForm, RecordStore};
pub use mutation::{MutationExecutor, MutationState, MutationStatus};
pub use reactor::{Derived, LineInputs, TotalField};
pub use result::RecordTable;
pub use storage::{
    DurabilityMode, FileAdapter, InMemoryAdapter, PersistenceAdapter, RecordRepository,
    StorageFormat,
};
