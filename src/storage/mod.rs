pub mod engine;
pub mod memory;
pub mod persistence;
pub mod repository;

pub use engine::PersistenceAdapter;
pub use memory::InMemoryAdapter;
pub use persistence::{DurabilityMode, FileAdapter, StorageFormat};
pub use repository::RecordRepository;
