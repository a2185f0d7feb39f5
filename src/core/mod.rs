pub mod error;
pub mod record;

pub use error::{Result, SyncError};
pub use record::{Record, amount, line_total, seed_records};
