pub mod table;

pub use table::{COLUMNS, RecordTable};
