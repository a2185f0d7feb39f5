//! Push-based derived fields.

pub mod derived;
pub mod total;

pub use derived::Derived;
pub use total::{LineInputs, TotalField};
