pub mod form;
pub mod store;

pub use form::RecordForm;
pub use store::RecordStore;
