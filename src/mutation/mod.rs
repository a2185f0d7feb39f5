// ============================================================================
// Mutation Module
// ============================================================================
//
// Single-flight writes with optimistic-then-invalidate cache reconciliation.
//
// ============================================================================

pub mod executor;
pub mod state;
pub mod writer;

pub use executor::MutationExecutor;
pub use state::{MutationId, MutationState, MutationStatus};
pub use writer::{FnWriter, MutationWriter};
