// ============================================================================
// Mutation State
// ============================================================================
//
// One executor runs at most one write at a time:
//
//   Idle ──submit──> Pending ──ok──> Success ──take_outcome──> Idle
//                       │
//                       └──err──> Error ──take_outcome──> Idle
//
// A new submit from Success or Error starts over without an explicit reset.
//
// ============================================================================

use crate::core::SyncError;

/// Per-executor submission counter value, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mut_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl MutationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationStatus::Pending)
    }

    /// Success or Error, waiting to be consumed
    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationStatus::Success | MutationStatus::Error)
    }
}

impl std::fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationStatus::Idle => write!(f, "IDLE"),
            MutationStatus::Pending => write!(f, "PENDING"),
            MutationStatus::Success => write!(f, "SUCCESS"),
            MutationStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Snapshot of an executor's transient state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationState {
    pub status: MutationStatus,
    pub pending: bool,
    pub last_error: Option<SyncError>,
    pub submissions: u64,
}
