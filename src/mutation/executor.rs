use super::state::{MutationId, MutationState, MutationStatus};
use super::writer::{FnWriter, MutationWriter};
use crate::cache::QueryCache;
use crate::core::{Result, SyncError};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Default)]
struct ExecState {
    status: MutationStatus,
    last_error: Option<SyncError>,
    submissions: u64,
}

/// Runs one write at a time and reconciles the cached list on success.
///
/// A successful write appends the record to the cached list under `key`
/// (optimistic) and then invalidates that key, so the next read replaces the
/// optimistic list with whatever the source of truth returns. A failed write
/// leaves the cache untouched.
pub struct MutationExecutor<R> {
    cache: QueryCache<Vec<R>>,
    key: String,
    writer: Arc<dyn MutationWriter<R>>,
    state: Mutex<ExecState>,
}

impl<R> MutationExecutor<R> {
    fn lock(&self) -> Result<MutexGuard<'_, ExecState>> {
        Ok(self.state.lock()?)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> Result<MutationState> {
        let state = self.lock()?;
        Ok(MutationState {
            status: state.status,
            pending: state.status.is_pending(),
            last_error: state.last_error.clone(),
            submissions: state.submissions,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.lock()
            .map(|state| state.status.is_pending())
            .unwrap_or(false)
    }

    /// Consume a finished submission, returning the executor to Idle.
    ///
    /// `None` while Idle or Pending.
    pub fn take_outcome(&self) -> Result<Option<std::result::Result<(), SyncError>>> {
        let mut state = self.lock()?;
        if !state.status.is_terminal() {
            return Ok(None);
        }
        let outcome = match state.status {
            MutationStatus::Success => Ok(()),
            _ => Err(state
                .last_error
                .clone()
                .unwrap_or_else(|| SyncError::Write("unknown failure".into()))),
        };
        state.status = MutationStatus::Idle;
        Ok(Some(outcome))
    }

    fn begin(&self) -> Result<MutationId> {
        let mut state = self.lock()?;
        if state.status.is_pending() {
            return Err(SyncError::Busy);
        }
        state.status = MutationStatus::Pending;
        state.last_error = None;
        state.submissions += 1;
        Ok(MutationId(state.submissions))
    }

    fn finish(&self, error: Option<SyncError>) {
        // A poisoned lock still holds usable state; the status must not stay Pending.
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.status = if error.is_some() {
            MutationStatus::Error
        } else {
            MutationStatus::Success
        };
        state.last_error = error;
    }

    fn abandon(&self, id: MutationId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.status.is_pending() {
            state.status = MutationStatus::Idle;
            debug!(mutation = %id, "submission dropped before the write finished");
        }
    }
}

impl<R> MutationExecutor<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new<W>(cache: QueryCache<Vec<R>>, key: &str, writer: W) -> Self
    where
        W: MutationWriter<R> + 'static,
    {
        Self {
            cache,
            key: key.to_string(),
            writer: Arc::new(writer),
            state: Mutex::new(ExecState::default()),
        }
    }

    /// Executor whose write is an async closure
    pub fn from_fn<F, Fut>(cache: QueryCache<Vec<R>>, key: &str, write: F) -> Self
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(cache, key, FnWriter(write))
    }

    /// Write `record`, then patch and invalidate the cached list.
    ///
    /// Fails with [`SyncError::Busy`] while another submission is pending and
    /// with [`SyncError::Write`] when the write itself fails.
    pub async fn submit(&self, record: R) -> Result<()> {
        let id = self.begin()?;
        let guard = PendingGuard {
            executor: self,
            id,
            armed: true,
        };
        debug!(mutation = %id, key = %self.key, "write started");

        let written = self.writer.write(record.clone()).await;
        guard.disarm();

        let outcome = match written {
            Ok(()) => self.reconcile(id, record),
            Err(err) => {
                let err = match err {
                    SyncError::Write(_) => err,
                    other => SyncError::Write(other.to_string()),
                };
                warn!(mutation = %id, error = %err, "write failed, cache left untouched");
                Err(err)
            }
        };
        self.finish(outcome.as_ref().err().cloned());
        outcome
    }

    /// Optimistic append first, invalidation second.
    fn reconcile(&self, id: MutationId, record: R) -> Result<()> {
        let patched = self.cache.patch(&self.key, |mut rows| {
            rows.push(record);
            rows
        })?;
        self.cache.invalidate(&self.key)?;
        if patched {
            info!(mutation = %id, key = %self.key, "write committed, cache patched and invalidated");
        } else {
            debug!(mutation = %id, key = %self.key, "write committed, no cached list to patch");
        }
        Ok(())
    }
}

/// Puts the executor back to Idle if a submission is dropped mid-write.
struct PendingGuard<'a, R> {
    executor: &'a MutationExecutor<R>,
    id: MutationId,
    armed: bool,
}

impl<R> PendingGuard<'_, R> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R> Drop for PendingGuard<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            self.executor.abandon(self.id);
        }
    }
}
