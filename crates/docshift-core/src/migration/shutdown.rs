//! Shutdown flush of the migration state.
//!
//! Every state snapshot the executor persists is recorded here first. If a
//! persist has not reached the store when the process is told to stop (a
//! failed write, or a crash unwinding the executor), [`ShutdownFlush::flush`]
//! writes the last recorded snapshot so the next start resumes from it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::MigrationError;
use super::state::{MigrationState, MigrationStateStore};

#[derive(Default)]
struct Slot {
    armed: bool,
    closed: bool,
    /// Latest snapshot not yet confirmed by the store.
    pending: Option<MigrationState>,
}

/// Shared handle recording and flushing migration state snapshots.
#[derive(Clone)]
pub struct ShutdownFlush {
    state_store: MigrationStateStore,
    slot: Arc<Mutex<Slot>>,
}

impl ShutdownFlush {
    pub fn new(state_store: MigrationStateStore) -> Self {
        Self {
            state_store,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn state_store(&self) -> &MigrationStateStore {
        &self.state_store
    }

    /// Arm the flush for the duration of a run.
    ///
    /// The returned guard flushes if dropped while unwinding and disarms.
    pub fn arm(&self) -> FlushGuard<'_> {
        self.slot.lock().armed = true;
        FlushGuard { flush: self }
    }

    /// Record `state` and write it to the store.
    ///
    /// Fails with [`MigrationError::Interrupted`] once the flush is closed.
    pub fn persist(&self, state: &mut MigrationState) -> Result<(), MigrationError> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(MigrationError::Interrupted);
        }
        slot.pending = Some(state.clone());

        self.state_store.save(state)?;
        slot.pending = None;
        Ok(())
    }

    /// Write the last recorded snapshot if it has not been persisted.
    ///
    /// Returns whether anything was written.
    pub fn flush(&self) -> Result<bool, MigrationError> {
        let mut slot = self.slot.lock();
        Self::flush_locked(&self.state_store, &mut slot)
    }

    /// Flush and refuse all further persists.
    pub fn close(&self) -> Result<bool, MigrationError> {
        let mut slot = self.slot.lock();
        slot.closed = true;
        Self::flush_locked(&self.state_store, &mut slot)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().armed
    }

    fn flush_locked(
        state_store: &MigrationStateStore,
        slot: &mut Slot,
    ) -> Result<bool, MigrationError> {
        if !slot.armed {
            return Ok(false);
        }
        let Some(mut snapshot) = slot.pending.take() else {
            return Ok(false);
        };
        if let Err(e) = state_store.save(&mut snapshot) {
            slot.pending = Some(snapshot);
            return Err(e);
        }
        tracing::info!(active = ?snapshot.active.as_ref().map(|a| &a.id), "flushed migration state");
        Ok(true)
    }

    fn disarm(&self) {
        let mut slot = self.slot.lock();
        slot.armed = false;
        slot.pending = None;
    }
}

/// Scope of an armed [`ShutdownFlush`].
pub struct FlushGuard<'a> {
    flush: &'a ShutdownFlush,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Err(e) = self.flush.flush() {
                tracing::error!(error = %e, "failed to flush migration state while unwinding");
            }
        }
        self.flush.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::state::ActiveMigration;
    use crate::store::{SledStore, StoreConfig};

    fn flush() -> ShutdownFlush {
        let store = SledStore::open(StoreConfig::temporary()).unwrap();
        ShutdownFlush::new(MigrationStateStore::new(Arc::new(store)))
    }

    #[test]
    fn test_persist_writes_through() {
        let flush = flush();
        let _guard = flush.arm();
        let mut state = flush.state_store().load().unwrap();
        state.active = Some(ActiveMigration::new("a"));

        flush.persist(&mut state).unwrap();
        assert_eq!(flush.state_store().load().unwrap(), state);
        // Nothing left to flush.
        assert!(!flush.flush().unwrap());
    }

    #[test]
    fn test_failed_persist_is_flushed_later() {
        let flush = flush();
        let _guard = flush.arm();
        let mut state = flush.state_store().load().unwrap();
        let good_revision = state.revision.clone();

        state.active = Some(ActiveMigration::new("a"));
        state.revision = Some("9-stale".to_string());
        assert!(flush.persist(&mut state).is_err());

        // The snapshot is still pending; fix its revision and flush it.
        flush.slot.lock().pending.as_mut().unwrap().revision = good_revision;
        assert!(flush.flush().unwrap());
        assert_eq!(flush.state_store().load().unwrap().active.unwrap().id, "a");
    }

    #[test]
    fn test_close_rejects_further_persists() {
        let flush = flush();
        let _guard = flush.arm();
        let mut state = flush.state_store().load().unwrap();
        flush.close().unwrap();
        assert!(matches!(
            flush.persist(&mut state),
            Err(MigrationError::Interrupted)
        ));
    }

    #[test]
    fn test_guard_disarms() {
        let flush = flush();
        {
            let _guard = flush.arm();
            assert!(flush.is_armed());
        }
        assert!(!flush.is_armed());
    }
}
