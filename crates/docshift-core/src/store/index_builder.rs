//! Background worker that builds newly created indexes.
//!
//! Writes keep every defined index up to date, but documents that existed
//! before an index was created are only picked up by this worker. Until it
//! has scanned the whole document tree the index reports not ready.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::sled_store::StoreInner;

/// Background index builder.
pub(crate) struct IndexBuilder {
    /// Shutdown signal.
    shutdown: Arc<AtomicBool>,
    /// Worker thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IndexBuilder {
    /// Start the worker thread.
    pub(crate) fn start(inner: Arc<StoreInner>, poll_interval: Duration, batch_size: usize) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::Builder::new()
            .name("docshift-index-builder".to_string())
            .spawn(move || Self::worker_loop(&inner, poll_interval, batch_size, &shutdown_clone))
            .ok();
        if handle.is_none() {
            tracing::error!("failed to spawn index builder thread");
        }

        Self {
            shutdown,
            handle: Mutex::new(handle),
        }
    }

    /// Stop the worker and wait for it to finish.
    pub(crate) fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Check if the worker is still running.
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn worker_loop(
        inner: &StoreInner,
        poll_interval: Duration,
        batch_size: usize,
        shutdown: &AtomicBool,
    ) {
        while !shutdown.load(Ordering::SeqCst) {
            let Some(name) = inner.next_pending() else {
                thread::sleep(poll_interval);
                continue;
            };
            Self::build(inner, &name, batch_size, shutdown);
        }
    }

    /// Index all existing documents for one index, then mark it ready.
    fn build(inner: &StoreInner, name: &str, batch_size: usize, shutdown: &AtomicBool) {
        tracing::debug!(index = %name, "building index");
        let mut cursor: Option<Vec<u8>> = None;
        let mut indexed = 0usize;

        loop {
            // An unfinished build is queued again on the next open.
            if shutdown.load(Ordering::SeqCst) {
                return;
            }

            match inner.index_batch(name, cursor.as_deref(), batch_size) {
                Ok(Some((last_key, count))) => {
                    indexed += count;
                    cursor = Some(last_key);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(index = %name, error = %e, "index build failed");
                    inner.requeue(name);
                    return;
                }
            }
        }

        match inner.mark_ready(name) {
            Ok(()) => tracing::info!(index = %name, documents = indexed, "index ready"),
            Err(e) => {
                tracing::error!(index = %name, error = %e, "failed to mark index ready");
                inner.requeue(name);
            }
        }
    }
}

impl Drop for IndexBuilder {
    fn drop(&mut self) {
        self.stop();
    }
}
