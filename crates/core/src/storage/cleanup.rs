//! Background removal of storage objects no entry references any more.
//!
//! Callers hand keys to a [`CleanupQueue`] and move on; a [`CleanupWorker`] retries the delete
//! with exponential backoff so a flaky provider cannot leave orphans behind for good.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use daybook_shared::CleanupConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::gateway::StorageGateway;

/// Why an object was handed to the cleanup queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// The object was replaced by a newer upload and the inline delete failed.
    Replaced,
    /// The owning entry was deleted and the inline delete failed.
    EntryDeleted,
    /// The object was uploaded but the entry referencing it was never written.
    UnreferencedUpload,
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Replaced => "replaced",
            Self::EntryDeleted => "entry_deleted",
            Self::UnreferencedUpload => "unreferenced_upload",
        };
        f.write_str(reason)
    }
}

/// One object awaiting removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTask {
    /// Key to delete.
    pub object_key: String,
    /// Why it is being deleted.
    pub reason: CleanupReason,
}

/// Cloneable handle for scheduling deletes. Never blocks and never fails the caller.
#[derive(Debug, Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<CleanupTask>,
}

/// Receiving end of a [`CleanupQueue`].
#[derive(Debug)]
pub struct CleanupReceiver {
    rx: mpsc::UnboundedReceiver<CleanupTask>,
}

impl CleanupQueue {
    /// Creates a connected queue and receiver pair.
    #[must_use]
    pub fn channel() -> (Self, CleanupReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CleanupReceiver { rx })
    }

    /// Schedules `object_key` for deletion.
    pub fn enqueue(&self, object_key: impl Into<String>, reason: CleanupReason) {
        let task = CleanupTask {
            object_key: object_key.into(),
            reason,
        };

        debug!(object_key = %task.object_key, reason = %reason, "Queued object for cleanup");

        if let Err(mpsc::error::SendError(task)) = self.tx.send(task) {
            error!(
                object_key = %task.object_key,
                reason = %task.reason,
                "Cleanup queue closed, object left in storage"
            );
        }
    }
}

impl CleanupReceiver {
    /// Waits for the next task. `None` once every queue handle is dropped.
    pub async fn recv(&mut self) -> Option<CleanupTask> {
        self.rx.recv().await
    }

    /// Takes the next task if one is already waiting.
    pub fn try_recv(&mut self) -> Option<CleanupTask> {
        self.rx.try_recv().ok()
    }
}

/// Drains a [`CleanupReceiver`], deleting each object through the gateway.
pub struct CleanupWorker<G> {
    gateway: Arc<G>,
    receiver: CleanupReceiver,
    max_attempts: u32,
    base_delay: Duration,
}

impl<G> CleanupWorker<G>
where
    G: StorageGateway + 'static,
{
    /// Creates a worker over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<G>, receiver: CleanupReceiver, config: &CleanupConfig) -> Self {
        Self {
            gateway,
            receiver,
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Runs the worker on the tokio runtime until every queue handle is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes tasks until the channel closes. Each task retries independently so one slow
    /// key does not hold up the rest.
    pub async fn run(mut self) {
        info!("Cleanup worker started");

        let mut in_flight = Vec::new();
        while let Some(task) = self.receiver.recv().await {
            let gateway = Arc::clone(&self.gateway);
            let (max_attempts, base_delay) = (self.max_attempts, self.base_delay);
            in_flight.retain(|handle: &JoinHandle<bool>| !handle.is_finished());
            in_flight.push(tokio::spawn(async move {
                retry_delete(gateway.as_ref(), &task, max_attempts, base_delay).await
            }));
        }

        for handle in in_flight {
            let _ = handle.await;
        }

        info!("Cleanup worker stopped");
    }
}

/// Delay before retry number `attempt` (1-based): `base`, `2*base`, `4*base`, ...
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Deletes `task.object_key`, retrying transient failures. Returns whether the object is gone.
pub(crate) async fn retry_delete<G>(
    gateway: &G,
    task: &CleanupTask,
    max_attempts: u32,
    base_delay: Duration,
) -> bool
where
    G: StorageGateway + ?Sized,
{
    for attempt in 1..=max_attempts {
        match gateway.delete(&task.object_key).await {
            Ok(removed) => {
                info!(
                    object_key = %task.object_key,
                    reason = %task.reason,
                    attempt,
                    removed,
                    "Cleaned up storage object"
                );
                return true;
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(base_delay, attempt);
                warn!(
                    object_key = %task.object_key,
                    attempt,
                    retry_in_ms = delay.as_millis(),
                    error = %e,
                    "Cleanup delete failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    object_key = %task.object_key,
                    reason = %task.reason,
                    attempts = attempt,
                    error = %e,
                    "Giving up on storage cleanup"
                );
                break;
            }
        }
    }

    false
}
