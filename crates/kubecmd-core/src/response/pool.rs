use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::response::errors::{ContractViolation, PoolError};
use crate::response::events::{RoundEvent, RoundEventKind};
use crate::response::task::CommandResponseTask;

/// A task parked in the pool until its deadline.
///
/// Holding the permit is what occupies one of the pool's slots.
struct DelayedSlot<P> {
    task: CommandResponseTask<P>,
    deadline: Instant,
    permit: OwnedSemaphorePermit,
}

/// Admission side of a [`DelayedRetryPool`].
pub struct PoolHandle<P> {
    admission: mpsc::UnboundedSender<DelayedSlot<P>>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl<P> Clone for PoolHandle<P> {
    fn clone(&self) -> Self {
        Self {
            admission: self.admission.clone(),
            slots: Arc::clone(&self.slots),
            capacity: self.capacity,
        }
    }
}

impl<P> fmt::Debug for PoolHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("capacity", &self.capacity)
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl<P> PoolHandle<P> {
    /// Parks `task` for the delay recorded by its last round.
    ///
    /// Waits for a free slot when every slot is taken; this is the only
    /// backpressure between the dispatcher and the pool.
    pub async fn enqueue_for_delay(&self, task: CommandResponseTask<P>) -> Result<(), PoolError> {
        let Some(delay) = task.next_delay() else {
            warn!(
                task_id = ?task.id(),
                command = task.command_name(),
                "refusing delayed insert without a delay"
            );
            return Err(ContractViolation {
                command: task.command_name().to_owned(),
            }
            .into());
        };

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        info!(
            task_id = ?task.id(),
            command = task.command_name(),
            delay_ms = delay.as_millis(),
            "insert command response into delay pool"
        );

        let slot = DelayedSlot {
            deadline: deadline_after(delay),
            task,
            permit,
        };
        self.admission.send(slot).map_err(|_| PoolError::Closed)
    }

    /// Number of slots currently holding a task.
    pub fn waiting(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Roughly 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline `delay` from now; a delay past the clock's range waits until
/// [`FAR_FUTURE`] instead.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Fixed set of workers that wait out retry delays and hand tasks back to
/// the dispatcher.
pub struct DelayedRetryPool<P> {
    handle: PoolHandle<P>,
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl<P> fmt::Debug for DelayedRetryPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedRetryPool")
            .field("handle", &self.handle)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl<P: Send + 'static> DelayedRetryPool<P> {
    /// Spawns `slots` workers. Expired tasks are sent to `output`.
    pub fn new(
        slots: usize,
        output: mpsc::Sender<CommandResponseTask<P>>,
        events: broadcast::Sender<RoundEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        info!(slots, "initializing delay pool");

        let (admission, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..slots)
            .map(|worker| {
                tokio::spawn(slot_worker(
                    worker,
                    Arc::clone(&rx),
                    output.clone(),
                    events.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        Self {
            handle: PoolHandle {
                admission,
                slots: Arc::new(Semaphore::new(slots)),
                capacity: slots,
            },
            workers,
            shutdown,
        }
    }

    pub fn handle(&self) -> PoolHandle<P> {
        self.handle.clone()
    }

    /// Stops every worker. Tasks still waiting are dropped.
    pub async fn shutdown(self) {
        info!("delay pool shutdown initiated");

        self.shutdown.cancel();
        self.handle.slots.close();

        for worker in self.workers {
            let _ = worker.await;
        }

        info!("delay pool shutdown complete");
    }
}

async fn slot_worker<P>(
    worker: usize,
    admission: Arc<Mutex<mpsc::UnboundedReceiver<DelayedSlot<P>>>>,
    output: mpsc::Sender<CommandResponseTask<P>>,
    events: broadcast::Sender<RoundEvent>,
    shutdown: CancellationToken,
) {
    debug!(worker, "delay worker started");

    loop {
        let slot = tokio::select! {
            _ = shutdown.cancelled() => break,
            slot = async { admission.lock().await.recv().await } => match slot {
                Some(slot) => slot,
                None => break,
            },
        };

        let DelayedSlot {
            task,
            deadline,
            permit,
        } = slot;
        let cancel = task.cancellation_token().clone();

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(worker, task_id = ?task.id(), "delayed task abandoned on shutdown");
                break;
            }
            _ = cancel.cancelled() => {
                info!(
                    worker,
                    task_id = ?task.id(),
                    command = task.command_name(),
                    "delayed task cancelled"
                );
                let _ = events.send(RoundEvent::new(&task, RoundEventKind::Cancelled));
                continue;
            }
            _ = sleep_until(deadline) => {}
        }

        // The slot frees as soon as the delay is over, not when the
        // dispatcher accepts the task.
        drop(permit);

        debug!(worker, task_id = ?task.id(), "delay elapsed, returning task to dispatcher");

        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = output.send(task) => {
                if sent.is_err() {
                    warn!(worker, "dispatcher queue closed");
                    break;
                }
            }
        }
    }

    debug!(worker, "delay worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_delay_is_clamped() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline >= before + FAR_FUTURE);
        assert!(deadline <= Instant::now() + FAR_FUTURE);
    }

    #[test]
    fn ordinary_delay_is_kept() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::from_secs(5));
        assert!(deadline >= before + Duration::from_secs(5));
        assert!(deadline <= Instant::now() + Duration::from_secs(5));
    }
}
