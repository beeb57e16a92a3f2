use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::SchedulerConfig;
use crate::response::errors::SubmitError;
use crate::response::events::{RoundEvent, RoundEventKind};
use crate::response::pool::{DelayedRetryPool, PoolHandle};
use crate::response::task::{CommandResponseTask, Rehandle, RoundResult};

/// Submit side of a [`ResponseDispatcher`].
pub struct DispatcherHandle<P> {
    input: mpsc::Sender<CommandResponseTask<P>>,
    pool: PoolHandle<P>,
}

impl<P> Clone for DispatcherHandle<P> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<P> fmt::Debug for DispatcherHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<P> DispatcherHandle<P> {
    /// Queues `task` for its next round.
    ///
    /// A task built with an initial delay goes through the delay pool first.
    pub async fn submit(&self, task: CommandResponseTask<P>) -> Result<(), SubmitError> {
        debug!(
            task_id = ?task.id(),
            command = task.command_name(),
            "submit command response"
        );

        if task.needs_rehandle() {
            self.pool.enqueue_for_delay(task).await?;
            return Ok(());
        }

        self.input.send(task).await.map_err(|_| SubmitError::Closed)
    }

    pub fn pool(&self) -> &PoolHandle<P> {
        &self.pool
    }
}

/// Runs handler rounds strictly one at a time, in arrival order.
pub struct ResponseDispatcher<P> {
    handle: DispatcherHandle<P>,
    events: broadcast::Sender<RoundEvent>,
    pool: DelayedRetryPool<P>,
    dispatch_handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl<P> fmt::Debug for ResponseDispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDispatcher")
            .field("handle", &self.handle)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<P: Send + 'static> ResponseDispatcher<P> {
    /// Spawns the dispatch loop and the delay pool.
    pub fn start(config: &SchedulerConfig) -> Self {
        info!(
            pool_slots = config.pool_slots,
            queue_capacity = config.queue_capacity,
            "starting response dispatcher"
        );

        let shutdown = CancellationToken::new();
        let (input, rx) = mpsc::channel(config.queue_capacity);
        let (events, _) = broadcast::channel(config.event_capacity);

        let pool = DelayedRetryPool::new(
            config.pool_slots,
            input.clone(),
            events.clone(),
            shutdown.child_token(),
        );
        let pool_handle = pool.handle();

        let dispatch_handle = tokio::spawn(dispatch_loop(
            rx,
            pool_handle.clone(),
            events.clone(),
            shutdown.clone(),
        ));

        Self {
            handle: DispatcherHandle {
                input,
                pool: pool_handle,
            },
            events,
            pool,
            dispatch_handle,
            shutdown,
        }
    }

    pub fn handle(&self) -> DispatcherHandle<P> {
        self.handle.clone()
    }

    pub async fn submit(&self, task: CommandResponseTask<P>) -> Result<(), SubmitError> {
        self.handle.submit(task).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Number of tasks currently waiting out a delay.
    pub fn waiting(&self) -> usize {
        self.handle.pool.waiting()
    }

    /// Stops the dispatch loop and the pool. Pending rounds are dropped.
    pub async fn shutdown(self) {
        info!("response dispatcher shutdown initiated");

        self.shutdown.cancel();
        let _ = self.dispatch_handle.await;
        self.pool.shutdown().await;

        info!("response dispatcher shutdown complete");
    }
}

async fn dispatch_loop<P: Send + 'static>(
    mut rx: mpsc::Receiver<CommandResponseTask<P>>,
    pool: PoolHandle<P>,
    events: broadcast::Sender<RoundEvent>,
    shutdown: CancellationToken,
) {
    info!("response dispatcher started");

    loop {
        let mut task = tokio::select! {
            _ = shutdown.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        if task.is_cancelled() {
            info!(
                task_id = ?task.id(),
                command = task.command_name(),
                "skipping cancelled command response"
            );
            emit(&events, &task, RoundEventKind::Cancelled);
            continue;
        }

        info!(
            task_id = ?task.id(),
            command = task.command_name(),
            round = task.rounds() + 1,
            "handle command response"
        );
        emit(&events, &task, RoundEventKind::Received);

        let delay = match task.run_round().await {
            RoundResult::Decided(Rehandle::Done) => {
                info!(
                    task_id = ?task.id(),
                    command = task.command_name(),
                    rehandle = false,
                    "command response handled"
                );
                emit(&events, &task, RoundEventKind::Completed);
                continue;
            }
            RoundResult::Decided(Rehandle::After(delay)) => delay,
            RoundResult::Failed(error) => {
                error!(
                    task_id = ?task.id(),
                    command = task.command_name(),
                    %error,
                    "command response round failed"
                );
                emit(&events, &task, RoundEventKind::Failed { error });
                continue;
            }
            RoundResult::Panicked(reason) => {
                error!(
                    task_id = ?task.id(),
                    command = task.command_name(),
                    %reason,
                    "command response handler panicked"
                );
                emit(&events, &task, RoundEventKind::Panicked { reason });
                continue;
            }
        };

        info!(
            task_id = ?task.id(),
            command = task.command_name(),
            rehandle = true,
            delay_ms = delay.as_millis(),
            "command response needs to be rehandled"
        );
        emit(&events, &task, RoundEventKind::Rescheduled { delay });

        let task_id = task.id().clone();
        let command = task.command_name().to_owned();
        let round = task.rounds();

        tokio::select! {
            _ = shutdown.cancelled() => break,
            enqueued = pool.enqueue_for_delay(task) => {
                if let Err(err) = enqueued {
                    warn!(task_id = ?task_id, %command, error = %err, "dropping command response");
                    let _ = events.send(RoundEvent {
                        task_id,
                        command,
                        round,
                        kind: RoundEventKind::Dropped { reason: err.to_string() },
                    });
                }
            }
        }
    }

    info!("response dispatcher exited");
}

fn emit<P>(
    events: &broadcast::Sender<RoundEvent>,
    task: &CommandResponseTask<P>,
    kind: RoundEventKind,
) {
    let _ = events.send(RoundEvent::new(task, kind));
}
