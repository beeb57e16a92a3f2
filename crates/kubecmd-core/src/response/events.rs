use std::time::Duration;

use crate::TaskId;

/// Published by the dispatcher and the pool for every state change of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEvent {
    pub task_id: TaskId,
    pub command: String,
    /// Rounds completed when the event was emitted.
    pub round: u32,
    pub kind: RoundEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEventKind {
    Received,
    Rescheduled { delay: Duration },
    Completed,
    Failed { error: String },
    Panicked { reason: String },
    Cancelled,
    Dropped { reason: String },
}

impl RoundEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundEventKind::Received => "received",
            RoundEventKind::Rescheduled { .. } => "rescheduled",
            RoundEventKind::Completed => "completed",
            RoundEventKind::Failed { .. } => "failed",
            RoundEventKind::Panicked { .. } => "panicked",
            RoundEventKind::Cancelled => "cancelled",
            RoundEventKind::Dropped { .. } => "dropped",
        }
    }

    /// True when the task will not run again.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RoundEventKind::Received | RoundEventKind::Rescheduled { .. }
        )
    }
}

impl RoundEvent {
    pub(crate) fn new<P>(
        task: &crate::CommandResponseTask<P>,
        kind: RoundEventKind,
    ) -> Self {
        Self {
            task_id: task.id().clone(),
            command: task.command_name().to_owned(),
            round: task.rounds(),
            kind,
        }
    }
}
