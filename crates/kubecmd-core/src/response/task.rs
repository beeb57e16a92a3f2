use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::TaskId;
use crate::response::errors::ContractViolation;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a handler round decided about its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rehandle {
    /// The task is finished and is dropped.
    Done,
    /// Run the task again once the delay has elapsed.
    After(Duration),
}

impl Rehandle {
    /// Converts a `(needs_rehandle, next_delay)` pair, rejecting a rehandle
    /// request that has no delay.
    pub fn from_parts(
        command: &str,
        needs_rehandle: bool,
        next_delay: Option<Duration>,
    ) -> Result<Self, ContractViolation> {
        match (needs_rehandle, next_delay) {
            (false, _) => Ok(Rehandle::Done),
            (true, Some(delay)) => Ok(Rehandle::After(delay)),
            (true, None) => Err(ContractViolation {
                command: command.to_owned(),
            }),
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Rehandle::Done => None,
            Rehandle::After(delay) => Some(*delay),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Rehandle::Done)
    }
}

/// Callback run by the dispatcher once per round.
///
/// The payload is handed back on every round of the same task. The
/// scheduler never looks inside it; only the handler does.
pub trait ResponseHandler<P>: Send + Sync {
    fn handle<'a>(&'a self, payload: &'a mut P) -> BoxFuture<'a, Result<Rehandle, BoxError>>;
}

/// Adapter returned by [`handler_fn`].
#[derive(Debug, Clone)]
pub struct HandlerFn<F>(F);

/// Wraps a synchronous closure as a [`ResponseHandler`].
pub fn handler_fn<P, F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut P) -> Result<Rehandle, BoxError> + Send + Sync,
{
    HandlerFn(f)
}

impl<P, F> ResponseHandler<P> for HandlerFn<F>
where
    P: Send,
    F: Fn(&mut P) -> Result<Rehandle, BoxError> + Send + Sync,
{
    fn handle<'a>(&'a self, payload: &'a mut P) -> BoxFuture<'a, Result<Rehandle, BoxError>> {
        Box::pin(async move { (self.0)(payload) })
    }
}

/// Outcome of a single round as seen by the dispatcher.
#[derive(Debug)]
pub(crate) enum RoundResult {
    Decided(Rehandle),
    Failed(String),
    Panicked(String),
}

pub struct CommandResponseTask<P> {
    id: TaskId,
    command_name: String,
    handler: Arc<dyn ResponseHandler<P>>,
    payload: P,
    rounds: u32,
    last: Option<Rehandle>,
    cancel: CancellationToken,
}

impl<P> CommandResponseTask<P> {
    pub fn new<H>(command_name: impl Into<String>, handler: H, payload: P) -> Self
    where
        H: ResponseHandler<P> + 'static,
    {
        Self::with_shared_handler(command_name, Arc::new(handler), payload)
    }

    pub fn with_shared_handler(
        command_name: impl Into<String>,
        handler: Arc<dyn ResponseHandler<P>>,
        payload: P,
    ) -> Self {
        Self {
            id: TaskId::new(),
            command_name: command_name.into(),
            handler,
            payload,
            rounds: 0,
            last: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Makes the first round wait for `delay`, as if a previous round had
    /// asked for it.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.last = Some(Rehandle::After(delay));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Number of completed rounds.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn last_outcome(&self) -> Option<Rehandle> {
        self.last
    }

    pub fn needs_rehandle(&self) -> bool {
        matches!(self.last, Some(Rehandle::After(_)))
    }

    pub fn next_delay(&self) -> Option<Duration> {
        self.last.and_then(|outcome| outcome.delay())
    }

    /// Token that stops any further rounds of this task once cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) async fn run_round(&mut self) -> RoundResult {
        let handler = Arc::clone(&self.handler);
        let payload = &mut self.payload;
        let result = AssertUnwindSafe(async move { handler.handle(payload).await })
            .catch_unwind()
            .await;

        self.rounds += 1;
        let result = match result {
            Ok(Ok(outcome)) => RoundResult::Decided(outcome),
            Ok(Err(error)) => RoundResult::Failed(error.to_string()),
            Err(panic) => RoundResult::Panicked(panic_message(panic.as_ref())),
        };

        self.last = Some(match &result {
            RoundResult::Decided(outcome) => *outcome,
            _ => Rehandle::Done,
        });
        result
    }
}

impl<P> fmt::Debug for CommandResponseTask<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandResponseTask")
            .field("id", &self.id)
            .field("command_name", &self.command_name)
            .field("rounds", &self.rounds)
            .field("last", &self.last)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rehandle_without_delay_is_a_contract_violation() {
        let err = Rehandle::from_parts("restart", true, None).unwrap_err();
        assert_eq!(err.command, "restart");
    }

    #[test]
    fn rehandle_from_parts() {
        assert_eq!(
            Rehandle::from_parts("restart", false, None).unwrap(),
            Rehandle::Done
        );
        // the delay is irrelevant once the task is done
        assert_eq!(
            Rehandle::from_parts("restart", false, Some(Duration::from_secs(1))).unwrap(),
            Rehandle::Done
        );
        assert_eq!(
            Rehandle::from_parts("restart", true, Some(Duration::from_secs(2))).unwrap(),
            Rehandle::After(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn round_records_outcome_and_keeps_payload() {
        let mut task = CommandResponseTask::new(
            "count",
            handler_fn(|n: &mut u32| {
                *n += 1;
                Ok(Rehandle::After(Duration::from_millis(5)))
            }),
            0u32,
        );
        assert!(!task.needs_rehandle());

        task.run_round().await;
        task.run_round().await;

        assert_eq!(*task.payload(), 2);
        assert_eq!(task.rounds(), 2);
        assert_eq!(task.next_delay(), Some(Duration::from_millis(5)));
        assert!(task.last_outcome().is_some_and(|outcome| !outcome.is_done()));
        assert_eq!(task.into_payload(), 2);
    }

    #[tokio::test]
    async fn panicking_round_is_contained() {
        let mut task = CommandResponseTask::new(
            "boom",
            handler_fn(|_: &mut ()| -> Result<Rehandle, BoxError> { panic!("kaboom") }),
            (),
        );

        match task.run_round().await {
            RoundResult::Panicked(message) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected round result {other:?}"),
        }
        assert_eq!(task.last_outcome(), Some(Rehandle::Done));
        assert!(!task.needs_rehandle());
    }
}
